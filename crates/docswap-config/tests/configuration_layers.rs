//! Checks how configuration files, environment variables and flags combine.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use camino::Utf8Path;
use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::rstest;
use tempfile::TempDir;

use docswap_config::{
    Config, DEFAULT_FILE_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_MAX_RETRIES, LogFormat,
    RuleSpec,
};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

// A failed test must not take the others down with a poisoned lock.
fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner)
}

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let guard = env_lock();
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` on edition 2024; `Drop` restores
        // the previous value.
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            guard: Some(guard),
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
        drop(self.guard.take());
    }
}

fn write_config(dir: &Path, body: &str) -> OsString {
    let path = dir.join("docswap.toml");
    fs::write(&path, body).expect("write config");
    path.into_os_string()
}

fn args(extra: &[&str]) -> Vec<OsString> {
    std::iter::once("docswap")
        .chain(extra.iter().copied())
        .map(OsString::from)
        .collect()
}

const FILE_BODY: &str = r#"
source_dir = "/data/templates"
output_dir = "/data/output"
max_retries = 5
rules = [
    { search = "2019", replace = "2023" },
    { search = "2020", replace = "2024" },
]
"#;

#[test]
fn file_values_are_loaded_in_order() {
    let _lock = env_lock();
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(dir.path(), FILE_BODY);

    let mut cli = args(&["--config-path"]);
    cli.push(path);
    let config = Config::load_from_iter(cli).expect("config loads");

    assert_eq!(config.source_dir().as_str(), "/data/templates");
    assert_eq!(config.output_dir().as_str(), "/data/output");
    assert_eq!(config.max_retries, 5);
    assert_eq!(
        config.rules(),
        &[RuleSpec::new("2019", "2023"), RuleSpec::new("2020", "2024")]
    );
}

#[test]
fn flags_override_file_values() {
    let _lock = env_lock();
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(dir.path(), FILE_BODY);

    let mut cli = args(&["--config-path"]);
    cli.push(path);
    cli.extend(args(&["--max-retries", "1"]).into_iter().skip(1));
    let config = Config::load_from_iter(cli).expect("config loads");

    assert_eq!(config.max_retries, 1);
}

#[test]
fn environment_overrides_file_values() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(dir.path(), FILE_BODY);
    let _env = EnvOverride::set_var("DOCSWAP_OUTPUT_DIR", OsStr::new("/elsewhere"));

    let mut cli = args(&["--config-path"]);
    cli.push(path);
    let config = Config::load_from_iter(cli).expect("config loads");

    assert_eq!(config.output_dir().as_str(), "/elsewhere");
}

#[test]
fn defaults_fill_unspecified_fields() {
    let _lock = env_lock();
    let config = Config::load_from_iter(args(&[
        "--source-dir",
        "/in",
        "--output-dir",
        "/out",
    ]))
    .expect("config loads");

    assert_eq!(config.source_dir(), Utf8Path::new("/in"));
    assert_eq!(config.output_dir(), Utf8Path::new("/out"));
    assert!(config.rules().is_empty());
    assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    assert_eq!(config.file_timeout_secs, DEFAULT_FILE_TIMEOUT_SECS);
    assert!(!config.confirm_overwrite);
    assert!(!config.backup);
    assert!(!config.hide_progress);
    assert!(config.temp_root.is_none());
    assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
    assert_eq!(config.log_format(), LogFormat::Compact);
    assert!(config.log_file().is_none());
    assert!(!config.skip_word_headers_footers);
    assert!(!config.skip_word_notes);
    assert!(!config.word_properties);
    assert!(!config.skip_word_macro_enabled);
    assert!(!config.skip_spreadsheet_inline_strings);
    assert!(!config.skip_spreadsheet_properties);
    assert!(!config.skip_spreadsheet_macro_enabled);
    assert_eq!(config, Config::new("/in", "/out"));
}

#[rstest]
#[case("--confirm-overwrite", |config: &Config| config.confirm_overwrite)]
#[case("--backup", |config: &Config| config.backup)]
#[case("--hide-progress", |config: &Config| config.hide_progress)]
#[case("--skip-word-headers-footers", |config: &Config| config.skip_word_headers_footers)]
#[case("--skip-word-notes", |config: &Config| config.skip_word_notes)]
#[case("--word-properties", |config: &Config| config.word_properties)]
#[case("--skip-word-macro-enabled", |config: &Config| config.skip_word_macro_enabled)]
#[case(
    "--skip-spreadsheet-inline-strings",
    |config: &Config| config.skip_spreadsheet_inline_strings
)]
#[case("--skip-spreadsheet-properties", |config: &Config| config.skip_spreadsheet_properties)]
#[case(
    "--skip-spreadsheet-macro-enabled",
    |config: &Config| config.skip_spreadsheet_macro_enabled
)]
fn switches_turn_their_option_on(#[case] flag: &str, #[case] field: fn(&Config) -> bool) {
    let _lock = env_lock();
    let defaults = Config::load_from_iter(args(&["--source-dir", "/in", "--output-dir", "/out"]))
        .expect("config loads");
    let switched = Config::load_from_iter(args(&[
        "--source-dir",
        "/in",
        "--output-dir",
        "/out",
        flag,
    ]))
    .expect("config loads");

    assert!(!field(&defaults));
    assert!(field(&switched));
}

#[test]
fn valued_options_are_read_from_flags() {
    let _lock = env_lock();
    let config = Config::load_from_iter(args(&[
        "--source-dir",
        "/in",
        "--output-dir",
        "/out",
        "--rules",
        "2019=2023",
        "--file-timeout-secs",
        "0",
        "--temp-root",
        "/scratch",
        "--log-filter",
        "docswap=debug",
        "--log-format",
        "json",
        "--log-file",
        "/var/log/docswap.log",
    ]))
    .expect("config loads");

    assert_eq!(config.rules(), &[RuleSpec::new("2019", "2023")]);
    assert_eq!(config.file_timeout(), None);
    assert_eq!(config.temp_root.as_deref(), Some(Utf8Path::new("/scratch")));
    assert_eq!(config.log_filter(), "docswap=debug");
    assert_eq!(config.log_format(), LogFormat::Json);
    assert_eq!(config.log_file(), Some(Utf8Path::new("/var/log/docswap.log")));
}

#[test]
fn malformed_file_is_reported() {
    let _lock = env_lock();
    let dir = TempDir::new().expect("temp dir");
    let path = write_config(dir.path(), "source_dir = [not valid");

    let mut cli = args(&["--config-path"]);
    cli.push(path);
    assert!(Config::load_from_iter(cli).is_err());
}
