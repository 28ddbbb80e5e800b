//! Layered configuration for the docswap batch editor.
//!
//! Values are merged from built-in defaults, an optional TOML file (selected
//! with `--config-path` or `DOCSWAP_CONFIG_PATH`), `DOCSWAP_*` environment
//! variables, and command-line flags, with later layers taking precedence.
//! The resolved [`Config`] is built once at startup and passed by reference
//! to everything that needs it.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod rules;

pub use defaults::{
    DEFAULT_FILE_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_MAX_RETRIES, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use rules::{RuleParseError, RuleSpec};

/// Resolved configuration for one batch run.
///
/// Boolean options are phrased so that `false` is their default: a switch
/// absent from the command line always reads as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "DOCSWAP")]
pub struct Config {
    /// Directory holding the documents to edit.
    pub source_dir: Utf8PathBuf,
    /// Directory receiving edited copies. Created when missing.
    pub output_dir: Utf8PathBuf,
    /// Ordered replacement rules.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Whole-file retries allowed after the first attempt.
    #[ortho_config(default = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,
    /// Per-attempt processing budget in seconds; zero disables the deadline.
    #[ortho_config(default = DEFAULT_FILE_TIMEOUT_SECS)]
    pub file_timeout_secs: u64,
    /// Ask before overwriting an existing output file. Off by default, so
    /// existing outputs are overwritten without a question.
    #[ortho_config(default = false)]
    pub confirm_overwrite: bool,
    /// Copy each original into a dated backup directory before editing.
    #[ortho_config(default = false)]
    pub backup: bool,
    /// Suppress the transient progress line shown while files are processed.
    #[ortho_config(default = false)]
    pub hide_progress: bool,
    /// Parent of the private scratch directory; the system temp dir otherwise.
    pub temp_root: Option<Utf8PathBuf>,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log line format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Append logs to this file instead of stderr.
    pub log_file: Option<Utf8PathBuf>,
    /// Leave header and footer parts of word-processor documents untouched.
    #[ortho_config(default = false)]
    pub skip_word_headers_footers: bool,
    /// Leave footnote and endnote parts of word-processor documents untouched.
    #[ortho_config(default = false)]
    pub skip_word_notes: bool,
    /// Edit the core properties (title, subject, keywords, description) of
    /// word-processor documents.
    #[ortho_config(default = false)]
    pub word_properties: bool,
    /// Skip macro-enabled word-processor documents (`.docm`).
    #[ortho_config(default = false)]
    pub skip_word_macro_enabled: bool,
    /// Leave inline-string worksheet cells untouched; only the shared
    /// strings are edited.
    #[ortho_config(default = false)]
    pub skip_spreadsheet_inline_strings: bool,
    /// Leave the core properties of workbooks untouched.
    #[ortho_config(default = false)]
    pub skip_spreadsheet_properties: bool,
    /// Skip macro-enabled workbooks (`.xlsm`).
    #[ortho_config(default = false)]
    pub skip_spreadsheet_macro_enabled: bool,
}

impl Config {
    /// Builds a configuration for the given directories with every other
    /// field at its default.
    #[must_use]
    pub fn new(source_dir: impl Into<Utf8PathBuf>, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            rules: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            file_timeout_secs: DEFAULT_FILE_TIMEOUT_SECS,
            confirm_overwrite: false,
            backup: false,
            hide_progress: false,
            temp_root: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            log_file: None,
            skip_word_headers_footers: false,
            skip_word_notes: false,
            word_properties: false,
            skip_word_macro_enabled: false,
            skip_spreadsheet_inline_strings: false,
            skip_spreadsheet_properties: false,
            skip_spreadsheet_macro_enabled: false,
        }
    }

    /// Directory holding the documents to edit.
    #[must_use]
    pub fn source_dir(&self) -> &Utf8Path {
        self.source_dir.as_path()
    }

    /// Directory receiving edited copies.
    #[must_use]
    pub fn output_dir(&self) -> &Utf8Path {
        self.output_dir.as_path()
    }

    /// Ordered replacement rules.
    #[must_use]
    pub fn rules(&self) -> &[RuleSpec] {
        &self.rules
    }

    /// Per-attempt deadline, or `None` when disabled.
    #[must_use]
    pub fn file_timeout(&self) -> Option<Duration> {
        (self.file_timeout_secs > 0).then(|| Duration::from_secs(self.file_timeout_secs))
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log line format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Optional log file path.
    #[must_use]
    pub fn log_file(&self) -> Option<&Utf8Path> {
        self.log_file.as_deref()
    }
}
