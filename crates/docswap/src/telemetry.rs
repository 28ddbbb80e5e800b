//! Structured telemetry initialisation for batch runs.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::sync::Mutex;

use camino::Utf8Path;
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use docswap_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to open the configured log file.
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        /// Path of the log file.
        path: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Repeated calls are idempotent: the first invocation installs the global
/// subscriber and later invocations return a fresh [`TelemetryHandle`]
/// without touching the global state again.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let (writer, ansi) = match config.log_file() {
        Some(path) => (BoxMakeWriter::new(Mutex::new(open_log_file(path)?)), false),
        None => (
            BoxMakeWriter::new(io::stderr),
            io::stderr().is_terminal() && !config.log_format().is_structured(),
        ),
    };

    let builder = |filter: EnvFilter, writer: BoxMakeWriter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter, writer).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter, writer).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn open_log_file(path: &Utf8Path) -> Result<File, TelemetryError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFile {
            path: path.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_filter() {
        let mut config = Config::new("in", "out");
        config.log_filter = "docswap=loudest".to_owned();
        assert!(matches!(
            install_subscriber(&config),
            Err(TelemetryError::Filter(_))
        ));
    }

    #[test]
    fn reports_unwritable_log_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing").join("run.log");
        let path = Utf8Path::from_path(&missing).expect("utf-8 path");
        assert!(matches!(
            open_log_file(path),
            Err(TelemetryError::LogFile { .. })
        ));
    }
}
