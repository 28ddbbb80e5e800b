//! Default values shared by the configuration loader and the binary.

/// Default number of whole-file retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-attempt processing budget, in seconds.
pub const DEFAULT_FILE_TIMEOUT_SECS: u64 = 300;

/// Default log filter expression used by the binary.
///
/// The console table owns stdout, so only warnings reach stderr unless the
/// operator asks for more.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default log filter expression used by the binary.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binary.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}
