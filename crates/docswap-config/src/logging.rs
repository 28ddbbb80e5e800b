//! Shape of the batch log.
//!
//! The console report owns stdout, so log lines always go to stderr or the
//! configured log file. `--log-format` picks how each line is rendered.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How per-file and per-rule events are written to the log.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, with the event fields flattened, for
    /// auditing a run after the fact.
    Json,
    /// One terse line per event, readable next to the report.
    #[default]
    Compact,
}

impl LogFormat {
    /// Returns true when events are written as JSON objects.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Raised when `--log-format` or `DOCSWAP_LOG_FORMAT` names no known format.
pub type LogFormatParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("COMPACT", LogFormat::Compact)]
    #[case("Compact", LogFormat::Compact)]
    fn parses_case_insensitively(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(input.parse::<LogFormat>().expect("format parses"), expected);
    }

    #[test]
    fn rejects_unknown_format() {
        assert!("pretty".parse::<LogFormat>().is_err());
    }

    #[test]
    fn only_json_is_structured() {
        assert!(LogFormat::Json.is_structured());
        assert!(!LogFormat::default().is_structured());
    }
}
