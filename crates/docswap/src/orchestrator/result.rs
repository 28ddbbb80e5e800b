//! Per-file results and batch totals.

use std::fmt;
use std::io;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use docswap_engine::{EngineError, SessionError};

/// Terminal state of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// The edited document was placed at the output path.
    Success,
    /// Edits were computed but an unedited copy was delivered instead.
    PartialSuccess,
    /// Every attempt failed and nothing was delivered.
    Failed,
    /// The file was not processed.
    Skipped,
}

impl FileStatus {
    /// Symbol shown in the console report.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::PartialSuccess => "≈",
            Self::Failed => "✗",
            Self::Skipped => "-",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        })
    }
}

/// Why a file was not delivered as edited.
#[derive(Debug, Error)]
pub enum FileError {
    /// The input is missing, unreadable or empty.
    #[error("unreadable input: {reason}")]
    Unreadable {
        /// What was wrong with the input.
        reason: String,
    },
    /// The editor does not handle this file type.
    #[error("unsupported format")]
    UnsupportedFormat,
    /// The operator declined to overwrite an existing output file.
    #[error("overwrite declined")]
    OverwriteDeclined,
    /// Opening, editing or saving the document failed.
    #[error("edit failed: {0}")]
    Edit(#[from] EditFailure),
    /// The edited document could not be moved to the output directory.
    #[error("cannot place output at {path}: {source}")]
    Relocate {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Failures that restart a file from document open.
#[derive(Debug, Error)]
pub enum EditFailure {
    /// The session rejected an open or save.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The attempt ran out of time.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// No temporary path could be reserved.
    #[error("cannot reserve a temporary file: {0}")]
    TempFile(#[source] io::Error),
}

/// Outcome of processing one input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    /// File name shown in reports.
    pub name: String,
    /// Terminal state.
    pub status: FileStatus,
    /// Replacements believed to be in the delivered file.
    pub replacements: Option<usize>,
    /// Description of the failure, when there was one.
    pub error: Option<String>,
    /// Time spent on the file.
    pub elapsed: Duration,
}

impl FileResult {
    pub(crate) fn skipped(name: &str, error: &FileError, elapsed: Duration) -> Self {
        Self {
            name: name.to_owned(),
            status: FileStatus::Skipped,
            replacements: None,
            error: Some(error.to_string()),
            elapsed,
        }
    }

    pub(crate) fn failed(name: &str, error: &FileError, elapsed: Duration) -> Self {
        Self {
            name: name.to_owned(),
            status: FileStatus::Failed,
            replacements: None,
            error: Some(error.to_string()),
            elapsed,
        }
    }
}

/// Totals for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files considered.
    pub total: usize,
    /// Files delivered as edited.
    pub succeeded: usize,
    /// Files delivered as unedited copies.
    pub partial: usize,
    /// Files that failed.
    pub failed: usize,
    /// Files skipped.
    pub skipped: usize,
    /// Replacements in files delivered as edited.
    pub total_replacements: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// Whether the run stopped early on an interrupt.
    pub interrupted: bool,
}

impl BatchSummary {
    /// Folds one file result into the totals.
    pub fn record(&mut self, result: &FileResult) {
        self.total += 1;
        match result.status {
            FileStatus::Success => {
                self.succeeded += 1;
                self.total_replacements += result.replacements.unwrap_or(0);
            }
            FileStatus::PartialSuccess => self.partial += 1,
            FileStatus::Failed => self.failed += 1,
            FileStatus::Skipped => self.skipped += 1,
        }
    }
}
