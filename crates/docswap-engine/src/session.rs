//! The document-editing capability driven by the replacement engine.
//!
//! A [`DocumentSession`] is a stateful handle over exactly one open
//! document. Its primitives mirror what office suites expose through
//! automation: a cursor-based find/replace, whole-content rewrites, per-block
//! rewrites, a native replace-all, and save/close. None of them are trusted
//! on their own; the engine cross-checks their effects through the
//! verification oracle.
//!
//! An [`Editor`] classifies paths and opens sessions, standing in for the
//! external application that owns documents while they are edited.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Separator placed between blocks in a session's full text.
///
/// Word processors report paragraph marks as carriage returns, and a
/// carriage return practically never appears inside a cell or run.
pub const BLOCK_SEPARATOR: char = '\r';

/// The two families of documents the editor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Word-processor documents.
    WordProcessor,
    /// Spreadsheet workbooks.
    Spreadsheet,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WordProcessor => f.write_str("word-processor"),
            Self::Spreadsheet => f.write_str("spreadsheet"),
        }
    }
}

/// A concrete container format recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// `.docx`
    Docx,
    /// `.docm`
    Docm,
    /// `.xlsx`
    Xlsx,
    /// `.xlsm`
    Xlsm,
}

impl DocumentFormat {
    /// Classifies a path by its extension, ignoring case.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "docx" => Some(Self::Docx),
            "docm" => Some(Self::Docm),
            "xlsx" => Some(Self::Xlsx),
            "xlsm" => Some(Self::Xlsm),
            _ => None,
        }
    }

    /// Document family handled by this format.
    #[must_use]
    pub const fn kind(self) -> DocumentKind {
        match self {
            Self::Docx | Self::Docm => DocumentKind::WordProcessor,
            Self::Xlsx | Self::Xlsm => DocumentKind::Spreadsheet,
        }
    }

    /// Returns true for the macro-enabled variants.
    #[must_use]
    pub const fn is_macro_enabled(self) -> bool {
        matches!(self, Self::Docm | Self::Xlsm)
    }
}

/// Errors raised by document sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading or writing the document on disk failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The container could not be read or written.
    #[error("invalid document package {path}: {message}")]
    Package {
        /// Path of the package.
        path: PathBuf,
        /// Description of the container error.
        message: String,
    },
    /// An XML part was malformed.
    #[error("malformed part {part}: {message}")]
    Xml {
        /// Name of the part inside the package.
        part: String,
        /// Description of the parse error.
        message: String,
    },
    /// The package lacked a part every document of its kind must have.
    #[error("{path} has no {part} part")]
    MissingPart {
        /// Path of the package.
        path: PathBuf,
        /// Name of the missing part.
        part: &'static str,
    },
    /// A block index was outside the document.
    #[error("block {index} is out of range ({count} blocks)")]
    BlockOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of blocks in the document.
        count: usize,
    },
    /// Rewritten content did not line up with the document's blocks.
    #[error("content has {found} blocks but the document has {expected}")]
    StructureMismatch {
        /// Number of blocks in the document.
        expected: usize,
        /// Number of blocks in the supplied content.
        found: usize,
    },
    /// A block had no run able to carry text.
    #[error("block {index} has no text run to write into")]
    NoTextRun {
        /// Index of the block.
        index: usize,
    },
    /// The editor refused an operation.
    #[error("{operation} rejected: {message}")]
    Rejected {
        /// Name of the refused operation.
        operation: &'static str,
        /// Reason reported by the editor.
        message: String,
    },
    /// The session was already closed.
    #[error("the document session is closed")]
    Closed,
}

impl SessionError {
    /// Creates an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A stateful editing session over one open document.
///
/// Offsets handed to [`DocumentSession::text_at`] are character offsets
/// into the string returned by [`DocumentSession::text`], where blocks are
/// joined by [`BLOCK_SEPARATOR`].
#[cfg_attr(test, mockall::automock)]
pub trait DocumentSession {
    /// Plain text of the whole document.
    fn text(&self) -> Result<String, SessionError>;

    /// Moves the find cursor back to the start of the document.
    fn rewind(&mut self);

    /// Finds the next occurrence of `search` at or after the cursor and
    /// replaces it in place, preserving the formatting around it. The cursor
    /// moves past the inserted text.
    ///
    /// Returns the index of the block that was edited, or `None` when
    /// nothing was found.
    fn replace_next(
        &mut self,
        search: &str,
        replacement: &str,
    ) -> Result<Option<usize>, SessionError>;

    /// Overwrites the whole document with `text`, split on
    /// [`BLOCK_SEPARATOR`] into blocks.
    fn set_text(&mut self, text: &str) -> Result<(), SessionError>;

    /// Number of paragraph-like blocks.
    fn block_count(&self) -> usize;

    /// Plain text of one block.
    fn block_text(&self, index: usize) -> Result<String, SessionError>;

    /// Overwrites the text of one block.
    fn set_block_text(&mut self, index: usize, text: &str) -> Result<(), SessionError>;

    /// Number of places in the document that display block `index`.
    ///
    /// A block normally appears once. A workbook's shared string appears in
    /// every cell referencing it, and replacement counts are per place.
    fn block_weight(&self, _index: usize) -> usize {
        1
    }

    /// Native replace-all. Returns the number of replacements performed,
    /// weighted by [`DocumentSession::block_weight`].
    fn replace_all(&mut self, search: &str, replacement: &str) -> Result<usize, SessionError>;

    /// Up to `len` characters of the full text starting at `offset`.
    fn text_at(&self, offset: usize, len: usize) -> Result<String, SessionError> {
        Ok(self.text()?.chars().skip(offset).take(len).collect())
    }

    /// Writes the edited document to `path`.
    fn save_as(&mut self, path: &Path) -> Result<(), SessionError>;

    /// Releases the document. Further calls fail with
    /// [`SessionError::Closed`]; closing twice is harmless.
    fn close(&mut self);
}

/// Opens editing sessions for supported documents.
#[cfg_attr(test, mockall::automock)]
pub trait Editor {
    /// Returns the format to open `path` with, or `None` when unsupported.
    fn classify(&self, path: &Path) -> Option<DocumentFormat> {
        DocumentFormat::from_path(path)
    }

    /// Opens `path` for editing.
    fn open(
        &self,
        format: DocumentFormat,
        path: &Path,
    ) -> Result<Box<dyn DocumentSession>, SessionError>;
}
