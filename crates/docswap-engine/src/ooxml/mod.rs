//! In-process editor for Office Open XML packages.
//!
//! Word-processor documents expose their main story, optionally followed by
//! headers, footers, footnotes, endnotes and core properties. Workbooks
//! expose the shared string table, optionally followed by inline-string
//! cells and core properties. Numbers, formulas and every other part are
//! carried through unchanged.
//!
//! A shared string counts once for every cell that references it, so
//! replacement counts for workbooks are per cell.

mod cells;
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
mod package;
mod session;
mod text_part;

use std::path::Path;

use tracing::debug;

use crate::session::{DocumentFormat, DocumentKind, DocumentSession, Editor, SessionError};

use package::Package;
pub use session::OoxmlSession;
use text_part::{CORE_PROPERTIES, INLINE_STRINGS, PartSchema, SHARED_STRINGS, TextPart, WORD_STORY};

const WORD_BODY: &str = "word/document.xml";
const SHARED_STRING_TABLE: &str = "xl/sharedStrings.xml";
const CORE_PROPERTIES_PART: &str = "docProps/core.xml";
const WORKSHEET_PREFIX: &str = "xl/worksheets/sheet";

/// Which parts of each document kind are edited, and which formats are
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OoxmlOptions {
    /// Edit `word/header*.xml` and `word/footer*.xml`.
    pub word_headers_footers: bool,
    /// Edit `word/footnotes.xml` and `word/endnotes.xml`.
    pub word_notes: bool,
    /// Edit the core properties of word-processor documents.
    pub word_properties: bool,
    /// Accept `.docm`.
    pub word_macro_enabled: bool,
    /// Edit inline-string cells in worksheets.
    pub spreadsheet_inline_strings: bool,
    /// Edit the core properties of workbooks.
    pub spreadsheet_properties: bool,
    /// Accept `.xlsm`.
    pub spreadsheet_macro_enabled: bool,
}

impl Default for OoxmlOptions {
    fn default() -> Self {
        Self {
            word_headers_footers: true,
            word_notes: true,
            word_properties: false,
            word_macro_enabled: true,
            spreadsheet_inline_strings: true,
            spreadsheet_properties: true,
            spreadsheet_macro_enabled: true,
        }
    }
}

impl OoxmlOptions {
    const fn accepts(&self, format: DocumentFormat) -> bool {
        match format {
            DocumentFormat::Docx | DocumentFormat::Xlsx => true,
            DocumentFormat::Docm => self.word_macro_enabled,
            DocumentFormat::Xlsm => self.spreadsheet_macro_enabled,
        }
    }
}

/// Opens OOXML packages as [`OoxmlSession`]s.
#[derive(Debug, Clone, Default)]
pub struct OoxmlEditor {
    options: OoxmlOptions,
}

impl OoxmlEditor {
    /// Creates an editor with the given part selection.
    #[must_use]
    pub const fn new(options: OoxmlOptions) -> Self {
        Self { options }
    }

    /// Opens `path` as a concrete session.
    ///
    /// # Errors
    ///
    /// Returns an error when the package cannot be read, a required part is
    /// missing, or an edited part is not well-formed XML.
    pub fn open_package(
        &self,
        format: DocumentFormat,
        path: &Path,
    ) -> Result<OoxmlSession, SessionError> {
        let package = Package::read(path)?;
        let selection = match format.kind() {
            DocumentKind::WordProcessor => self.word_parts(&package)?,
            DocumentKind::Spreadsheet => self.spreadsheet_parts(&package),
        };

        let mut parts = Vec::with_capacity(selection.len());
        for (name, schema) in selection {
            let Some(bytes) = package.entry(&name) else {
                continue;
            };
            let mut part = TextPart::parse(&name, schema, bytes.to_vec())?;
            if name == SHARED_STRING_TABLE {
                part.set_block_weights(shared_string_references(&package)?);
            }
            parts.push(part);
        }

        debug!(
            target: "docswap::ooxml",
            event = "package_opened",
            path = %path.display(),
            kind = %format.kind(),
            parts = parts.len(),
            "opened package"
        );
        Ok(OoxmlSession::new(package, parts))
    }

    fn word_parts(
        &self,
        package: &Package,
    ) -> Result<Vec<(String, &'static PartSchema)>, SessionError> {
        if package.entry(WORD_BODY).is_none() {
            return Err(SessionError::MissingPart {
                path: package.path().to_path_buf(),
                part: WORD_BODY,
            });
        }
        let mut parts = vec![(WORD_BODY.to_owned(), &WORD_STORY)];
        if self.options.word_headers_footers {
            parts.extend(
                package
                    .names_matching(|name| is_story(name, "word/header") || is_story(name, "word/footer"))
                    .into_iter()
                    .map(|name| (name, &WORD_STORY)),
            );
        }
        if self.options.word_notes {
            for name in ["word/footnotes.xml", "word/endnotes.xml"] {
                parts.push((name.to_owned(), &WORD_STORY));
            }
        }
        if self.options.word_properties {
            parts.push((CORE_PROPERTIES_PART.to_owned(), &CORE_PROPERTIES));
        }
        Ok(parts)
    }

    fn spreadsheet_parts(&self, package: &Package) -> Vec<(String, &'static PartSchema)> {
        let mut parts = vec![(SHARED_STRING_TABLE.to_owned(), &SHARED_STRINGS)];
        if self.options.spreadsheet_inline_strings {
            parts.extend(
                package
                    .names_matching(|name| is_story(name, WORKSHEET_PREFIX))
                    .into_iter()
                    .map(|name| (name, &INLINE_STRINGS)),
            );
        }
        if self.options.spreadsheet_properties {
            parts.push((CORE_PROPERTIES_PART.to_owned(), &CORE_PROPERTIES));
        }
        parts
    }
}

/// Number of worksheet cells referencing each shared string.
fn shared_string_references(package: &Package) -> Result<Vec<usize>, SessionError> {
    let mut counts = Vec::new();
    for name in package.names_matching(|name| is_story(name, WORKSHEET_PREFIX)) {
        if let Some(sheet) = package.entry(&name) {
            cells::count_shared_references(&name, sheet, &mut counts)?;
        }
    }
    Ok(counts)
}

fn is_story(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.ends_with(".xml") && !rest.contains('/'))
}

impl Editor for OoxmlEditor {
    fn classify(&self, path: &Path) -> Option<DocumentFormat> {
        DocumentFormat::from_path(path).filter(|format| self.options.accepts(*format))
    }

    fn open(
        &self,
        format: DocumentFormat,
        path: &Path,
    ) -> Result<Box<dyn DocumentSession>, SessionError> {
        Ok(Box::new(self.open_package(format, path)?))
    }
}
