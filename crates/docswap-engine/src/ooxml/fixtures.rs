//! Minimal OOXML packages for tests.
//!
//! The packages carry just enough structure for the editor: content types,
//! the main story or shared string table, and optional secondary parts.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const WORD_MAIN_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const SHEET_MAIN_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

/// Builder for a word-processor package.
#[derive(Debug, Clone, Default)]
pub struct DocxFixture {
    paragraphs: Vec<Vec<String>>,
    header: Option<Vec<String>>,
    title: Option<String>,
}

impl DocxFixture {
    /// Starts an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a body paragraph made of the given runs. The first run of
    /// every paragraph is bold so formatting survival can be asserted.
    #[must_use]
    pub fn paragraph(mut self, runs: &[&str]) -> Self {
        self.paragraphs
            .push(runs.iter().map(|run| (*run).to_owned()).collect());
        self
    }

    /// Adds a header part holding one paragraph per entry.
    #[must_use]
    pub fn header(mut self, paragraphs: &[&str]) -> Self {
        self.header = Some(paragraphs.iter().map(|text| (*text).to_owned()).collect());
        self
    }

    /// Sets the core `dc:title` property.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    /// Writes the package to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let mut body = String::new();
        for runs in &self.paragraphs {
            body.push_str("<w:p>");
            for (position, run) in runs.iter().enumerate() {
                let properties = if position == 0 { "<w:rPr><w:b/></w:rPr>" } else { "" };
                body.push_str(&format!(
                    r#"<w:r>{properties}<w:t xml:space="preserve">{}</w:t></w:r>"#,
                    escape(run.as_str())
                ));
            }
            body.push_str("</w:p>");
        }

        let mut parts = vec![
            (
                "[Content_Types].xml".to_owned(),
                content_types("word/document.xml", WORD_MAIN_TYPE),
            ),
            (
                "word/document.xml".to_owned(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{WORD_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
                ),
            ),
        ];
        if let Some(header) = &self.header {
            let paragraphs: String = header
                .iter()
                .map(|text| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", escape(text.as_str())))
                .collect();
            parts.push((
                "word/header1.xml".to_owned(),
                format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:hdr xmlns:w="{WORD_NS}">{paragraphs}</w:hdr>"#),
            ));
        }
        if let Some(title) = &self.title {
            parts.push(("docProps/core.xml".to_owned(), core_properties(title)));
        }
        write_zip(path, &parts)
    }
}

/// Builder for a spreadsheet package with a single worksheet.
#[derive(Debug, Clone, Default)]
pub struct XlsxFixture {
    shared: Vec<String>,
    shared_cells: Vec<usize>,
    numbers: Vec<f64>,
    inline: Vec<String>,
    title: Option<String>,
}

impl XlsxFixture {
    /// Starts an empty workbook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cell holding a new shared string.
    #[must_use]
    pub fn shared_string(mut self, text: &str) -> Self {
        self.shared_cells.push(self.shared.len());
        self.shared.push(text.to_owned());
        self
    }

    /// Adds another cell showing the shared string at `index`.
    #[must_use]
    pub fn shared_reference(mut self, index: usize) -> Self {
        self.shared_cells.push(index);
        self
    }

    /// Adds a numeric cell.
    #[must_use]
    pub fn number(mut self, value: f64) -> Self {
        self.numbers.push(value);
        self
    }

    /// Adds an inline-string cell.
    #[must_use]
    pub fn inline_string(mut self, text: &str) -> Self {
        self.inline.push(text.to_owned());
        self
    }

    /// Sets the core `dc:title` property.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    /// Writes the package to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let mut cells = String::new();
        let mut column = b'A';
        let mut next_cell = || {
            let reference = format!("{}1", char::from(column));
            column += 1;
            reference
        };
        for index in &self.shared_cells {
            cells.push_str(&format!(r#"<c r="{}" t="s"><v>{index}</v></c>"#, next_cell()));
        }
        for value in &self.numbers {
            cells.push_str(&format!(r#"<c r="{}"><v>{value}</v></c>"#, next_cell()));
        }
        for text in &self.inline {
            cells.push_str(&format!(
                r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                next_cell(),
                escape(text.as_str())
            ));
        }

        let strings: String = self
            .shared
            .iter()
            .map(|text| format!("<si><t>{}</t></si>", escape(text.as_str())))
            .collect();
        let count = self.shared_cells.len();
        let unique = self.shared.len();

        let mut parts = vec![
            (
                "[Content_Types].xml".to_owned(),
                content_types("xl/workbook.xml", SHEET_MAIN_TYPE),
            ),
            (
                "xl/workbook.xml".to_owned(),
                format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{SHEET_NS}"><sheets><sheet name="Sheet1" sheetId="1"/></sheets></workbook>"#),
            ),
            (
                "xl/worksheets/sheet1.xml".to_owned(),
                format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{SHEET_NS}"><sheetData><row r="1">{cells}</row></sheetData></worksheet>"#),
            ),
            (
                "xl/sharedStrings.xml".to_owned(),
                format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="{SHEET_NS}" count="{count}" uniqueCount="{unique}">{strings}</sst>"#),
            ),
        ];
        if let Some(title) = &self.title {
            parts.push(("docProps/core.xml".to_owned(), core_properties(title)));
        }
        write_zip(path, &parts)
    }
}

/// Reads one part of a package as text.
///
/// # Errors
///
/// Returns an error when the package or part cannot be read.
pub fn read_part(path: &Path, name: &str) -> io::Result<String> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut part = archive.by_name(name)?;
    let mut text = String::new();
    part.read_to_string(&mut text)?;
    Ok(text)
}

/// Returns true when `path` starts with a zip signature.
#[must_use]
pub fn is_package(path: &Path) -> bool {
    fs::read(path).is_ok_and(|bytes| bytes.starts_with(b"PK\x03\x04"))
}

fn content_types(main: &str, main_type: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/{main}" ContentType="{main_type}"/></Types>"#
    )
}

fn core_properties(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{}</dc:title><dc:creator>docswap</dc:creator></cp:coreProperties>"#,
        escape(title)
    )
}

fn write_zip(path: &Path, parts: &[(String, String)]) -> io::Result<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    for (name, body) in parts {
        zip.start_file(name.as_str(), SimpleFileOptions::default())?;
        zip.write_all(body.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}
