//! Shared-string references held by worksheet cells.
//!
//! A workbook stores each distinct string once and lets any number of cells
//! point at it, so one edit to the table changes every referencing cell.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::session::SessionError;

use super::text_part::xml_error;

/// Adds the shared-string references of one worksheet to `counts`, indexed
/// by shared-string position. The vector grows to fit the largest index.
pub(crate) fn count_shared_references(
    part: &str,
    sheet: &[u8],
    counts: &mut Vec<usize>,
) -> Result<(), SessionError> {
    let mut reader = Reader::from_reader(sheet);
    let mut buf = Vec::new();
    let mut shared_cell = false;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(|error| xml_error(part, &error))? {
            Event::Start(start) => match start.name().as_ref() {
                b"c" => {
                    shared_cell = start
                        .try_get_attribute("t")
                        .map_err(|error| xml_error(part, &error))?
                        .is_some_and(|kind| &*kind.value == b"s");
                }
                b"v" => in_value = shared_cell,
                _ => {}
            },
            Event::End(end) => match end.name().as_ref() {
                b"c" => shared_cell = false,
                b"v" => in_value = false,
                _ => {}
            },
            Event::Text(text) if in_value => {
                let raw = text.unescape().map_err(|error| xml_error(part, &error))?;
                if let Ok(index) = raw.trim().parse::<usize>() {
                    if counts.len() <= index {
                        counts.resize(index + 1, 0);
                    }
                    if let Some(count) = counts.get_mut(index) {
                        *count += 1;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_cell_pointing_at_a_string() {
        let sheet = concat!(
            r#"<worksheet><sheetData><row r="1">"#,
            r#"<c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>2</v></c>"#,
            r#"<c r="C1" t="s"><v>0</v></c><c r="D1"><v>0</v></c>"#,
            r#"<c r="E1" t="inlineStr"><is><t>0</t></is></c>"#,
            r#"</row></sheetData></worksheet>"#
        );
        let mut counts = Vec::new();

        count_shared_references("xl/worksheets/sheet1.xml", sheet.as_bytes(), &mut counts)
            .expect("sheet parses");

        assert_eq!(counts, [2, 0, 1]);
    }

    #[test]
    fn references_accumulate_across_sheets() {
        let sheet = r#"<worksheet><sheetData><row><c t="s"><v>1</v></c></row></sheetData></worksheet>"#;
        let mut counts = vec![1, 1];

        count_shared_references("xl/worksheets/sheet2.xml", sheet.as_bytes(), &mut counts)
            .expect("sheet parses");

        assert_eq!(counts, [1, 2]);
    }
}
