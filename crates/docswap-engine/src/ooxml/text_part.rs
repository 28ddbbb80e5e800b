//! Block and run model of one XML part.
//!
//! A part is parsed into blocks (paragraphs, shared strings, inline strings,
//! property values) made of runs, the text-carrying elements whose siblings
//! hold formatting. Edits change run text only. Rendering re-streams the
//! original events and swaps in the new text of each run, so every other
//! byte of the part survives untouched.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::session::SessionError;

/// Element names that shape a part's text.
#[derive(Debug)]
pub(crate) struct PartSchema {
    /// Elements that delimit a block.
    pub(crate) block_tags: &'static [&'static str],
    /// Elements whose character data is a run. A tag may be both a block
    /// and a run when the block has no inner structure.
    pub(crate) text_tags: &'static [&'static str],
    /// Elements whose content is ignored entirely.
    pub(crate) skip_tags: &'static [&'static str],
}

impl PartSchema {
    fn is_block(&self, name: &[u8]) -> bool {
        self.block_tags.iter().any(|tag| tag.as_bytes() == name)
    }

    fn is_text(&self, name: &[u8]) -> bool {
        self.text_tags.iter().any(|tag| tag.as_bytes() == name)
    }

    fn is_skipped(&self, name: &[u8]) -> bool {
        self.skip_tags.iter().any(|tag| tag.as_bytes() == name)
    }
}

/// Paragraphs of word-processor stories.
pub(crate) const WORD_STORY: PartSchema = PartSchema {
    block_tags: &["w:p"],
    text_tags: &["w:t"],
    skip_tags: &[],
};

/// Shared string table entries. Phonetic runs are not document text.
pub(crate) const SHARED_STRINGS: PartSchema = PartSchema {
    block_tags: &["si"],
    text_tags: &["t"],
    skip_tags: &["rPh"],
};

/// Inline-string cells inside worksheets.
pub(crate) const INLINE_STRINGS: PartSchema = PartSchema {
    block_tags: &["is"],
    text_tags: &["t"],
    skip_tags: &["rPh"],
};

/// Title, subject, keywords and comments of the core properties.
pub(crate) const CORE_PROPERTIES: PartSchema = PartSchema {
    block_tags: &["dc:title", "dc:subject", "cp:keywords", "dc:description"],
    text_tags: &["dc:title", "dc:subject", "cp:keywords", "dc:description"],
    skip_tags: &[],
};

#[derive(Debug, Default, Clone, Copy)]
struct Transition {
    block: bool,
    run: bool,
}

/// Tracks block and run nesting while events stream past. Parsing and
/// rendering share it so both passes agree on which elements are runs.
struct Walker<'s> {
    schema: &'s PartSchema,
    depth: usize,
    skip_from: Option<usize>,
    open_blocks: usize,
    in_run: bool,
}

impl<'s> Walker<'s> {
    const fn new(schema: &'s PartSchema) -> Self {
        Self {
            schema,
            depth: 0,
            skip_from: None,
            open_blocks: 0,
            in_run: false,
        }
    }

    fn enter(&mut self, name: &[u8]) -> Transition {
        self.depth += 1;
        if self.skip_from.is_some() {
            return Transition::default();
        }
        if self.schema.is_skipped(name) {
            self.skip_from = Some(self.depth);
            return Transition::default();
        }
        let block = self.schema.is_block(name);
        if block {
            self.open_blocks += 1;
        }
        let run = !self.in_run && self.open_blocks > 0 && self.schema.is_text(name);
        if run {
            self.in_run = true;
        }
        Transition { block, run }
    }

    fn leave(&mut self, name: &[u8]) -> Transition {
        let depth = self.depth;
        self.depth = self.depth.saturating_sub(1);
        if let Some(from) = self.skip_from {
            if from == depth {
                self.skip_from = None;
            }
            return Transition::default();
        }
        let run = self.in_run && self.schema.is_text(name);
        if run {
            self.in_run = false;
        }
        let block = self.schema.is_block(name);
        if block {
            self.open_blocks = self.open_blocks.saturating_sub(1);
        }
        Transition { block, run }
    }

    fn empty_block(&self, name: &[u8]) -> bool {
        self.skip_from.is_none() && self.schema.is_block(name)
    }

    const fn in_run(&self) -> bool {
        self.in_run
    }
}

#[derive(Debug, Clone, Default)]
struct Run {
    text: String,
    changed: bool,
}

impl Run {
    fn set(&mut self, text: String) {
        self.text = text;
        self.changed = true;
    }
}

/// One parsed XML part.
#[derive(Debug, Clone)]
pub(crate) struct TextPart {
    name: String,
    schema: &'static PartSchema,
    source: Vec<u8>,
    runs: Vec<Run>,
    blocks: Vec<Vec<usize>>,
    weights: Vec<usize>,
    dirty: bool,
}

impl TextPart {
    /// Parses `source` as the part called `name`.
    pub(crate) fn parse(
        name: &str,
        schema: &'static PartSchema,
        source: Vec<u8>,
    ) -> Result<Self, SessionError> {
        let mut runs: Vec<Run> = Vec::new();
        let mut blocks: Vec<Vec<usize>> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let mut walker = Walker::new(schema);

        let mut reader = Reader::from_reader(source.as_slice());
        let mut buf = Vec::new();
        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|error| xml_error(name, &error))?
            {
                Event::Start(start) => {
                    let entered = walker.enter(start.name().as_ref());
                    if entered.block {
                        open.push(blocks.len());
                        blocks.push(Vec::new());
                    }
                    if entered.run {
                        if let Some(block) = open.last().and_then(|index| blocks.get_mut(*index)) {
                            block.push(runs.len());
                        }
                        runs.push(Run::default());
                    }
                }
                Event::Empty(start) => {
                    if walker.empty_block(start.name().as_ref()) {
                        blocks.push(Vec::new());
                    }
                }
                Event::End(end) => {
                    if walker.leave(end.name().as_ref()).block {
                        open.pop();
                    }
                }
                Event::Text(text) if walker.in_run() => {
                    let unescaped = text.unescape().map_err(|error| xml_error(name, &error))?;
                    if let Some(run) = runs.last_mut() {
                        run.text.push_str(&unescaped);
                    }
                }
                Event::CData(data) if walker.in_run() => {
                    let raw = std::str::from_utf8(&data).map_err(|error| SessionError::Xml {
                        part: name.to_owned(),
                        message: error.to_string(),
                    })?;
                    if let Some(run) = runs.last_mut() {
                        run.text.push_str(raw);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            name: name.to_owned(),
            schema,
            source,
            runs,
            blocks,
            weights: Vec::new(),
            dirty: false,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Records how many places display each block, by block position.
    pub(crate) fn set_block_weights(&mut self, weights: Vec<usize>) {
        self.weights = weights;
    }

    /// Places that display `block`. Blocks without a recorded weight, or
    /// displayed nowhere, count once.
    pub(crate) fn block_weight(&self, block: usize) -> usize {
        self.weights.get(block).copied().unwrap_or(1).max(1)
    }

    /// Concatenated run text of one block.
    pub(crate) fn block_text(&self, block: usize) -> String {
        self.blocks
            .get(block)
            .map(|runs| {
                runs.iter()
                    .filter_map(|run| self.runs.get(*run))
                    .map(|run| run.text.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replaces the first occurrence of `search` at or after byte offset
    /// `from` of the block's text. Untouched runs keep their text; the
    /// replacement lands in the run where the match starts.
    ///
    /// Returns the byte offset just past the inserted text, or `None` when
    /// there is no further match.
    pub(crate) fn replace_in_block(
        &mut self,
        block: usize,
        from: usize,
        search: &str,
        replacement: &str,
    ) -> Option<usize> {
        let text = self.block_text(block);
        let start = from + text.get(from..)?.find(search)?;
        let end = start + search.len();
        let run_ids = self.blocks.get(block)?.clone();

        let mut run_start = 0;
        let mut inserted = false;
        for id in run_ids {
            let Some(run) = self.runs.get_mut(id) else {
                continue;
            };
            let run_end = run_start + run.text.len();
            if !run.text.is_empty() && run_start < end && start < run_end {
                let keep_head = start.saturating_sub(run_start);
                let tail = if end < run_end {
                    run.text.get(end - run_start..).unwrap_or_default()
                } else {
                    ""
                };
                let mut updated = String::with_capacity(run.text.len() + replacement.len());
                if !inserted {
                    updated.push_str(run.text.get(..keep_head).unwrap_or_default());
                    updated.push_str(replacement);
                    inserted = true;
                }
                updated.push_str(tail);
                run.set(updated);
            }
            run_start = run_end;
        }
        self.dirty = true;
        Some(start + replacement.len())
    }

    /// Overwrites a block's text. The first run receives all of it and the
    /// others are emptied. Returns `false` when the block has no run.
    pub(crate) fn set_block_text(&mut self, block: usize, text: &str) -> bool {
        let Some(run_ids) = self.blocks.get(block) else {
            return false;
        };
        let Some((first, rest)) = run_ids.split_first() else {
            return text.is_empty();
        };
        for (position, id) in std::iter::once(first).chain(rest).enumerate() {
            if let Some(run) = self.runs.get_mut(*id) {
                run.set(if position == 0 {
                    text.to_owned()
                } else {
                    String::new()
                });
            }
        }
        self.dirty = true;
        true
    }

    /// Serialises the part with the current run text. Runs that were never
    /// edited keep their original markup.
    pub(crate) fn render(&self) -> Result<Vec<u8>, SessionError> {
        let mut reader = Reader::from_reader(self.source.as_slice());
        let mut writer = Writer::new(Vec::with_capacity(self.source.len()));
        let mut walker = Walker::new(self.schema);
        let mut next_run = 0;
        let mut rewriting = false;
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|error| xml_error(&self.name, &error))?;
            match event {
                Event::Start(start) => {
                    let entered = walker.enter(start.name().as_ref());
                    let edited = if entered.run {
                        next_run += 1;
                        self.runs.get(next_run - 1).filter(|run| run.changed)
                    } else {
                        None
                    };
                    if let Some(run) = edited {
                        rewriting = true;
                        let start = preserving_space(start, &run.text);
                        self.write(&mut writer, Event::Start(start))?;
                        self.write(&mut writer, Event::Text(BytesText::new(&run.text)))?;
                    } else {
                        self.write(&mut writer, Event::Start(start))?;
                    }
                }
                Event::End(end) => {
                    if walker.leave(end.name().as_ref()).run {
                        rewriting = false;
                    }
                    self.write(&mut writer, Event::End(end))?;
                }
                Event::Text(_) | Event::CData(_) if rewriting => {}
                Event::Eof => break,
                other => self.write(&mut writer, other)?,
            }
            buf.clear();
        }

        Ok(writer.into_inner())
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), SessionError> {
        writer
            .write_event(event)
            .map_err(|error| xml_error(&self.name, &error))
    }
}

fn preserving_space<'a>(mut start: BytesStart<'a>, text: &str) -> BytesStart<'a> {
    let padded = text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace);
    let declared = start
        .try_get_attribute("xml:space")
        .ok()
        .flatten()
        .is_some();
    if padded && !declared {
        start.push_attribute(("xml:space", "preserve"));
    }
    start
}

pub(super) fn xml_error(part: &str, error: &impl std::fmt::Display) -> SessionError {
    SessionError::Xml {
        part: part.to_owned(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Fiscal </w:t></w:r><w:r><w:t>20</w:t></w:r><w:r><w:t>19 &amp; beyond</w:t></w:r></w:p>"#,
        r#"<w:p/>"#,
        r#"<w:p><w:r><w:t/></w:r><w:r><w:t xml:space="preserve"> tail</w:t></w:r></w:p>"#,
        r#"</w:body></w:document>"#
    );

    fn body() -> TextPart {
        TextPart::parse("word/document.xml", &WORD_STORY, BODY.as_bytes().to_vec()).expect("parse")
    }

    fn rendered(part: &TextPart) -> String {
        String::from_utf8(part.render().expect("render")).expect("utf-8")
    }

    #[test]
    fn parses_blocks_and_runs() {
        let part = body();
        assert_eq!(part.block_count(), 3);
        assert_eq!(part.block_text(0), "Fiscal 2019 & beyond");
        assert_eq!(part.block_text(1), "");
        assert_eq!(part.block_text(2), " tail");
    }

    #[test]
    fn untouched_part_renders_identically() {
        assert_eq!(rendered(&body()), BODY);
    }

    #[test]
    fn replacement_spanning_runs_keeps_formatting() {
        let mut part = body();
        let cursor = part.replace_in_block(0, 0, "2019", "2023");

        assert_eq!(cursor, Some(11));
        assert_eq!(part.block_text(0), "Fiscal 2023 & beyond");
        let xml = rendered(&part);
        assert!(xml.contains("<w:rPr><w:b/></w:rPr><w:t>Fiscal </w:t>"));
        assert!(xml.contains("<w:t>2023</w:t>"));
    }

    #[test]
    fn leading_space_is_preserved() {
        let mut part = body();
        part.replace_in_block(0, 0, "2019", "2023");
        let xml = rendered(&part);
        assert!(xml.contains(r#"<w:t xml:space="preserve"> &amp; beyond</w:t>"#));
        assert!(xml.contains(r#"<w:t xml:space="preserve"> tail</w:t>"#));
    }

    #[test]
    fn replace_in_block_honours_the_cursor() {
        let mut part = body();
        assert_eq!(part.replace_in_block(0, 8, "2019", "x"), None);
        assert!(!part.is_dirty());
    }

    #[test]
    fn set_block_text_collapses_into_the_first_run() {
        let mut part = body();
        assert!(part.set_block_text(0, "Plain"));
        assert_eq!(part.block_text(0), "Plain");
        assert!(!part.set_block_text(1, "no runs here"));
        assert!(part.set_block_text(1, ""));
    }

    #[test]
    fn phonetic_runs_are_ignored() {
        let xml = concat!(
            r#"<sst><si><t>東京</t><rPh sb="0" eb="2"><t>トウキョウ</t></rPh></si>"#,
            r#"<si><r><t>Report </t></r><r><t>2019</t></r></si></sst>"#
        );
        let mut part = TextPart::parse("xl/sharedStrings.xml", &SHARED_STRINGS, xml.as_bytes().to_vec())
            .expect("parse");
        assert_eq!(part.block_text(0), "東京");
        assert_eq!(part.block_text(1), "Report 2019");

        part.replace_in_block(1, 0, "2019", "2023");
        let out = rendered(&part);
        assert!(out.contains("<t>トウキョウ</t>"));
        assert!(out.contains("<t>2023</t>"));
    }

    #[test]
    fn block_weights_default_to_one() {
        let mut part = body();
        part.set_block_weights(vec![3, 0]);
        assert_eq!(part.block_weight(0), 3);
        assert_eq!(part.block_weight(1), 1);
        assert_eq!(part.block_weight(2), 1);
    }

    #[test]
    fn malformed_xml_is_reported() {
        let result = TextPart::parse("word/document.xml", &WORD_STORY, b"<w:p><w:t>x</w:p>".to_vec());
        assert!(matches!(result, Err(SessionError::Xml { .. })));
    }
}
