//! Editing session over one opened package.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::session::{BLOCK_SEPARATOR, DocumentSession, SessionError};

use super::package::Package;
use super::text_part::TextPart;

/// Position of the find cursor: a block and a byte offset into its text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    block: usize,
    offset: usize,
}

/// A [`DocumentSession`] over the text parts of an OOXML package.
///
/// Blocks from every part are numbered in part order, so block indices and
/// the full text span the body, any enabled secondary stories and the
/// document properties.
#[derive(Debug)]
pub struct OoxmlSession {
    package: Package,
    parts: Vec<TextPart>,
    blocks: Vec<(usize, usize)>,
    cursor: Cursor,
    closed: bool,
}

impl OoxmlSession {
    pub(crate) fn new(package: Package, parts: Vec<TextPart>) -> Self {
        let blocks = parts
            .iter()
            .enumerate()
            .flat_map(|(part, text)| (0..text.block_count()).map(move |block| (part, block)))
            .collect();
        Self {
            package,
            parts,
            blocks,
            cursor: Cursor::default(),
            closed: false,
        }
    }

    /// Names of the parts this session edits, in block order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(TextPart::name)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn locate(&self, index: usize) -> Result<(usize, usize), SessionError> {
        self.blocks
            .get(index)
            .copied()
            .ok_or(SessionError::BlockOutOfRange {
                index,
                count: self.blocks.len(),
            })
    }

    fn splice(
        &mut self,
        index: usize,
        from: usize,
        search: &str,
        replacement: &str,
    ) -> Option<usize> {
        let (part, block) = self.blocks.get(index).copied()?;
        self.parts
            .get_mut(part)?
            .replace_in_block(block, from, search, replacement)
    }
}

impl DocumentSession for OoxmlSession {
    fn text(&self) -> Result<String, SessionError> {
        self.ensure_open()?;
        let mut text = String::new();
        for (position, (part, block)) in self.blocks.iter().enumerate() {
            if position > 0 {
                text.push(BLOCK_SEPARATOR);
            }
            if let Some(part) = self.parts.get(*part) {
                text.push_str(&part.block_text(*block));
            }
        }
        Ok(text)
    }

    fn rewind(&mut self) {
        self.cursor = Cursor::default();
    }

    fn replace_next(
        &mut self,
        search: &str,
        replacement: &str,
    ) -> Result<Option<usize>, SessionError> {
        self.ensure_open()?;
        if search.is_empty() {
            return Ok(None);
        }
        let Cursor { block, offset } = self.cursor;
        for index in block..self.blocks.len() {
            let from = if index == block { offset } else { 0 };
            if let Some(next) = self.splice(index, from, search, replacement) {
                self.cursor = Cursor {
                    block: index,
                    offset: next,
                };
                return Ok(Some(index));
            }
        }
        self.cursor = Cursor {
            block: self.blocks.len(),
            offset: 0,
        };
        Ok(None)
    }

    fn set_text(&mut self, text: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        let lines: Vec<&str> = text.split(BLOCK_SEPARATOR).collect();
        if lines.len() != self.blocks.len() {
            return Err(SessionError::StructureMismatch {
                expected: self.blocks.len(),
                found: lines.len(),
            });
        }
        for (index, line) in lines.into_iter().enumerate() {
            if self.block_text(index)? != line {
                self.set_block_text(index, line)?;
            }
        }
        Ok(())
    }

    fn block_count(&self) -> usize {
        if self.closed { 0 } else { self.blocks.len() }
    }

    fn block_text(&self, index: usize) -> Result<String, SessionError> {
        self.ensure_open()?;
        let (part, block) = self.locate(index)?;
        Ok(self
            .parts
            .get(part)
            .map(|part| part.block_text(block))
            .unwrap_or_default())
    }

    fn set_block_text(&mut self, index: usize, text: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        let (part, block) = self.locate(index)?;
        let written = self
            .parts
            .get_mut(part)
            .is_some_and(|part| part.set_block_text(block, text));
        if written {
            Ok(())
        } else {
            Err(SessionError::NoTextRun { index })
        }
    }

    fn block_weight(&self, index: usize) -> usize {
        self.locate(index)
            .ok()
            .and_then(|(part, block)| self.parts.get(part).map(|part| part.block_weight(block)))
            .unwrap_or(1)
    }

    fn replace_all(&mut self, search: &str, replacement: &str) -> Result<usize, SessionError> {
        self.ensure_open()?;
        if search.is_empty() {
            return Ok(0);
        }
        let mut count = 0;
        for index in 0..self.blocks.len() {
            let weight = self.block_weight(index);
            let mut from = 0;
            while let Some(next) = self.splice(index, from, search, replacement) {
                count += weight;
                from = next;
            }
        }
        self.rewind();
        Ok(count)
    }

    fn save_as(&mut self, path: &Path) -> Result<(), SessionError> {
        self.ensure_open()?;
        let mut replaced = HashMap::new();
        for part in self.parts.iter().filter(|part| part.is_dirty()) {
            replaced.insert(part.name().to_owned(), part.render()?);
        }
        debug!(
            target: "docswap::ooxml",
            event = "package_saved",
            source = %self.package.path().display(),
            target_path = %path.display(),
            edited_parts = replaced.len(),
            "writing package"
        );
        self.package.write(path, &replaced)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
