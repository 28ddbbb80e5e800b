//! The individual replacement techniques tried for each rule.

use std::fmt;

use tracing::warn;

use crate::rules::Rule;
use crate::session::{BLOCK_SEPARATOR, DocumentSession, SessionError};

use super::ENGINE_TARGET;

/// One technique for applying a rule to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Cursor-driven native find/replace, run from the document start.
    StructuredFind,
    /// Rewrite of the whole plain text.
    WholeText,
    /// Rewrite of each block's text in turn.
    PerBlock,
    /// The editor's native replace-all, used when verification fails.
    ForcedReplaceAll,
}

impl Strategy {
    /// Strategies tried, in order, before verification.
    pub const ORDERED: [Self; 3] = [Self::StructuredFind, Self::WholeText, Self::PerBlock];

    /// Stable identifier used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StructuredFind => "structured_find",
            Self::WholeText => "whole_text",
            Self::PerBlock => "per_block",
            Self::ForcedReplaceAll => "forced_replace_all",
        }
    }

    pub(crate) fn apply(
        self,
        session: &mut dyn DocumentSession,
        rule: &Rule,
        budget: usize,
    ) -> Result<usize, SessionError> {
        match self {
            Self::StructuredFind => structured_find(session, rule, budget),
            Self::WholeText => whole_text(session, rule),
            Self::PerBlock => per_block(session, rule),
            Self::ForcedReplaceAll => session.replace_all(rule.search(), rule.replace()),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts non-overlapping occurrences of `needle`.
pub(crate) fn occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

// The budget caps the loop so an editor that keeps reporting matches it never
// removes cannot spin forever.
fn structured_find(
    session: &mut dyn DocumentSession,
    rule: &Rule,
    budget: usize,
) -> Result<usize, SessionError> {
    session.rewind();
    let mut count = 0;
    for _ in 0..budget {
        let Some(block) = session.replace_next(rule.search(), rule.replace())? else {
            break;
        };
        count += session.block_weight(block);
    }
    Ok(count)
}

fn whole_text(session: &mut dyn DocumentSession, rule: &Rule) -> Result<usize, SessionError> {
    let text = session.text()?;
    if occurrences(&text, rule.search()) == 0 {
        return Ok(0);
    }
    let count = weighted_occurrences(session, &text, rule.search());
    session.set_text(&text.replace(rule.search(), rule.replace()))?;
    Ok(count)
}

/// Occurrences in the full text, each counted once per place its block is
/// displayed. A search spanning blocks is counted unweighted.
fn weighted_occurrences(session: &dyn DocumentSession, text: &str, search: &str) -> usize {
    if search.contains(BLOCK_SEPARATOR) {
        return occurrences(text, search);
    }
    text.split(BLOCK_SEPARATOR)
        .enumerate()
        .map(|(index, block)| occurrences(block, search) * session.block_weight(index))
        .sum()
}

fn per_block(session: &mut dyn DocumentSession, rule: &Rule) -> Result<usize, SessionError> {
    let mut count = 0;
    for index in 0..session.block_count() {
        match replace_in_block(session, rule, index) {
            Ok(replaced) => count += replaced,
            Err(error) => warn!(
                target: ENGINE_TARGET,
                event = "block_replace_failed",
                block = index,
                rule = %rule,
                error = %error,
                "skipping block"
            ),
        }
    }
    Ok(count)
}

fn replace_in_block(
    session: &mut dyn DocumentSession,
    rule: &Rule,
    index: usize,
) -> Result<usize, SessionError> {
    let text = session.block_text(index)?;
    let count = occurrences(&text, rule.search());
    if count == 0 {
        return Ok(0);
    }
    session.set_block_text(index, &text.replace(rule.search(), rule.replace()))?;
    Ok(count * session.block_weight(index))
}
