//! Post-edit verification of a rule's replacements.
//!
//! Editing primitives sometimes report replacements that never reach the
//! document, or report the same region twice after two strategies touch it.
//! The oracle therefore looks at the document itself: either the search text
//! is gone, or a bounded sample of the positions it occupied before editing
//! now shows the change.

use tracing::debug;

use crate::rules::Rule;
use crate::session::{DocumentSession, SessionError};

/// Maximum number of occurrence offsets recorded before a rule is applied.
pub const MAX_SAMPLES: usize = 5;

/// Character offsets of the first few occurrences of a search text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    offsets: Vec<usize>,
}

impl SampleSet {
    /// Records the offsets of up to `limit` non-overlapping occurrences of
    /// `search` in `text`.
    #[must_use]
    pub fn collect(text: &str, search: &str, limit: usize) -> Self {
        let mut offsets = Vec::new();
        if search.is_empty() {
            return Self { offsets };
        }

        let mut byte_cursor = 0;
        let mut char_cursor = 0;
        while offsets.len() < limit {
            let Some(found) = text.get(byte_cursor..).and_then(|rest| rest.find(search)) else {
                break;
            };
            let byte_offset = byte_cursor + found;
            char_cursor += text
                .get(byte_cursor..byte_offset)
                .map_or(0, |skipped| skipped.chars().count());
            offsets.push(char_cursor);
            char_cursor += search.chars().count();
            byte_cursor = byte_offset + search.len();
        }
        Self { offsets }
    }

    /// Builds a sample set from explicit offsets.
    #[must_use]
    pub fn from_offsets(offsets: Vec<usize>) -> Self {
        Self { offsets }
    }

    /// Recorded offsets, in document order.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Number of recorded offsets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Outcome of verifying one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The search text no longer occurs anywhere.
    SearchAbsent,
    /// Enough samples show the replacement.
    SamplesReplaced {
        /// Samples that changed.
        replaced: usize,
        /// Samples inspected.
        total: usize,
    },
    /// Too few samples show the replacement.
    SamplesUnchanged {
        /// Samples that changed.
        replaced: usize,
        /// Samples inspected.
        total: usize,
    },
    /// The document could not be read back.
    Unavailable {
        /// Description of the read failure.
        message: String,
    },
}

impl Verdict {
    /// Returns true when the replacement is believed to have persisted.
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::SearchAbsent | Self::SamplesReplaced { .. })
    }
}

/// Acceptance threshold for sampled verification.
///
/// At least one sample must have changed, and at least half of them. With
/// five samples, two changed samples fail and three pass.
#[must_use]
pub const fn threshold_met(replaced: usize, total: usize) -> bool {
    replaced > 0 && replaced * 2 >= total
}

/// Checks whether `rule` took effect in `session`.
pub fn verify(session: &dyn DocumentSession, rule: &Rule, samples: &SampleSet) -> Verdict {
    let text = match session.text() {
        Ok(text) => text,
        Err(error) => {
            return Verdict::Unavailable {
                message: error.to_string(),
            };
        }
    };

    if !text.contains(rule.search()) {
        return Verdict::SearchAbsent;
    }

    let total = samples.len();
    let replaced = samples
        .offsets()
        .iter()
        .filter(|offset| sample_replaced(session, rule, **offset))
        .count();

    if threshold_met(replaced, total) {
        Verdict::SamplesReplaced { replaced, total }
    } else {
        Verdict::SamplesUnchanged { replaced, total }
    }
}

fn sample_replaced(session: &dyn DocumentSession, rule: &Rule, offset: usize) -> bool {
    let check = || -> Result<bool, SessionError> {
        let under_replacement = session.text_at(offset, rule.replace_chars())?;
        if under_replacement == rule.replace() {
            return Ok(true);
        }
        let under_search = session.text_at(offset, rule.search_chars())?;
        Ok(under_search != rule.search())
    };
    check().unwrap_or_else(|error| {
        debug!(offset, error = %error, "sample could not be read back");
        false
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::test_doubles::ScriptedSession;

    fn rule(search: &str, replace: &str) -> Rule {
        Rule::new(search, replace).expect("valid rule")
    }

    #[test]
    fn collects_character_offsets() {
        let samples = SampleSet::collect("年度 2019, 年度 2019", "2019", MAX_SAMPLES);
        assert_eq!(samples.offsets(), &[3, 12]);
    }

    #[test]
    fn collects_non_overlapping_occurrences() {
        let samples = SampleSet::collect("aaaa", "aa", MAX_SAMPLES);
        assert_eq!(samples.offsets(), &[0, 2]);
    }

    #[test]
    fn caps_sample_count() {
        let text = "x ".repeat(20);
        let samples = SampleSet::collect(&text, "x", MAX_SAMPLES);
        assert_eq!(samples.len(), MAX_SAMPLES);
        assert_eq!(samples.offsets(), &[0, 2, 4, 6, 8]);
    }

    #[test]
    fn absent_search_text_passes_immediately() {
        let session = ScriptedSession::from_text("Report 2023");
        let samples = SampleSet::from_offsets(vec![7]);
        assert_eq!(
            verify(&session, &rule("2019", "2023"), &samples),
            Verdict::SearchAbsent
        );
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, false)]
    #[case(2, false)]
    #[case(3, true)]
    #[case(4, true)]
    #[case(5, true)]
    fn threshold_with_five_samples(#[case] replaced: usize, #[case] passes: bool) {
        let mut pieces = vec!["xy"; replaced];
        pieces.extend(std::iter::repeat_n("ab", 5 - replaced));
        let session = ScriptedSession::from_text(&pieces.join(" "));
        let samples = SampleSet::from_offsets(vec![0, 3, 6, 9, 12]);

        let verdict = verify(&session, &rule("ab", "xy"), &samples);

        assert_eq!(verdict.passed(), passes, "verdict was {verdict:?}");
    }

    #[test]
    fn replacement_containing_search_counts_as_replaced() {
        let session = ScriptedSession::from_text("AB AB");
        let samples = SampleSet::from_offsets(vec![0, 3]);
        let verdict = verify(&session, &rule("A", "AB"), &samples);
        assert_eq!(
            verdict,
            Verdict::SamplesReplaced {
                replaced: 2,
                total: 2
            }
        );
    }

    #[test]
    fn unreadable_document_fails() {
        let session = ScriptedSession::from_text("ab").with_unreadable_text();
        let verdict = verify(&session, &rule("ab", "xy"), &SampleSet::from_offsets(vec![0]));
        assert!(matches!(verdict, Verdict::Unavailable { .. }));
        assert!(!verdict.passed());
    }

    #[test]
    fn no_samples_never_passes_while_search_remains() {
        let session = ScriptedSession::from_text("ab");
        let verdict = verify(&session, &rule("ab", "xy"), &SampleSet::default());
        assert!(!verdict.passed());
    }
}
