//! Ordered, immutable replacement rules.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// A single literal search/replace pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    search: String,
    replace: String,
}

impl Rule {
    /// Builds a rule, rejecting an empty search text.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError::EmptySearch`] when `search` is empty.
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Result<Self, RuleSetError> {
        let search = search.into();
        if search.is_empty() {
            return Err(RuleSetError::EmptySearch);
        }
        Ok(Self {
            search,
            replace: replace.into(),
        })
    }

    /// Text to look for.
    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Text written in place of every match.
    #[must_use]
    pub fn replace(&self) -> &str {
        &self.replace
    }

    /// Length of the search text in characters.
    #[must_use]
    pub fn search_chars(&self) -> usize {
        self.search.chars().count()
    }

    /// Length of the replacement text in characters.
    #[must_use]
    pub fn replace_chars(&self) -> usize {
        self.replace.chars().count()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' -> '{}'", self.search, self.replace)
    }
}

/// Errors raised while assembling a [`RuleSet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSetError {
    /// A rule had an empty search text.
    #[error("replacement rules must have a non-empty search text")]
    EmptySearch,
    /// Two rules shared the same search text.
    #[error("search text '{0}' appears in more than one rule")]
    DuplicateSearch(String),
}

/// Rules applied to every document, in caller-defined order.
///
/// Rules are not isolated from each other: a later rule sees the text an
/// earlier rule produced, so `A -> B` followed by `B -> C` turns `A` into `C`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Builds a rule set from ordered pairs.
    ///
    /// # Errors
    ///
    /// Returns an error when a search text is empty or repeated.
    pub fn from_pairs<I, S, R>(pairs: I) -> Result<Self, RuleSetError>
    where
        I: IntoIterator<Item = (S, R)>,
        S: Into<String>,
        R: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut rules = Vec::new();
        for (search, replace) in pairs {
            let rule = Rule::new(search, replace)?;
            if !seen.insert(rule.search.clone()) {
                return Err(RuleSetError::DuplicateSearch(rule.search));
            }
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Rules in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when the set holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_caller_order() {
        let rules = RuleSet::from_pairs([("b", "1"), ("a", "2")]).expect("valid rules");
        let order: Vec<&str> = rules.iter().map(Rule::search).collect();
        assert_eq!(order, ["b", "a"]);
    }

    #[test]
    fn rejects_empty_search() {
        assert_eq!(
            RuleSet::from_pairs([("", "x")]),
            Err(RuleSetError::EmptySearch)
        );
    }

    #[test]
    fn rejects_duplicate_search() {
        assert_eq!(
            RuleSet::from_pairs([("a", "x"), ("a", "y")]),
            Err(RuleSetError::DuplicateSearch("a".to_string()))
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        let rule = Rule::new("年度", "年份报告").expect("valid rule");
        assert_eq!(rule.search_chars(), 2);
        assert_eq!(rule.replace_chars(), 4);
    }
}
