//! Raw replacement rules as they appear in configuration sources.
//!
//! Configuration files spell rules as tables (`{ search = "..", replace = ".." }`)
//! while the command line accepts the compact `search=replace` form. Validation
//! of the complete rule list (non-empty, unique search keys) happens when the
//! binary builds the engine's rule set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One search/replace pair read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleSpec {
    /// Literal text to look for.
    pub search: String,
    /// Literal text written in its place.
    #[serde(default)]
    pub replace: String,
}

impl RuleSpec {
    /// Builds a rule specification from its two halves.
    #[must_use]
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }
}

/// Errors raised while parsing the `search=replace` command-line form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    /// The argument lacked the `=` separator.
    #[error("rule '{0}' must use the form search=replace")]
    MissingSeparator(String),
    /// The search half was empty.
    #[error("rule '{0}' has an empty search text")]
    EmptySearch(String),
}

impl FromStr for RuleSpec {
    type Err = RuleParseError;

    /// Splits on the first `=`, so replacements may contain `=` but search
    /// texts may not. Use the table form in a configuration file for those.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (search, replace) = value
            .split_once('=')
            .ok_or_else(|| RuleParseError::MissingSeparator(value.to_string()))?;
        if search.is_empty() {
            return Err(RuleParseError::EmptySearch(value.to_string()));
        }
        Ok(Self::new(search, replace))
    }
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" -> \"{}\"", self.search, self.replace)
    }
}
