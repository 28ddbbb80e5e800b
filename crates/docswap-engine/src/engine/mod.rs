//! Multi-strategy rule application with a verification gate.
//!
//! Each rule is applied with every strategy in [`Strategy::ORDERED`]. The
//! strategies are redundant attempts at the same edit rather than additive
//! passes, so the largest count any of them reports becomes the provisional
//! count. The verification oracle then decides whether that count is
//! believed. A failed check triggers one forced replace-all; a check that
//! still fails zeroes the count.
//!
//! Strategy errors are logged and never abort the document. The only error
//! the engine returns is an expired deadline, which the caller treats like
//! any other editing failure.

mod strategies;

#[cfg(test)]
mod tests;

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::rules::{Rule, RuleSet};
use crate::session::DocumentSession;
use crate::verification::{MAX_SAMPLES, SampleSet, Verdict, verify};

pub use strategies::Strategy;
use strategies::occurrences;

pub(crate) const ENGINE_TARGET: &str = "docswap::engine";

/// Errors that stop rule application for a document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The per-document deadline expired before every rule was applied.
    #[error("deadline exceeded after {applied} of {total} rules")]
    DeadlineExceeded {
        /// Rules finished before the deadline.
        applied: usize,
        /// Rules in the set.
        total: usize,
    },
}

/// What happened to one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    /// The rule applied.
    pub rule: Rule,
    /// Strategy credited with the reported count.
    pub strategy: Option<Strategy>,
    /// Replacements believed to have persisted.
    pub count: usize,
    /// Whether verification accepted the edit.
    pub verified: bool,
}

impl RuleOutcome {
    fn untouched(rule: &Rule) -> Self {
        Self {
            rule: rule.clone(),
            strategy: None,
            count: 0,
            verified: false,
        }
    }
}

/// Per-document roll-up of rule outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineReport {
    outcomes: Vec<RuleOutcome>,
}

impl EngineReport {
    /// Outcomes in rule order.
    #[must_use]
    pub fn outcomes(&self) -> &[RuleOutcome] {
        &self.outcomes
    }

    /// Sum of every rule's count.
    #[must_use]
    pub fn total_replacements(&self) -> usize {
        self.outcomes.iter().map(|outcome| outcome.count).sum()
    }

    /// Count per rule, keyed by search text, in rule order.
    #[must_use]
    pub fn per_rule_counts(&self) -> Vec<(&str, usize)> {
        self.outcomes
            .iter()
            .map(|outcome| (outcome.rule.search(), outcome.count))
            .collect()
    }
}

/// Applies a rule set to open documents.
#[derive(Debug, Clone, Copy)]
pub struct ReplacementEngine<'a> {
    rules: &'a RuleSet,
    deadline: Option<Instant>,
}

impl<'a> ReplacementEngine<'a> {
    /// Creates an engine without a deadline.
    #[must_use]
    pub const fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            deadline: None,
        }
    }

    /// Stops applying rules once `deadline` has passed.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Applies every rule, in order, to `session`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DeadlineExceeded`] when the deadline passes
    /// before a rule starts. Rules already applied stay applied.
    pub fn apply_rules(
        &self,
        session: &mut dyn DocumentSession,
    ) -> Result<EngineReport, EngineError> {
        let total = self.rules.len();
        let mut outcomes = Vec::with_capacity(total);
        for (applied, rule) in self.rules.iter().enumerate() {
            if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(
                    target: ENGINE_TARGET,
                    event = "deadline_exceeded",
                    applied,
                    total,
                    "stopping before the next rule"
                );
                return Err(EngineError::DeadlineExceeded { applied, total });
            }
            outcomes.push(apply_rule(session, rule));
        }
        Ok(EngineReport { outcomes })
    }
}

/// Applies one rule and reconciles the strategies' counts.
pub fn apply_rule(session: &mut dyn DocumentSession, rule: &Rule) -> RuleOutcome {
    let text = match session.text() {
        Ok(text) => text,
        Err(error) => {
            warn!(
                target: ENGINE_TARGET,
                event = "text_unavailable",
                rule = %rule,
                error = %error,
                "cannot read document text; rule not applied"
            );
            return RuleOutcome::untouched(rule);
        }
    };

    let budget = occurrences(&text, rule.search());
    if budget == 0 {
        debug!(
            target: ENGINE_TARGET,
            event = "rule_absent",
            rule = %rule,
            "search text not present"
        );
        return RuleOutcome::untouched(rule);
    }
    let samples = SampleSet::collect(&text, rule.search(), MAX_SAMPLES);

    let mut best: Option<(Strategy, usize)> = None;
    for strategy in Strategy::ORDERED {
        if best.is_some() && rule.replace().contains(rule.search()) {
            // Text inserted by an earlier strategy still matches the search,
            // so later rewrites would apply the rule twice.
            debug!(
                target: ENGINE_TARGET,
                event = "strategy_skipped",
                rule = %rule,
                strategy = %strategy,
                "replacement contains the search text"
            );
            continue;
        }
        let count = run_strategy(session, rule, strategy, budget);
        if count > best.map_or(0, |(_, max)| max) {
            best = Some((strategy, count));
        }
    }

    let (mut strategy, mut count) = best.map_or((None, 0), |(used, max)| (Some(used), max));
    let verdict = verify(&*session, rule, &samples);
    let mut verified = verdict.passed();
    log_verdict(rule, &verdict);

    if !verified && count > 0 {
        count = run_strategy(session, rule, Strategy::ForcedReplaceAll, budget);
        strategy = Some(Strategy::ForcedReplaceAll);
        verified = count > 0;
    }

    if !verified {
        debug!(
            target: ENGINE_TARGET,
            event = "count_discarded",
            rule = %rule,
            "no evidence the replacement persisted"
        );
        count = 0;
    } else if count == 0 {
        count = 1;
    }

    info!(
        target: ENGINE_TARGET,
        event = "rule_applied",
        rule = %rule,
        strategy = strategy.map_or("none", Strategy::as_str),
        count,
        verified,
        "rule finished"
    );
    RuleOutcome {
        rule: rule.clone(),
        strategy,
        count,
        verified,
    }
}

fn run_strategy(
    session: &mut dyn DocumentSession,
    rule: &Rule,
    strategy: Strategy,
    budget: usize,
) -> usize {
    match strategy.apply(session, rule, budget) {
        Ok(count) => {
            debug!(
                target: ENGINE_TARGET,
                event = "strategy_finished",
                rule = %rule,
                strategy = %strategy,
                count,
                "strategy reported replacements"
            );
            count
        }
        Err(error) => {
            warn!(
                target: ENGINE_TARGET,
                event = "strategy_failed",
                rule = %rule,
                strategy = %strategy,
                error = %error,
                "strategy raised an error"
            );
            0
        }
    }
}

fn log_verdict(rule: &Rule, verdict: &Verdict) {
    match verdict {
        Verdict::SearchAbsent => debug!(
            target: ENGINE_TARGET,
            event = "verification_passed",
            rule = %rule,
            "search text no longer present"
        ),
        Verdict::SamplesReplaced { replaced, total } => debug!(
            target: ENGINE_TARGET,
            event = "verification_passed",
            rule = %rule,
            replaced,
            total,
            "sampled positions show the replacement"
        ),
        Verdict::SamplesUnchanged { replaced, total } => debug!(
            target: ENGINE_TARGET,
            event = "verification_failed",
            rule = %rule,
            replaced,
            total,
            "too few sampled positions changed"
        ),
        Verdict::Unavailable { message } => warn!(
            target: ENGINE_TARGET,
            event = "verification_unavailable",
            rule = %rule,
            error = %message,
            "cannot read document text for verification"
        ),
    }
}
