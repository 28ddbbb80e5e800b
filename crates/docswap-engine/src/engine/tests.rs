//! Unit tests for rule reconciliation.

use std::time::{Duration, Instant};

use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::session::{MockDocumentSession, SessionError};
use crate::test_doubles::{Fault, Primitive, ScriptedSession};

fn rule(search: &str, replace: &str) -> Rule {
    Rule::new(search, replace).expect("valid rule")
}

fn rules(pairs: &[(&str, &str)]) -> RuleSet {
    RuleSet::from_pairs(pairs.iter().copied()).expect("valid rules")
}

#[fixture]
fn year_rules() -> RuleSet {
    rules(&[("2019", "2023")])
}

#[test]
fn absent_rule_touches_nothing() {
    let mut session = MockDocumentSession::new();
    session
        .expect_text()
        .times(1)
        .returning(|| Ok("nothing to see".to_owned()));

    let outcome = apply_rule(&mut session, &rule("2019", "2023"));

    assert_eq!(outcome.count, 0);
    assert_eq!(outcome.strategy, None);
    assert!(!outcome.verified);
}

#[test]
fn unreadable_text_records_zero() {
    let mut session = MockDocumentSession::new();
    session
        .expect_text()
        .times(1)
        .returning(|| Err(SessionError::Closed));

    let outcome = apply_rule(&mut session, &rule("a", "b"));

    assert_eq!(outcome.count, 0);
    assert!(!outcome.verified);
}

#[rstest]
fn structured_find_is_credited_first(year_rules: RuleSet) {
    let mut session = ScriptedSession::from_text("Report 2019, budget 2019");

    let report = ReplacementEngine::new(&year_rules)
        .apply_rules(&mut session)
        .expect("no deadline");

    let outcome = &report.outcomes()[0];
    assert_eq!(outcome.strategy, Some(Strategy::StructuredFind));
    assert_eq!(outcome.count, 2);
    assert!(outcome.verified);
    assert_eq!(session.current_text(), "Report 2023, budget 2023");
    assert_eq!(session.calls(Primitive::SetText), 0);
}

#[rstest]
fn whole_text_covers_a_phantom_find(year_rules: RuleSet) {
    let mut session = ScriptedSession::from_text("Report 2019")
        .with_fault(Primitive::ReplaceNext, Fault::Phantom);

    let report = ReplacementEngine::new(&year_rules)
        .apply_rules(&mut session)
        .expect("no deadline");

    // The phantom find reports one match; whole-text finds the same one.
    let outcome = &report.outcomes()[0];
    assert_eq!(outcome.strategy, Some(Strategy::StructuredFind));
    assert_eq!(outcome.count, 1);
    assert!(outcome.verified);
    assert_eq!(session.current_text(), "Report 2023");
}

#[rstest]
fn per_block_runs_when_earlier_strategies_fail(year_rules: RuleSet) {
    let mut session = ScriptedSession::from_blocks(&["2019", "and 2019"])
        .with_fault(Primitive::ReplaceNext, Fault::Fails)
        .with_fault(Primitive::SetText, Fault::Fails);

    let report = ReplacementEngine::new(&year_rules)
        .apply_rules(&mut session)
        .expect("no deadline");

    let outcome = &report.outcomes()[0];
    assert_eq!(outcome.strategy, Some(Strategy::PerBlock));
    assert_eq!(outcome.count, 2);
    assert!(outcome.verified);
    assert_eq!(session.current_text(), "2023\rand 2023");
}

#[rstest]
fn forced_replace_all_rescues_unverified_edits(year_rules: RuleSet) {
    let mut session = ScriptedSession::from_text("2019 2019 2019")
        .with_fault(Primitive::ReplaceNext, Fault::Phantom)
        .with_fault(Primitive::SetText, Fault::Phantom)
        .with_fault(Primitive::SetBlockText, Fault::Phantom);

    let report = ReplacementEngine::new(&year_rules)
        .apply_rules(&mut session)
        .expect("no deadline");

    let outcome = &report.outcomes()[0];
    assert_eq!(outcome.strategy, Some(Strategy::ForcedReplaceAll));
    assert_eq!(outcome.count, 3);
    assert!(outcome.verified);
    assert_eq!(session.current_text(), "2023 2023 2023");
}

#[rstest]
fn unverifiable_edits_report_zero(year_rules: RuleSet) {
    let mut session = ScriptedSession::from_text("2019")
        .with_fault(Primitive::ReplaceNext, Fault::Phantom)
        .with_fault(Primitive::SetText, Fault::Phantom)
        .with_fault(Primitive::SetBlockText, Fault::Phantom)
        .with_fault(Primitive::ReplaceAll, Fault::Fails);

    let report = ReplacementEngine::new(&year_rules)
        .apply_rules(&mut session)
        .expect("no deadline");

    let outcome = &report.outcomes()[0];
    assert_eq!(outcome.count, 0);
    assert!(!outcome.verified);
    assert_eq!(report.total_replacements(), 0);
}

#[test]
fn verified_rule_never_reports_zero() {
    // Every strategy fails, yet the document ends up edited: the editor
    // applied the change while reporting an error.
    let mut session = MockDocumentSession::new();
    let mut reads = 0;
    session.expect_text().returning(move || {
        reads += 1;
        Ok(if reads == 1 { "a" } else { "b" }.to_owned())
    });
    session.expect_rewind().return_const(());
    session
        .expect_replace_next()
        .with(eq("a"), eq("b"))
        .returning(|_, _| {
            Err(SessionError::Rejected {
                operation: "replace_next",
                message: "busy".to_owned(),
            })
        });
    session.expect_block_count().return_const(0_usize);

    let outcome = apply_rule(&mut session, &rule("a", "b"));

    assert!(outcome.verified);
    assert_eq!(outcome.count, 1);
}

#[test]
fn second_run_is_idempotent() {
    let set = rules(&[("2019", "2023"), ("Acme", "Globex")]);
    let mut session = ScriptedSession::from_blocks(&["Acme 2019", "2019"]);
    let engine = ReplacementEngine::new(&set);

    let first = engine.apply_rules(&mut session).expect("no deadline");
    let second = engine.apply_rules(&mut session).expect("no deadline");

    assert_eq!(first.per_rule_counts(), vec![("2019", 2), ("Acme", 1)]);
    assert_eq!(second.per_rule_counts(), vec![("2019", 0), ("Acme", 0)]);
}

#[test]
fn rules_chain_in_order() {
    let set = rules(&[("A", "B"), ("B", "C")]);
    let mut session = ScriptedSession::from_text("A");

    let report = ReplacementEngine::new(&set)
        .apply_rules(&mut session)
        .expect("no deadline");

    assert_eq!(session.current_text(), "C");
    assert_eq!(report.per_rule_counts(), vec![("A", 1), ("B", 1)]);
    assert_eq!(report.total_replacements(), 2);
}

#[test]
fn self_containing_replacement_applies_once() {
    let set = rules(&[("Co", "Co. Ltd")]);
    let mut session = ScriptedSession::from_blocks(&["Acme Co", "Co"]);

    let report = ReplacementEngine::new(&set)
        .apply_rules(&mut session)
        .expect("no deadline");

    assert_eq!(session.current_text(), "Acme Co. Ltd\rCo. Ltd");
    assert_eq!(report.total_replacements(), 2);
    assert_eq!(session.calls(Primitive::SetText), 0);
}

#[test]
fn strategy_errors_do_not_abort_the_document() {
    let set = rules(&[("x", "y"), ("p", "q")]);
    let mut session = ScriptedSession::from_text("x p")
        .with_fault(Primitive::ReplaceNext, Fault::Fails)
        .with_fault(Primitive::SetText, Fault::FailsOnce);

    let report = ReplacementEngine::new(&set)
        .apply_rules(&mut session)
        .expect("no deadline");

    assert_eq!(report.per_rule_counts(), vec![("x", 1), ("p", 1)]);
    assert_eq!(session.current_text(), "y q");
}

#[test]
fn expired_deadline_stops_before_the_next_rule() {
    let set = rules(&[("a", "b")]);
    let mut session = ScriptedSession::from_text("a");

    let result = ReplacementEngine::new(&set)
        .with_deadline(Some(Instant::now()))
        .apply_rules(&mut session);

    assert_eq!(
        result,
        Err(EngineError::DeadlineExceeded {
            applied: 0,
            total: 1
        })
    );
    assert_eq!(session.current_text(), "a");
}

#[test]
fn distant_deadline_allows_every_rule() {
    let set = rules(&[("a", "b")]);
    let mut session = ScriptedSession::from_text("a");

    let report = ReplacementEngine::new(&set)
        .with_deadline(Instant::now().checked_add(Duration::from_secs(60)))
        .apply_rules(&mut session)
        .expect("deadline not reached");

    assert_eq!(report.total_replacements(), 1);
}
