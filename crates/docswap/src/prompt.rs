//! Confirmation before an existing output file is replaced.

use std::io::{self, BufRead, IsTerminal, Write};

use camino::Utf8Path;

/// Asks whether an existing output file may be overwritten.
#[cfg_attr(test, mockall::automock)]
pub trait OverwritePrompt {
    /// Returns true when `target` may be replaced.
    fn confirm_overwrite(&self, target: &Utf8Path) -> bool;
}

/// Approves every overwrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOverwrite;

impl OverwritePrompt for AlwaysOverwrite {
    fn confirm_overwrite(&self, _target: &Utf8Path) -> bool {
        true
    }
}

/// Asks on stderr and reads the answer from stdin.
///
/// Without an interactive stdin nobody can answer, so the overwrite is
/// declined.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl OverwritePrompt for TerminalPrompt {
    fn confirm_overwrite(&self, target: &Utf8Path) -> bool {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return false;
        }
        let mut stderr = io::stderr().lock();
        if write!(stderr, "{target} exists. Overwrite? [y/N] ").is_err() || stderr.flush().is_err()
        {
            return false;
        }
        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer).is_err() {
            return false;
        }
        is_affirmative(&answer)
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("y\n", true)]
    #[case(" YES ", true)]
    #[case("n\n", false)]
    #[case("\n", false)]
    #[case("yep", false)]
    fn parses_answers(#[case] answer: &str, #[case] expected: bool) {
        assert_eq!(is_affirmative(answer), expected);
    }
}
