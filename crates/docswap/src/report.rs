//! Console output for batch runs.
//!
//! The report owns stdout: a banner describing the run, one row per file,
//! and a closing summary. Logs go to stderr or the log file so the table
//! stays readable.

use std::fmt;
use std::io::Write;

use tracing::debug;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use docswap_config::Config;
use docswap_engine::RuleSet;

use crate::orchestrator::{BatchObserver, BatchSummary, FileResult};

const REPORT_TARGET: &str = "docswap::report";

/// Display columns reserved for file names.
const NAME_COLUMN: usize = 40;
const COUNT_COLUMN: usize = 7;
const ELLIPSIS: char = '…';

/// Writes the banner, per-file rows, and summary of a batch.
pub struct ConsoleReport<W: Write> {
    out: W,
    progress: bool,
    progress_width: usize,
}

impl<W: Write> ConsoleReport<W> {
    /// Creates a report without the transient progress line.
    pub fn new(out: W) -> Self {
        Self {
            out,
            progress: false,
            progress_width: 0,
        }
    }

    /// Shows a `[n/total] name` line while each file is processed.
    #[must_use]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Writes the welcome banner: directories and rules.
    pub fn banner(&mut self, config: &Config, rules: &RuleSet) {
        self.emit(format_args!("docswap batch find/replace\n"));
        self.emit(format_args!("  source: {}\n", config.source_dir()));
        self.emit(format_args!("  output: {}\n", config.output_dir()));
        self.emit(format_args!("  rules:\n"));
        for rule in rules {
            self.emit(format_args!("    {rule}\n"));
        }
        self.emit(format_args!("\n"));
    }

    fn clear_progress(&mut self) {
        if self.progress_width > 0 {
            let width = self.progress_width;
            self.emit(format_args!("\r{:width$}\r", ""));
            self.progress_width = 0;
        }
    }

    // A closed or full stdout must not abort the batch.
    fn emit(&mut self, text: fmt::Arguments<'_>) {
        if let Err(error) = self.out.write_fmt(text) {
            debug!(
                target: REPORT_TARGET,
                event = "report_write_failed",
                error = %error,
                "console report write failed"
            );
        }
    }

    fn flush(&mut self) {
        if let Err(error) = self.out.flush() {
            debug!(
                target: REPORT_TARGET,
                event = "report_flush_failed",
                error = %error,
                "console report flush failed"
            );
        }
    }

    /// Consumes the report and returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> BatchObserver for ConsoleReport<W> {
    fn batch_started(&mut self, _files: usize) {
        self.emit(format_args!(
            "{} {:>COUNT_COLUMN$}  {}  {:>8}\n",
            pad_to_width("File", NAME_COLUMN),
            "Count",
            "St",
            "Time"
        ));
        self.emit(format_args!("{}\n", "-".repeat(NAME_COLUMN + COUNT_COLUMN + 14)));
    }

    fn file_started(&mut self, position: usize, total: usize, name: &str) {
        if !self.progress {
            return;
        }
        self.clear_progress();
        let line = format!("[{position}/{total}] {name}");
        self.progress_width = line.width();
        self.emit(format_args!("{line}"));
        self.flush();
    }

    fn file_finished(&mut self, result: &FileResult) {
        self.clear_progress();
        self.emit(format_args!("{}\n", format_row(result)));
    }

    fn batch_finished(&mut self, summary: &BatchSummary) {
        self.clear_progress();
        for line in format_summary(summary) {
            self.emit(format_args!("{line}\n"));
        }
        self.flush();
    }
}

/// One table row: name, count or `--`, status symbol, seconds.
fn format_row(result: &FileResult) -> String {
    let count = result
        .replacements
        .map_or_else(|| "--".to_owned(), |count| count.to_string());
    format!(
        "{} {count:>COUNT_COLUMN$}  {}  {:>7.2}s",
        pad_to_width(&result.name, NAME_COLUMN),
        result.status.symbol(),
        result.elapsed.as_secs_f64()
    )
}

fn format_summary(summary: &BatchSummary) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        format!(
            "Processed {} files in {:.2}s",
            summary.total,
            summary.elapsed.as_secs_f64()
        ),
        format!(
            "  success: {} (partial: {})",
            summary.succeeded, summary.partial
        ),
        format!("  failed: {}", summary.failed),
        format!("  skipped: {}", summary.skipped),
        format!("  replacements: {}", summary.total_replacements),
    ];
    if summary.interrupted {
        lines.push("Interrupted: remaining files were not processed".to_owned());
    }
    lines
}

/// Pads or truncates `text` to exactly `width` terminal columns.
fn pad_to_width(text: &str, width: usize) -> String {
    let mut used = text.width();
    let mut fitted = if used <= width {
        text.to_owned()
    } else {
        let mut truncated = String::new();
        used = 0;
        for ch in text.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if used + ch_width + 1 > width {
                break;
            }
            truncated.push(ch);
            used += ch_width;
        }
        truncated.push(ELLIPSIS);
        used += 1;
        truncated
    };
    fitted.extend(std::iter::repeat_n(' ', width.saturating_sub(used)));
    fitted
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::orchestrator::FileStatus;

    fn result(name: &str, status: FileStatus, replacements: Option<usize>) -> FileResult {
        FileResult {
            name: name.to_owned(),
            status,
            replacements,
            error: None,
            elapsed: Duration::from_millis(1250),
        }
    }

    #[rstest]
    #[case("report.docx")]
    #[case("年次報告.docx")]
    #[case("a-very-long-file-name-that-overflows-the-name-column.xlsx")]
    fn names_fill_the_same_columns(#[case] name: &str) {
        assert_eq!(pad_to_width(name, NAME_COLUMN).width(), NAME_COLUMN);
    }

    #[test]
    fn long_names_are_truncated_with_an_ellipsis() {
        let padded = pad_to_width("abcdefgh", 5);
        assert_eq!(padded, "abcd…");
    }

    #[test]
    fn rows_show_count_symbol_and_seconds() {
        let row = format_row(&result("report.docx", FileStatus::Success, Some(12)));
        assert!(row.starts_with("report.docx "));
        assert!(row.ends_with("     12  ✓     1.25s"));
    }

    #[test]
    fn rows_without_a_count_show_dashes() {
        let row = format_row(&result("scan.pdf", FileStatus::Skipped, None));
        assert!(row.contains("     --  -"));
    }

    #[test]
    fn summary_reports_partial_and_interruption() {
        let summary = BatchSummary {
            total: 4,
            succeeded: 2,
            partial: 1,
            failed: 0,
            skipped: 1,
            total_replacements: 7,
            elapsed: Duration::from_secs(2),
            interrupted: true,
        };
        let lines = format_summary(&summary);
        assert!(lines.contains(&"Processed 4 files in 2.00s".to_owned()));
        assert!(lines.contains(&"  success: 2 (partial: 1)".to_owned()));
        assert!(lines.contains(&"  replacements: 7".to_owned()));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Interrupted: remaining files were not processed")
        );
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn closed_output_does_not_interrupt_reporting() {
        let mut report = ConsoleReport::new(ClosedPipe).with_progress(true);
        report.batch_started(1);
        report.file_started(1, 1, "a.docx");
        report.file_finished(&result("a.docx", FileStatus::Success, Some(1)));
        report.batch_finished(&BatchSummary {
            total: 1,
            succeeded: 1,
            partial: 0,
            failed: 0,
            skipped: 0,
            total_replacements: 1,
            elapsed: Duration::from_secs(1),
            interrupted: false,
        });
    }

    #[test]
    fn progress_line_is_cleared_before_the_row() {
        let mut report = ConsoleReport::new(Vec::new()).with_progress(true);
        report.file_started(1, 2, "a.docx");
        report.file_finished(&result("a.docx", FileStatus::Success, Some(1)));
        let output = String::from_utf8(report.into_inner()).expect("utf-8 output");

        assert!(output.starts_with("[1/2] a.docx\r"));
        assert!(output.ends_with("1.25s\n"));
    }
}
