//! Batch find/replace for office documents.
//!
//! [`run`] loads configuration, installs telemetry and signal handling,
//! creates the run's private scratch directory, and hands every file in the
//! source directory to the [`orchestrator`]. The console report is written
//! to the supplied stdout; fatal errors go to the supplied stderr.

use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use docswap_engine::{OoxmlEditor, RuleSetError};

mod backup;
mod config;
pub mod environment;
pub mod interrupt;
pub mod orchestrator;
pub mod prompt;
pub mod report;
pub mod telemetry;

pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
use environment::{Environment, EnvironmentError};
use interrupt::{FORCED_EXIT_STATUS, Interrupt, InterruptError};
use orchestrator::{BatchError, Orchestrator};
use prompt::TerminalPrompt;
use report::ConsoleReport;
use telemetry::TelemetryError;

#[cfg(test)]
mod tests;

/// Errors that end a run with a failing exit status.
#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("invalid replacement rules: {0}")]
    Rules(#[from] RuleSetError),
    #[error("no replacement rules configured; pass --rules search=replace")]
    NoRules,
    #[error("{0}")]
    Environment(#[from] EnvironmentError),
    #[error("{0}")]
    Interrupt(#[from] InterruptError),
    #[error("{0}")]
    Batch(#[from] BatchError),
    #[error("interrupted; remaining files were not processed")]
    Interrupted,
}

impl AppError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Interrupted => u8::try_from(FORCED_EXIT_STATUS)
                .map_or(ExitCode::FAILURE, ExitCode::from),
            _ => ExitCode::FAILURE,
        }
    }
}

/// Runs a batch using the provided arguments and output streams.
///
/// Returns success once the summary is printed, even when individual files
/// failed. Configuration, rule, scratch-directory and signal-handler
/// failures, and interruption, return a failing status.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let interrupt = match Interrupt::install() {
        Ok(interrupt) => interrupt,
        Err(error) => return fail(stderr, &AppError::from(error)),
    };
    let progress = io::stdout().is_terminal();
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader, &interrupt, progress)
}

/// Runs a batch with a custom configuration loader and interrupt flag.
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
    interrupt: &Interrupt,
    progress: bool,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    match execute(&args, stdout, loader, interrupt, progress) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => fail(stderr, &error),
    }
}

fn fail<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    // A broken stderr leaves nowhere else to report to.
    writeln!(stderr, "{error}").ok();
    error.exit_code()
}

fn execute<W, L>(
    args: &[OsString],
    stdout: &mut W,
    loader: &L,
    interrupt: &Interrupt,
    progress: bool,
) -> Result<(), AppError>
where
    W: Write,
    L: ConfigLoader,
{
    let config = loader.load(args)?;
    telemetry::initialise(&config)?;
    let rules = config::rule_set(&config)?;
    let environment = Environment::start(config.temp_root.as_deref())?;
    let editor = OoxmlEditor::new(config::ooxml_options(&config));
    let prompt = TerminalPrompt;

    info!(
        target: "docswap::cli",
        event = "run_started",
        source = %config.source_dir(),
        output = %config.output_dir(),
        rules = rules.len(),
        "configuration loaded"
    );

    let mut report =
        ConsoleReport::new(&mut *stdout).with_progress(!config.hide_progress && progress);
    report.banner(&config, &rules);
    let summary = Orchestrator::new(&config, &rules, &editor, &environment)
        .with_prompt(&prompt)
        .with_interrupt(interrupt.clone())
        .run(&mut report)?;

    if summary.interrupted {
        return Err(AppError::Interrupted);
    }
    Ok(())
}
