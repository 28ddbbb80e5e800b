//! Walks the source directory and drives each document through the
//! replacement engine.
//!
//! Every input yields exactly one [`FileResult`]. A file is opened, edited
//! and saved into the run's private scratch directory, retried from open on
//! failure, and only then relocated to the output directory. When placement
//! fails the unedited original is delivered instead.

mod placement;
mod result;

use std::fs::{self, File};
use std::io;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tracing::{debug, info, warn};

use docswap_config::Config;
use docswap_engine::{
    DocumentFormat, DocumentSession, Editor, EngineReport, ReplacementEngine, RuleSet,
};

use crate::backup;
use crate::environment::Environment;
use crate::interrupt::Interrupt;
use crate::prompt::{AlwaysOverwrite, OverwritePrompt};

pub use placement::RelocationPolicy;
pub use result::{BatchSummary, EditFailure, FileError, FileResult, FileStatus};

const ORCHESTRATOR_TARGET: &str = "docswap::orchestrator";

static ALWAYS_OVERWRITE: AlwaysOverwrite = AlwaysOverwrite;

/// Receives progress notifications while a batch runs.
pub trait BatchObserver {
    /// Called once the inputs have been listed.
    fn batch_started(&mut self, _files: usize) {}

    /// Called before a file is processed. `position` starts at one.
    fn file_started(&mut self, _position: usize, _total: usize, _name: &str) {}

    /// Called with the terminal result of each file.
    fn file_finished(&mut self, _result: &FileResult) {}

    /// Called once with the batch totals.
    fn batch_finished(&mut self, _summary: &BatchSummary) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl BatchObserver for SilentObserver {}

/// Failures that stop a batch before any file is processed.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The source directory could not be listed.
    #[error("cannot list source directory {path}: {source}")]
    Source {
        /// Source directory.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    Output {
        /// Output directory.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Closes the session when dropped.
struct SessionGuard(Box<dyn DocumentSession>);

impl SessionGuard {
    fn session(&mut self) -> &mut dyn DocumentSession {
        self.0.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// An edited document waiting in the scratch directory.
struct EditedDocument {
    temp: TempPath,
    report: EngineReport,
}

/// Processes the files of one batch.
pub struct Orchestrator<'a> {
    config: &'a Config,
    rules: &'a RuleSet,
    editor: &'a dyn Editor,
    environment: &'a Environment,
    prompt: &'a dyn OverwritePrompt,
    interrupt: Interrupt,
    relocation: RelocationPolicy,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator that overwrites without asking and ignores
    /// signals.
    #[must_use]
    pub fn new(
        config: &'a Config,
        rules: &'a RuleSet,
        editor: &'a dyn Editor,
        environment: &'a Environment,
    ) -> Self {
        Self {
            config,
            rules,
            editor,
            environment,
            prompt: &ALWAYS_OVERWRITE,
            interrupt: Interrupt::detached(),
            relocation: RelocationPolicy::default(),
        }
    }

    /// Asks `prompt` before replacing existing output, unless prompts are
    /// disabled in the configuration.
    #[must_use]
    pub fn with_prompt(mut self, prompt: &'a dyn OverwritePrompt) -> Self {
        self.prompt = prompt;
        self
    }

    /// Stops between files once `interrupt` is raised.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Overrides how placement is retried.
    #[must_use]
    pub fn with_relocation(mut self, relocation: RelocationPolicy) -> Self {
        self.relocation = relocation;
        self
    }

    /// Processes every regular file directly inside the source directory,
    /// in name order.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] when the source directory cannot be listed or
    /// the output directory cannot be created. Per-file failures never end
    /// the batch.
    pub fn run(&self, observer: &mut dyn BatchObserver) -> Result<BatchSummary, BatchError> {
        let started = Instant::now();
        let inputs = list_inputs(self.config.source_dir()).map_err(|source| BatchError::Source {
            path: self.config.source_dir().to_owned(),
            source,
        })?;
        fs::create_dir_all(self.config.output_dir()).map_err(|source| BatchError::Output {
            path: self.config.output_dir().to_owned(),
            source,
        })?;

        info!(
            target: ORCHESTRATOR_TARGET,
            event = "batch_started",
            files = inputs.len(),
            rules = self.rules.len(),
            source = %self.config.source_dir(),
            output = %self.config.output_dir(),
            "starting batch"
        );
        observer.batch_started(inputs.len());

        let mut summary = BatchSummary::default();
        for (index, input) in inputs.iter().enumerate() {
            if self.interrupt.is_raised() {
                warn!(
                    target: ORCHESTRATOR_TARGET,
                    event = "batch_interrupted",
                    processed = index,
                    remaining = inputs.len() - index,
                    "stopping before the next file"
                );
                summary.interrupted = true;
                break;
            }
            observer.file_started(index + 1, inputs.len(), display_name(input));
            let result = self.process(input);
            summary.record(&result);
            observer.file_finished(&result);
        }
        summary.elapsed = started.elapsed();

        info!(
            target: ORCHESTRATOR_TARGET,
            event = "batch_finished",
            total = summary.total,
            succeeded = summary.succeeded,
            partial = summary.partial,
            failed = summary.failed,
            skipped = summary.skipped,
            replacements = summary.total_replacements,
            interrupted = summary.interrupted,
            elapsed_ms = summary.elapsed.as_millis(),
            "batch finished"
        );
        observer.batch_finished(&summary);
        Ok(summary)
    }

    /// Processes one input path to its terminal result.
    #[must_use]
    pub fn process(&self, input: &Utf8Path) -> FileResult {
        let started = Instant::now();
        let name = display_name(input);
        debug!(
            target: ORCHESTRATOR_TARGET,
            event = "file_started",
            file = %input,
            "processing file"
        );

        let result = match self.admit(input, name) {
            Ok(format) => {
                if self.config.backup {
                    self.back_up(input);
                }
                self.edit_and_place(input, name, format, started)
            }
            Err(error) => {
                info!(
                    target: ORCHESTRATOR_TARGET,
                    event = "file_skipped",
                    file = %input,
                    reason = %error,
                    "skipping file"
                );
                FileResult::skipped(name, &error, started.elapsed())
            }
        };

        info!(
            target: ORCHESTRATOR_TARGET,
            event = "file_finished",
            file = %input,
            status = %result.status,
            replacements = result.replacements,
            elapsed_ms = result.elapsed.as_millis(),
            "file finished"
        );
        result
    }

    /// Decides whether `input` is processed at all.
    fn admit(&self, input: &Utf8Path, name: &str) -> Result<DocumentFormat, FileError> {
        let unreadable = |reason: String| FileError::Unreadable { reason };
        let metadata = fs::metadata(input).map_err(|error| unreadable(error.to_string()))?;
        if !metadata.is_file() {
            return Err(unreadable("not a regular file".to_owned()));
        }
        if metadata.len() == 0 {
            return Err(unreadable("empty file".to_owned()));
        }
        File::open(input).map_err(|error| unreadable(error.to_string()))?;

        let format = self
            .editor
            .classify(input.as_std_path())
            .ok_or(FileError::UnsupportedFormat)?;

        let target = self.target_for(name);
        if self.config.confirm_overwrite
            && placement::is_regular_file(&target)
            && !self.prompt.confirm_overwrite(&target)
        {
            return Err(FileError::OverwriteDeclined);
        }
        Ok(format)
    }

    fn back_up(&self, input: &Utf8Path) {
        match backup::back_up(self.config.source_dir(), input) {
            Ok(copy) => debug!(
                target: ORCHESTRATOR_TARGET,
                event = "backup_written",
                file = %input,
                backup = %copy,
                "original backed up"
            ),
            Err(error) => warn!(
                target: ORCHESTRATOR_TARGET,
                event = "backup_failed",
                file = %input,
                error = %error,
                "continuing without a backup"
            ),
        }
    }

    fn edit_and_place(
        &self,
        input: &Utf8Path,
        name: &str,
        format: DocumentFormat,
        started: Instant,
    ) -> FileResult {
        let edited = match self.edit(input, name, format) {
            Ok(edited) => edited,
            Err(error) => return FileResult::failed(name, &error, started.elapsed()),
        };
        let replacements = edited.report.total_replacements();
        let target = self.target_for(name);

        let Err(source) = placement::relocate(edited.temp, &target, &self.relocation) else {
            return FileResult {
                name: name.to_owned(),
                status: FileStatus::Success,
                replacements: Some(replacements),
                error: None,
                elapsed: started.elapsed(),
            };
        };

        let error = FileError::Relocate {
            path: target.clone(),
            source,
        };
        warn!(
            target: ORCHESTRATOR_TARGET,
            event = "relocation_failed",
            file = %input,
            error = %error,
            "delivering the unedited original"
        );
        match placement::copy_original(input, &target, &self.relocation) {
            Ok(()) => FileResult {
                name: name.to_owned(),
                status: FileStatus::PartialSuccess,
                replacements: None,
                error: Some(error.to_string()),
                elapsed: started.elapsed(),
            },
            Err(copy_error) => {
                let error = FileError::Relocate {
                    path: target,
                    source: copy_error,
                };
                FileResult::failed(name, &error, started.elapsed())
            }
        }
    }

    /// Runs the bounded attempt loop.
    fn edit(
        &self,
        input: &Utf8Path,
        name: &str,
        format: DocumentFormat,
    ) -> Result<EditedDocument, FileError> {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.attempt(input, name, format) {
                Ok(edited) => {
                    for outcome in edited.report.outcomes() {
                        debug!(
                            target: ORCHESTRATOR_TARGET,
                            event = "rule_applied",
                            file = %input,
                            rule = %outcome.rule,
                            strategy = outcome.strategy.map(|strategy| strategy.as_str()),
                            count = outcome.count,
                            verified = outcome.verified,
                            "rule applied"
                        );
                    }
                    return Ok(edited);
                }
                Err(failure) if attempt < attempts => {
                    warn!(
                        target: ORCHESTRATOR_TARGET,
                        event = "attempt_failed",
                        file = %input,
                        attempt,
                        attempts,
                        error = %failure,
                        "retrying from open"
                    );
                    attempt += 1;
                }
                Err(failure) => {
                    warn!(
                        target: ORCHESTRATOR_TARGET,
                        event = "attempts_exhausted",
                        file = %input,
                        attempts,
                        error = %failure,
                        "giving up on file"
                    );
                    return Err(FileError::Edit(failure));
                }
            }
        }
    }

    /// One open, edit and save cycle. The session is closed and the
    /// temporary file removed on every error path.
    fn attempt(
        &self,
        input: &Utf8Path,
        name: &str,
        format: DocumentFormat,
    ) -> Result<EditedDocument, EditFailure> {
        let temp = self
            .environment
            .temp_path(name)
            .map_err(EditFailure::TempFile)?;
        // Only the path is reserved; the editor creates the file on save.
        remove_placeholder(&temp).map_err(EditFailure::TempFile)?;

        let mut guard = SessionGuard(self.editor.open(format, input.as_std_path())?);
        let deadline = self
            .config
            .file_timeout()
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let report = ReplacementEngine::new(self.rules)
            .with_deadline(deadline)
            .apply_rules(guard.session())?;
        guard.session().save_as(&temp)?;
        Ok(EditedDocument { temp, report })
    }

    fn target_for(&self, name: &str) -> Utf8PathBuf {
        self.config.output_dir().join(name)
    }
}

fn remove_placeholder(temp: &TempPath) -> io::Result<()> {
    match fs::remove_file(temp) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

fn display_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

/// Regular files directly inside `directory`, sorted by name. Entries whose
/// names are not UTF-8 are logged and left out.
fn list_inputs(directory: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let mut inputs = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) if placement::is_regular_file(&path) => inputs.push(path),
            Ok(_) => {}
            Err(path) => warn!(
                target: ORCHESTRATOR_TARGET,
                event = "input_ignored",
                path = %path.display(),
                "ignoring file with a non-UTF-8 name"
            ),
        }
    }
    inputs.sort();
    Ok(inputs)
}
