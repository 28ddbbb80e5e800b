//! Moving finished documents into the output directory.
//!
//! A file only becomes visible at its output path once it is complete: it is
//! either renamed into place or copied into a staging file beside the target
//! and then persisted over it.

use std::fs::{self, File};
use std::io;
use std::thread;
use std::time::Duration;

use camino::Utf8Path;
use tempfile::{NamedTempFile, TempPath};
use tracing::warn;

/// How many times relocation is tried and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationPolicy {
    /// Attempts before giving up.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RelocationPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RelocationPolicy {
    /// Retries `operation` according to the policy and returns the last
    /// error when every attempt fails.
    pub(crate) fn retry<T>(
        &self,
        what: &str,
        mut operation: impl FnMut() -> io::Result<T>,
    ) -> io::Result<T> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) if attempt < attempts => {
                    warn!(
                        target: "docswap::orchestrator",
                        event = "placement_retry",
                        operation = what,
                        attempt,
                        error = %error,
                        "retrying file placement"
                    );
                    attempt += 1;
                    thread::sleep(self.delay);
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Moves the edited document at `temp` to `target`, replacing any file
/// already there. A rename is tried first; when it fails the bytes are
/// staged next to the target and persisted over it.
pub(crate) fn relocate(
    temp: TempPath,
    target: &Utf8Path,
    policy: &RelocationPolicy,
) -> io::Result<()> {
    let mut pending = Some(temp);
    policy.retry("relocate", || {
        let Some(temp) = pending.take() else {
            return Err(io::Error::other("temporary file already consumed"));
        };
        match temp.persist(target) {
            Ok(()) => Ok(()),
            Err(error) => {
                let temp = error.path;
                let copied = stage_copy(&temp, target);
                if copied.is_err() {
                    pending = Some(temp);
                }
                copied
            }
        }
    })
}

/// Copies `source` to `target` through a staging file in the target's
/// directory, replacing any file already there.
pub(crate) fn stage_copy(source: &std::path::Path, target: &Utf8Path) -> io::Result<()> {
    let directory = target
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let mut input = File::open(source)?;
    let mut staged = NamedTempFile::new_in(directory)?;
    io::copy(&mut input, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(target).map_err(|error| error.error)?;
    Ok(())
}

/// Delivers an unedited copy of `input` at `target`.
pub(crate) fn copy_original(
    input: &Utf8Path,
    target: &Utf8Path,
    policy: &RelocationPolicy,
) -> io::Result<()> {
    policy.retry("copy_original", || stage_copy(input.as_std_path(), target))
}

/// Returns true when `path` exists and is a regular file.
pub(crate) fn is_regular_file(path: &Utf8Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.is_file())
}
