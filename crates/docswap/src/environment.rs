//! Private scratch space for one batch run.
//!
//! Every edited document is saved into a run-private temporary directory
//! before it is relocated to the output directory. The directory and anything
//! left in it are removed when the [`Environment`] is dropped.

use std::io;
use std::path::Path;

use camino::Utf8Path;
use tempfile::{Builder, TempDir, TempPath};
use thiserror::Error;

/// Errors raised while preparing the run environment.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The private temporary directory could not be created.
    #[error("cannot create a private working directory{}: {source}", describe(.root.as_deref()))]
    Unavailable {
        /// Requested parent directory, if any.
        root: Option<String>,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

fn describe(root: Option<&str>) -> String {
    root.map(|root| format!(" under {root}")).unwrap_or_default()
}

/// The run-private temporary directory.
#[derive(Debug)]
pub struct Environment {
    scratch: TempDir,
}

impl Environment {
    /// Creates the private directory under `root`, or under the system
    /// temporary directory when `root` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::Unavailable`] when the directory cannot be
    /// created.
    pub fn start(root: Option<&Utf8Path>) -> Result<Self, EnvironmentError> {
        let mut builder = Builder::new();
        builder.prefix("docswap-");
        let scratch = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| EnvironmentError::Unavailable {
            root: root.map(ToString::to_string),
            source,
        })?;

        tracing::debug!(
            target: "docswap::environment",
            event = "environment_started",
            scratch = %scratch.path().display(),
            "created private working directory"
        );
        Ok(Self { scratch })
    }

    /// Path of the private directory.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Reserves a unique path for an edited copy of `file_name`. The file is
    /// deleted when the returned handle drops unless it is persisted first.
    ///
    /// # Errors
    ///
    /// Returns an error when the placeholder file cannot be created.
    pub fn temp_path(&self, file_name: &str) -> io::Result<TempPath> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| format!(".{extension}"))
            .unwrap_or_default();
        Builder::new()
            .prefix("edit-")
            .suffix(&extension)
            .tempfile_in(self.scratch.path())
            .map(tempfile::NamedTempFile::into_temp_path)
    }
}
