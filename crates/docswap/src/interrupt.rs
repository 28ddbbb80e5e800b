//! Batch-level cancellation on SIGINT and SIGTERM.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;
use thiserror::Error;

/// Exit status used when a second SIGINT arrives while a file is in flight.
pub const FORCED_EXIT_STATUS: i32 = 130;

/// Errors reported while installing the signal handlers.
#[derive(Debug, Error)]
pub enum InterruptError {
    /// Registering a handler failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Flag raised when the operator asks the batch to stop.
///
/// The orchestrator only looks at the flag between files, so a document
/// being edited always runs to its terminal result first.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    /// Creates a flag that no signal will raise.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Creates a flag raised by SIGINT or SIGTERM. A SIGINT received while
    /// the flag is already raised terminates the process with
    /// [`FORCED_EXIT_STATUS`].
    ///
    /// # Errors
    ///
    /// Returns [`InterruptError::Install`] when a handler cannot be
    /// registered.
    pub fn install() -> Result<Self, InterruptError> {
        let interrupt = Self::detached();
        // The conditional shutdown must be registered before the flag setter
        // so the first SIGINT only raises the flag.
        flag::register_conditional_shutdown(
            SIGINT,
            FORCED_EXIT_STATUS,
            Arc::clone(&interrupt.raised),
        )
        .map_err(|source| InterruptError::Install { source })?;
        for signal in [SIGINT, SIGTERM] {
            flag::register(signal, Arc::clone(&interrupt.raised))
                .map_err(|source| InterruptError::Install { source })?;
        }
        Ok(interrupt)
    }

    /// Raises the flag.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Returns true once the flag has been raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
