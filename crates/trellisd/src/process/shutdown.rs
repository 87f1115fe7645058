use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Blocks until the process should stop accepting switches.
pub trait ShutdownSignal: Send + Sync + 'static {
    /// Returns once shutdown has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the notification source cannot be set
    /// up.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Failure to observe a stop request.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The signal iterator could not be registered.
    #[error("cannot watch termination signals: {source}")]
    Install {
        /// Registration error.
        #[source]
        source: io::Error,
    },
}

/// Waits for SIGTERM, SIGINT, SIGQUIT or SIGHUP.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(target: PROCESS_TARGET, signal, "shutdown signal received");
        }
        Ok(())
    }
}
