//! Process orchestration for the `trellisd` binary.

mod shutdown;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{RecvTimeoutError, bounded};
use thiserror::Error;
use tracing::{debug, info};

pub use self::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::controller::Controller;
use crate::handler::Handler;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{ListenerError, SocketListener};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
const LISTENER_POLL: Duration = Duration::from_millis(100);

/// Errors that stop the controller process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration or telemetry could not be set up.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The listener failed to bind, or stopped on a fatal accept error.
    #[error("listener failed: {0}")]
    Listener(#[from] ListenerError),
    /// Shutdown signals could not be observed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Runs the controller with `handler` until a termination signal arrives or
/// the listener fails.
///
/// # Errors
///
/// Returns [`LaunchError`] when start-up fails or the accept loop ends on a
/// fatal error.
pub fn run_controller(handler: impl Handler) -> Result<(), LaunchError> {
    run_controller_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        SystemShutdownSignal,
        Arc::new(handler),
    )
}

/// Runs the controller with injected collaborators.
///
/// Sessions still running when this returns are left to finish on their
/// own.
///
/// # Errors
///
/// See [`run_controller`].
pub fn run_controller_with<S>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: S,
    handler: Arc<dyn Handler>,
) -> Result<(), LaunchError>
where
    S: ShutdownSignal,
{
    let runtime = bootstrap_with(loader, reporter)?;
    let config = runtime.config();
    let listener = SocketListener::bind(config.listen())?;
    let reporter = runtime.reporter();
    reporter.listener_started(config.listen(), listener.local_addr());

    let handle = Controller::new(handler, config, reporter).listen(listener)?;

    let (signalled_tx, signalled_rx) = bounded(1);
    thread::spawn(move || {
        if signalled_tx.send(shutdown.wait()).is_err() {
            debug!(target: PROCESS_TARGET, "controller exited before shutdown signal");
        }
    });

    while !handle.is_finished() {
        match signalled_rx.recv_timeout(LISTENER_POLL) {
            Ok(outcome) => {
                outcome?;
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    handle.shutdown();
    handle.join()?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
