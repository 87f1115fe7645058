//! Lifecycle events surfaced to operators.

use std::net::SocketAddr;
use std::sync::Arc;

use trellis_config::{Config, ListenEndpoint};

use crate::bootstrap::BootstrapError;
use crate::session::SessionReport;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer for controller lifecycle events.
pub trait HealthReporter: Send + Sync {
    /// Configuration loading is about to start.
    fn bootstrap_starting(&self);

    /// Configuration and telemetry are ready.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Bootstrap failed.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// The listener is accepting switch connections.
    fn listener_started(&self, endpoint: &ListenEndpoint, local_addr: Option<SocketAddr>);

    /// A switch connected.
    fn session_opened(&self, peer: Option<SocketAddr>);

    /// A switch session finished.
    fn session_closed(&self, report: &SessionReport);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_started(&self, endpoint: &ListenEndpoint, local_addr: Option<SocketAddr>) {
        (**self).listener_started(endpoint, local_addr);
    }

    fn session_opened(&self, peer: Option<SocketAddr>) {
        (**self).session_opened(peer);
    }

    fn session_closed(&self, report: &SessionReport) {
        (**self).session_closed(report);
    }
}

/// Default reporter that records lifecycle events with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting controller bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen = %config.listen(),
            concurrency = config.concurrency(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "controller bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "controller bootstrap failed"
        );
    }

    fn listener_started(&self, endpoint: &ListenEndpoint, local_addr: Option<SocketAddr>) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_started",
            endpoint = %endpoint,
            local_addr = ?local_addr,
            "accepting switch connections"
        );
    }

    fn session_opened(&self, peer: Option<SocketAddr>) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "session_opened",
            peer = ?peer,
            "switch connected"
        );
    }

    fn session_closed(&self, report: &SessionReport) {
        match &report.error {
            None => tracing::info!(
                target: HEALTH_TARGET,
                event = "session_closed",
                peer = ?report.peer,
                datapath_id = ?report.datapath_id,
                frames_read = report.frames_read,
                frames_written = report.frames_written,
                "switch disconnected"
            ),
            Some(error) => tracing::warn!(
                target: HEALTH_TARGET,
                event = "session_failed",
                peer = ?report.peer,
                datapath_id = ?report.datapath_id,
                frames_read = report.frames_read,
                frames_written = report.frames_written,
                error = %error,
                "switch session failed"
            ),
        }
    }
}
