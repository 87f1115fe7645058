//! Glue between the acceptor and the per-connection engine.

use std::fmt;
use std::net::TcpStream;
use std::sync::Arc;

use trellis_config::Config;

use crate::buffer_pool::ReadBufferPool;
use crate::handler::Handler;
use crate::health::HealthReporter;
use crate::session::{Session, SessionOptions, SessionReport};
use crate::transport::{ConnectionHandler, ListenerError, ListenerHandle, SocketListener};

/// Runs one [`Session`] per accepted switch connection, all sharing one
/// handler and one read buffer pool.
pub struct Controller {
    handler: Arc<dyn Handler>,
    options: SessionOptions,
    pool: ReadBufferPool,
    reporter: Arc<dyn HealthReporter>,
}

impl Controller {
    /// Builds a controller sized from `config`, drawing read buffers from the
    /// process-wide pool.
    #[must_use]
    pub fn new(
        handler: Arc<dyn Handler>,
        config: &Config,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self::with_parts(
            handler,
            SessionOptions::from(config),
            ReadBufferPool::shared_with(config.buffer_pool_capacity(), config.read_buffer_size()),
            reporter,
        )
    }

    /// Builds a controller from explicit parts.
    #[must_use]
    pub fn with_parts(
        handler: Arc<dyn Handler>,
        options: SessionOptions,
        pool: ReadBufferPool,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            handler,
            options,
            pool,
            reporter,
        }
    }

    /// Serves one connection to completion on the calling thread.
    pub fn serve(&self, stream: TcpStream) -> SessionReport {
        self.reporter.session_opened(stream.peer_addr().ok());
        let report = Session::new(stream, self.options, self.pool.clone()).serve(&self.handler);
        self.reporter.session_closed(&report);
        report
    }

    /// Starts accepting on `listener`, serving every connection.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the accept loop cannot start.
    pub fn listen(self, listener: SocketListener) -> Result<ListenerHandle, ListenerError> {
        listener.start(Arc::new(self))
    }
}

impl ConnectionHandler for Controller {
    fn handle(&self, stream: TcpStream) {
        self.serve(stream);
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Controller")
            .field("options", &self.options)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
