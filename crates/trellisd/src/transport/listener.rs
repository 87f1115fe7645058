//! Accept loop for switch connections.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use trellis_config::ListenEndpoint;

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const IDLE_POLL: Duration = Duration::from_millis(10);
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(5);

/// Bound listening socket, not yet accepting.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: ListenEndpoint,
    listener: TcpListener,
}

impl SocketListener {
    /// Resolves `endpoint` and binds the first address it yields.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when resolution or binding fails.
    pub fn bind(endpoint: &ListenEndpoint) -> Result<Self, ListenerError> {
        let addr = endpoint
            .socket_addrs()
            .map_err(|source| ListenerError::Resolve {
                host: endpoint.host().to_owned(),
                port: endpoint.port(),
                source,
            })?
            .into_iter()
            .next()
            .ok_or_else(|| ListenerError::ResolveEmpty {
                host: endpoint.host().to_owned(),
                port: endpoint.port(),
            })?;
        let listener =
            TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Address the socket is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Starts accepting on a background thread.
    ///
    /// Every accepted connection is passed to `handler` on its own thread.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the socket cannot be
    /// polled.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let local_addr = self.local_addr();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || run_accept_loop(self, &shutdown_flag, &handler));
        Ok(ListenerHandle {
            shutdown,
            local_addr,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept loop.
///
/// Dropping the handle asks the loop to stop without waiting for it.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
    handle: Option<thread::JoinHandle<Result<(), ListenerError>>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop. Running connections are unaffected.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Whether the accept loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .is_none_or(thread::JoinHandle::is_finished)
    }

    /// Waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Accept`] when the loop ended on a fatal
    /// accept error and [`ListenerError::ThreadPanic`] when it panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic)?,
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: SocketListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn ConnectionHandler>,
) -> Result<(), ListenerError> {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match listener.listener.accept() {
            Ok((stream, peer)) => {
                last_error = None;
                if let Err(error) = stream.set_nonblocking(false) {
                    warn!(
                        target: LISTENER_TARGET,
                        peer = %peer,
                        error = %error,
                        "dropping connection that cannot block"
                    );
                    continue;
                }
                debug!(target: LISTENER_TARGET, peer = %peer, "accepted connection");
                let handler = Arc::clone(handler);
                thread::spawn(move || handler.handle(stream));
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => thread::sleep(IDLE_POLL),
            Err(error) if is_transient(&error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "transient accept error; retrying"
                    );
                }
                last_error = Some(kind);
                thread::sleep(TRANSIENT_BACKOFF);
            }
            Err(source) => {
                error!(
                    target: LISTENER_TARGET,
                    endpoint = %listener.endpoint,
                    error = %source,
                    "accept failed; stopping listener"
                );
                return Err(ListenerError::Accept { source });
            }
        }
    }
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "listener stopped"
    );
    Ok(())
}

/// Accept errors worth retrying after a short pause.
pub(super) fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::TimedOut
    ) || descriptors_exhausted(error)
}

#[cfg(unix)]
fn descriptors_exhausted(error: &io::Error) -> bool {
    matches!(error.raw_os_error(), Some(libc::EMFILE | libc::ENFILE))
}

#[cfg(not(unix))]
const fn descriptors_exhausted(_error: &io::Error) -> bool {
    false
}
