//! Per-connection engine.
//!
//! A session runs three kinds of thread against one socket. The thread
//! calling [`Session::serve`] reads and demultiplexes frames; a pool of
//! dispatch workers hands inbound messages to the [`Handler`]; a single
//! writer drains the outbound queue, stamps transaction ids and owns the
//! write half. The threads share nothing but the two bounded queues and a
//! latch holding the first terminal error.
//!
//! Teardown is driven from inside. Once reading stops the pooled buffer goes
//! back, the inbound queue closes, the workers drain it and exit, a close
//! marker is queued behind their last frame, and the writer flushes what
//! remains before shutting the socket down.

mod outbound;
mod reader;
mod workers;

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, bounded};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::{debug, warn};

use trellis_config::{Config, DEFAULT_INBOUND_CAPACITY, DEFAULT_OUTBOUND_CAPACITY};
use trellis_wire::{DatapathId, ProtocolError, VERSION, WireError, features_request, hello};

use self::outbound::{FrameDeadline, write_loop};
use self::reader::{FrameReader, read_loop};
use self::workers::WorkerPool;
use crate::buffer_pool::ReadBufferPool;
use crate::handler::Handler;
use crate::writer::{Outbound, Writer};

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Sizing and timing for each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Dispatch workers per session. Zero is treated as one.
    pub concurrency: usize,
    /// Inbound queue capacity.
    pub inbound_capacity: usize,
    /// Outbound queue capacity.
    pub outbound_capacity: usize,
    /// Deadline for writing each whole frame, measured from its first byte.
    pub write_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            write_timeout: None,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency(),
            inbound_capacity: config.inbound_capacity(),
            outbound_capacity: config.outbound_capacity(),
            write_timeout: config.write_timeout(),
        }
    }
}

/// Terminal failure of a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading from or writing to the socket failed.
    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The switch sent a frame the codec rejected.
    #[error("malformed frame: {0}")]
    Wire(#[from] WireError),
    /// The switch reported an error.
    #[error("switch reported {0}")]
    Protocol(#[from] ProtocolError),
    /// The connection ended part way through a frame.
    #[error("connection closed after {received} of {expected} frame bytes")]
    Truncated {
        /// Bytes the frame needed.
        expected: usize,
        /// Bytes that arrived.
        received: usize,
    },
    /// Every dispatch worker exited while the switch was still sending.
    #[error("dispatch workers stopped before the connection ended")]
    WorkersStopped,
    /// A handler panicked and took its dispatch worker down.
    #[error("{workers} dispatch worker(s) panicked in the handler")]
    HandlerPanicked {
        /// Workers lost to a panic.
        workers: usize,
    },
}

/// Outcome of a finished session.
#[derive(Debug, Default)]
pub struct SessionReport {
    /// Remote address, when the socket could report it.
    pub peer: Option<SocketAddr>,
    /// Identity learned from the features reply.
    pub datapath_id: Option<DatapathId>,
    /// Frames read, keepalives included.
    pub frames_read: u64,
    /// Frames written, handshake included.
    pub frames_written: u64,
    /// Messages handed to the handler.
    pub messages_handled: u64,
    /// First terminal error. `None` when the switch closed cleanly.
    pub error: Option<SessionError>,
}

impl SessionReport {
    /// Whether the session ended without a terminal error.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// One accepted switch connection, ready to be served.
#[derive(Debug)]
pub struct Session {
    stream: TcpStream,
    options: SessionOptions,
    pool: ReadBufferPool,
}

impl Session {
    /// Wraps an accepted connection.
    #[must_use]
    pub const fn new(stream: TcpStream, options: SessionOptions, pool: ReadBufferPool) -> Self {
        Self {
            stream,
            options,
            pool,
        }
    }

    /// Runs the session to completion on the calling thread.
    ///
    /// Returns once the socket has been shut down and every session thread
    /// has exited.
    pub fn serve(self, handler: &Arc<dyn Handler>) -> SessionReport {
        let Self {
            stream,
            options,
            pool,
        } = self;
        let peer = stream.peer_addr().ok();
        let failure = Arc::new(OnceCell::new());

        let write_half = match stream.try_clone() {
            Ok(write_half) => write_half,
            Err(error) => {
                return SessionReport {
                    peer,
                    error: Some(SessionError::Io(error)),
                    ..SessionReport::default()
                };
            }
        };

        let (outbound_tx, outbound_rx) = bounded(options.outbound_capacity.max(1));
        let (inbound_tx, inbound_rx) = bounded(options.inbound_capacity.max(1));
        let writer_thread = spawn_writer(
            write_half,
            outbound_rx,
            options.write_timeout,
            Arc::clone(&failure),
        );
        let writer = Writer::new(outbound_tx);

        for frame in [hello(&[VERSION]), features_request()] {
            if let Err(error) = writer.write_bytes(frame) {
                debug!(target: SESSION_TARGET, error = %error, "handshake not queued");
                break;
            }
        }

        let workers = WorkerPool::spawn(options.concurrency, &inbound_rx, &writer, handler);
        drop(inbound_rx);

        let mut reader = FrameReader::new(stream, pool.acquire());
        let outcome = read_loop(&mut reader, &inbound_tx, &writer, &failure);

        drop(reader);
        drop(inbound_tx);
        let joined = workers.join();
        if joined.panicked > 0 {
            latch(
                &failure,
                SessionError::HandlerPanicked {
                    workers: joined.panicked,
                },
            );
        }
        if writer.close().is_err() {
            debug!(target: SESSION_TARGET, "writer already stopped");
        }
        drop(writer);
        let frames_written = writer_thread.join().unwrap_or_else(|_| {
            warn!(target: SESSION_TARGET, "session writer panicked");
            0
        });

        SessionReport {
            peer,
            datapath_id: outcome.datapath_id,
            frames_read: outcome.frames_read,
            frames_written,
            messages_handled: joined.handled,
            error: Arc::into_inner(failure).and_then(OnceCell::into_inner),
        }
    }
}

fn spawn_writer(
    stream: TcpStream,
    outbound: Receiver<Outbound>,
    write_timeout: Option<Duration>,
    failure: Arc<OnceCell<SessionError>>,
) -> JoinHandle<u64> {
    thread::spawn(move || {
        let mut sink = FrameDeadline::new(stream, write_timeout);
        let outcome = write_loop(&mut sink, &outbound);
        drop(outbound);
        if let Some(error) = outcome.error {
            latch(&failure, SessionError::Io(error));
        }
        match sink.get_ref().shutdown(Shutdown::Both) {
            Err(error) if error.kind() != io::ErrorKind::NotConnected => {
                debug!(target: SESSION_TARGET, error = %error, "socket shutdown failed");
            }
            _ => {}
        }
        outcome.frames_written
    })
}

/// Records `error` unless an earlier one is already held.
fn latch(failure: &OnceCell<SessionError>, error: SessionError) {
    if let Err(error) = failure.set(error) {
        debug!(
            target: SESSION_TARGET,
            error = %error,
            "suppressing error after session already failed"
        );
    }
}
