//! Error types for the acceptor.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Host name resolution failed.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Host that was looked up.
        host: String,
        /// Requested port.
        port: u16,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded without yielding an address.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Host that was looked up.
        host: String,
        /// Requested port.
        port: u16,
    },
    /// The socket could not be bound.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Address that was tried.
        addr: SocketAddr,
        /// Bind failure.
        #[source]
        source: io::Error,
    },
    /// The listener could not be switched to non-blocking mode.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// `accept` failed with an error that retrying cannot fix.
    #[error("accept failed: {source}")]
    Accept {
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The accept loop panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
