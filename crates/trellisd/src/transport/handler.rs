//! Seam between the acceptor and per-connection logic.

use std::net::TcpStream;
use std::sync::Arc;

/// Handles accepted connections.
///
/// Each call runs on a dedicated thread and may block for the lifetime of
/// the connection.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves one connection. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream);
}

impl<T> ConnectionHandler for Arc<T>
where
    T: ConnectionHandler + ?Sized,
{
    fn handle(&self, stream: TcpStream) {
        (**self).handle(stream);
    }
}
