use crate::endpoint::{DEFAULT_OPENFLOW_PORT, ListenEndpoint};

/// Worker threads per session.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Write deadline in milliseconds; zero means no deadline.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 0;

/// Capacity of the reader-to-worker queue.
pub const DEFAULT_INBOUND_CAPACITY: usize = 100;

/// Capacity of the queue feeding the writer.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 100;

/// Bytes requested from the socket per read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Idle buffers kept for reuse across sessions.
pub const DEFAULT_BUFFER_POOL_CAPACITY: usize = 256;

pub(crate) const MIN_READ_BUFFER_SIZE: usize = 8;

/// Listen on every interface at the standard OpenFlow port.
#[must_use]
pub fn default_listen_endpoint() -> ListenEndpoint {
    ListenEndpoint::tcp("0.0.0.0", DEFAULT_OPENFLOW_PORT)
}
