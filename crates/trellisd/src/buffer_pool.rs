//! Process-wide pool of socket read buffers.
//!
//! Each session's reader holds one buffer for as long as it is reading and
//! hands it back before the session drains. Buffers are zero-filled to the
//! configured size on acquisition, so a reader never sees bytes left over
//! from another connection.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use object_pool::{Pool, ReusableOwned};
use once_cell::sync::OnceCell;

use trellis_config::{DEFAULT_BUFFER_POOL_CAPACITY, DEFAULT_READ_BUFFER_SIZE};
use trellis_wire::HEADER_LEN;

static SHARED: OnceCell<ReadBufferPool> = OnceCell::new();

/// Bounded pool of read buffers.
#[derive(Clone)]
pub struct ReadBufferPool {
    pool: Arc<Pool<Vec<u8>>>,
    capacity: usize,
    buffer_size: usize,
}

impl ReadBufferPool {
    /// Creates a pool retaining at most `capacity` idle buffers of
    /// `buffer_size` bytes each.
    #[must_use]
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(HEADER_LEN);
        Self {
            pool: Arc::new(Pool::new(0, move || Vec::with_capacity(buffer_size))),
            capacity,
            buffer_size,
        }
    }

    /// Returns the process-wide pool, creating it with the given sizing on
    /// first use. Later calls ignore their arguments.
    #[must_use]
    pub fn shared_with(capacity: usize, buffer_size: usize) -> Self {
        SHARED
            .get_or_init(|| Self::new(capacity, buffer_size))
            .clone()
    }

    /// Returns the process-wide pool with default sizing.
    #[must_use]
    pub fn shared() -> Self {
        Self::shared_with(DEFAULT_BUFFER_POOL_CAPACITY, DEFAULT_READ_BUFFER_SIZE)
    }

    /// Takes a buffer from the pool, allocating when none is idle.
    #[must_use]
    pub fn acquire(&self) -> PooledBuffer {
        let buffer_size = self.buffer_size;
        let mut inner = self
            .pool
            .pull_owned(|| Vec::with_capacity(buffer_size));
        inner.clear();
        inner.resize(buffer_size, 0);
        PooledBuffer {
            inner: Some(inner),
            capacity: self.capacity,
        }
    }

    /// Idle buffers currently held.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.pool.len()
    }

    /// Size of each buffer handed out.
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl std::fmt::Debug for ReadBufferPool {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ReadBufferPool")
            .field("idle", &self.pool.len())
            .field("capacity", &self.capacity)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

/// A buffer on loan from a [`ReadBufferPool`].
///
/// Dropping the guard returns the buffer exactly once. When the pool already
/// holds its full complement of idle buffers the returned one is freed.
pub struct PooledBuffer {
    inner: Option<ReusableOwned<Vec<u8>>>,
    capacity: usize,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        match self.inner.as_deref() {
            Some(buffer) => buffer.as_slice(),
            None => &[],
        }
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.inner.as_deref_mut() {
            Some(buffer) => buffer.as_mut_slice(),
            None => &mut [],
        }
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let Some(reusable) = self.inner.take() else {
            return;
        };
        let (pool, mut buffer) = reusable.detach();
        if pool.len() < self.capacity {
            buffer.clear();
            pool.attach(buffer);
        }
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PooledBuffer")
            .field("len", &self.len())
            .finish()
    }
}
