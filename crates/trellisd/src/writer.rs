//! Handle through which handler logic queues frames for a session's socket.

use crossbeam::channel::Sender;
use thiserror::Error;

use trellis_wire::{Encode, HEADER_LEN, WireError};

/// Item carried by a session's outbound queue.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// A complete frame awaiting its transaction id.
    Frame(Vec<u8>),
    /// Stop after everything queued ahead of this marker has been written.
    Close,
}

/// Errors returned when queuing an outbound frame.
#[derive(Debug, Error)]
pub enum WriterError {
    /// The frame cannot carry a transaction id.
    #[error("frame of {len} bytes is shorter than the 8-byte header")]
    FrameTooShort {
        /// Length of the rejected frame.
        len: usize,
    },
    /// The message could not be encoded.
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] WireError),
    /// The session's write loop has stopped.
    #[error("session is closed")]
    SessionClosed,
}

/// Cloneable capability to queue frames on one session.
///
/// Queuing blocks only while the outbound queue is full. Transaction ids are
/// assigned by the session when the frame is written, so callers leave them
/// at zero.
#[derive(Debug, Clone)]
pub struct Writer {
    outbound: Sender<Outbound>,
}

impl Writer {
    pub(crate) const fn new(outbound: Sender<Outbound>) -> Self {
        Self { outbound }
    }

    /// Encodes `message` and queues the frame.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::Encode`] when encoding fails and
    /// [`WriterError::SessionClosed`] when the session is gone.
    pub fn write<M>(&self, message: &M) -> Result<(), WriterError>
    where
        M: Encode + ?Sized,
    {
        self.write_bytes(message.encode()?)
    }

    /// Queues an already encoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::FrameTooShort`] for frames without a complete
    /// header and [`WriterError::SessionClosed`] when the session is gone.
    pub fn write_bytes(&self, frame: Vec<u8>) -> Result<(), WriterError> {
        if frame.len() < HEADER_LEN {
            return Err(WriterError::FrameTooShort { len: frame.len() });
        }
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| WriterError::SessionClosed)
    }

    /// Queues the close marker; the write loop stops once it reaches it.
    pub(crate) fn close(&self) -> Result<(), WriterError> {
        self.outbound
            .send(Outbound::Close)
            .map_err(|_| WriterError::SessionClosed)
    }
}
