//! Frame reading and demultiplexing for one connection.

use std::io::{self, Read};

use crossbeam::channel::Sender;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use trellis_wire::{
    DatapathId, HEADER_LEN, Header, MessageType, ProtocolError, datapath_id, set_message_type,
};

use super::{SESSION_TARGET, SessionError, latch};
use crate::buffer_pool::PooledBuffer;
use crate::message::Message;
use crate::writer::Writer;

/// Splits a byte stream into frames, staging reads in a pooled buffer.
pub(crate) struct FrameReader<R> {
    source: R,
    buffer: PooledBuffer,
    start: usize,
    end: usize,
}

impl<R: Read> FrameReader<R> {
    pub(crate) const fn new(source: R, buffer: PooledBuffer) -> Self {
        Self {
            source,
            buffer,
            start: 0,
            end: 0,
        }
    }

    /// Reads the next complete frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream on a frame
    /// boundary.
    pub(crate) fn next_frame(&mut self) -> Result<Option<(Header, Vec<u8>)>, SessionError> {
        if !self.fill_header()? {
            return Ok(None);
        }
        let header = Header::parse(self.buffered())?;
        let len = header.frame_len();
        let mut frame = vec![0; len];

        let take = self.buffered().len().min(len);
        if let (Some(target), Some(source)) = (frame.get_mut(..take), self.buffered().get(..take)) {
            target.copy_from_slice(source);
        }
        self.start += take;

        if let Some(rest) = frame.get_mut(take..) {
            read_full(&mut self.source, rest).map_err(|failure| match failure {
                ReadFailure::Eof(received) => SessionError::Truncated {
                    expected: len,
                    received: take + received,
                },
                ReadFailure::Io(error) => SessionError::Io(error),
            })?;
        }
        Ok(Some((header, frame)))
    }

    fn buffered(&self) -> &[u8] {
        self.buffer.get(self.start..self.end).unwrap_or_default()
    }

    /// Ensures a whole header is buffered. `Ok(false)` means clean end of
    /// stream with nothing pending.
    fn fill_header(&mut self) -> Result<bool, SessionError> {
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
        while self.end - self.start < HEADER_LEN {
            if self.start > 0 {
                self.buffer.copy_within(self.start..self.end, 0);
                self.end -= self.start;
                self.start = 0;
            }
            let Some(spare) = self.buffer.get_mut(self.end..) else {
                return Ok(false);
            };
            match self.source.read(spare) {
                Ok(0) if self.end == self.start => return Ok(false),
                Ok(0) => {
                    return Err(SessionError::Truncated {
                        expected: HEADER_LEN,
                        received: self.end - self.start,
                    });
                }
                Ok(read) => self.end += read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(SessionError::Io(error)),
            }
        }
        Ok(true)
    }
}

enum ReadFailure {
    Eof(usize),
    Io(io::Error),
}

fn read_full<R: Read>(source: &mut R, target: &mut [u8]) -> Result<(), ReadFailure> {
    let mut filled = 0;
    while filled < target.len() {
        let Some(spare) = target.get_mut(filled..) else {
            break;
        };
        match source.read(spare) {
            Ok(0) => return Err(ReadFailure::Eof(filled)),
            Ok(read) => filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(ReadFailure::Io(error)),
        }
    }
    Ok(())
}

/// What the read loop learned before it stopped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadOutcome {
    pub(crate) datapath_id: Option<DatapathId>,
    pub(crate) frames_read: u64,
}

/// Reads frames until the stream ends or fails, answering keepalives in
/// place and queueing everything else for the workers.
///
/// Blocks while `inbound` is full. Terminal errors go to `failure`; a clean
/// end of stream leaves it untouched.
pub(crate) fn read_loop<R: Read>(
    reader: &mut FrameReader<R>,
    inbound: &Sender<Message>,
    writer: &Writer,
    failure: &OnceCell<SessionError>,
) -> ReadOutcome {
    let mut outcome = ReadOutcome::default();
    loop {
        let (header, mut frame) = match reader.next_frame() {
            Ok(Some(next)) => next,
            Ok(None) => {
                debug!(target: SESSION_TARGET, "switch closed the connection");
                break;
            }
            Err(error) => {
                latch(failure, error);
                break;
            }
        };
        outcome.frames_read += 1;

        match header.message_type {
            MessageType::ECHO_REQUEST => {
                if let Err(error) = set_message_type(&mut frame, MessageType::ECHO_REPLY) {
                    latch(failure, error.into());
                    break;
                }
                if writer.write_bytes(frame).is_err() {
                    break;
                }
                continue;
            }
            MessageType::ERROR => {
                let error = match ProtocolError::parse(&frame) {
                    Ok(protocol) => SessionError::Protocol(protocol),
                    Err(wire) => SessionError::Wire(wire),
                };
                latch(failure, error);
                break;
            }
            MessageType::FEATURES_REPLY => match datapath_id(&frame) {
                Ok(id) => {
                    if outcome.datapath_id != Some(id) {
                        info!(
                            target: SESSION_TARGET,
                            datapath_id = %id,
                            "switch identified"
                        );
                    }
                    outcome.datapath_id = Some(id);
                }
                Err(error) => {
                    latch(failure, error.into());
                    break;
                }
            },
            _ => {}
        }

        let message = Message::new(outcome.datapath_id, header.message_type, frame);
        if inbound.send(message).is_err() {
            latch(failure, SessionError::WorkersStopped);
            break;
        }
    }
    outcome
}
