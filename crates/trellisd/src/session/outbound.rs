//! The single writer that owns a session's socket write half.

use std::io::{self, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use tracing::{trace, warn};

use trellis_wire::stamp_xid;

use super::SESSION_TARGET;
use crate::writer::Outbound;

/// First transaction id assigned on a session.
pub(crate) const FIRST_XID: u32 = 1;

/// Result of draining the outbound queue.
#[derive(Debug)]
pub(crate) struct WriteOutcome {
    pub(crate) frames_written: u64,
    pub(crate) error: Option<io::Error>,
}

/// Writes queued frames in order until the close marker arrives, every
/// sender is gone, or the sink fails.
///
/// Each frame is stamped with the next transaction id just before it is
/// written, so ids on the wire increase by one per frame starting at
/// [`FIRST_XID`].
pub(crate) fn write_loop<W: Write>(sink: &mut W, outbound: &Receiver<Outbound>) -> WriteOutcome {
    let mut xid = FIRST_XID;
    let mut frames_written = 0;
    for item in outbound {
        let Outbound::Frame(mut frame) = item else {
            trace!(target: SESSION_TARGET, "outbound queue closed");
            break;
        };
        if let Err(error) = stamp_xid(&mut frame, xid) {
            warn!(target: SESSION_TARGET, error = %error, "skipping headerless frame");
            continue;
        }
        if let Err(error) = sink.write_all(&frame).and_then(|()| sink.flush()) {
            return WriteOutcome {
                frames_written,
                error: Some(error),
            };
        }
        frames_written += 1;
        xid = next_xid(xid);
    }
    WriteOutcome {
        frames_written,
        error: None,
    }
}

/// Socket write half whose timeout bounds a whole frame rather than one
/// syscall.
///
/// The clock starts at the first write after a flush and each later write
/// only gets what remains, so a peer draining a few bytes at a time cannot
/// stretch a frame past the deadline. [`write_loop`] flushes after every
/// frame, which re-arms it.
pub(crate) struct FrameDeadline {
    stream: TcpStream,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl FrameDeadline {
    pub(crate) const fn new(stream: TcpStream, timeout: Option<Duration>) -> Self {
        Self {
            stream,
            timeout,
            deadline: None,
        }
    }

    pub(crate) const fn get_ref(&self) -> &TcpStream {
        &self.stream
    }

    fn remaining(&mut self) -> Option<Duration> {
        let timeout = self.timeout?;
        let now = Instant::now();
        if self.deadline.is_none() {
            self.deadline = now.checked_add(timeout);
        }
        Some(self.deadline?.saturating_duration_since(now))
    }
}

impl Write for FrameDeadline {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(remaining) = self.remaining() {
            if remaining.is_zero() {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "frame write deadline passed",
                ));
            }
            self.stream.set_write_timeout(Some(remaining))?;
        }
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.deadline = None;
        self.stream.flush()
    }
}

/// Zero is never assigned, including after wrap-around.
const fn next_xid(xid: u32) -> u32 {
    match xid.wrapping_add(1) {
        0 => FIRST_XID,
        next => next,
    }
}
