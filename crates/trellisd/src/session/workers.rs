//! Dispatch workers draining a session's inbound queue.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Receiver;
use tracing::warn;

use super::SESSION_TARGET;
use crate::handler::Handler;
use crate::message::Message;
use crate::writer::Writer;

/// Fixed set of threads sharing one inbound queue.
///
/// Each message is received by exactly one worker. Workers exit once the
/// queue is closed and empty.
pub(crate) struct WorkerPool {
    workers: Vec<JoinHandle<u64>>,
}

impl WorkerPool {
    /// Starts `count` workers (at least one).
    pub(crate) fn spawn(
        count: usize,
        inbound: &Receiver<Message>,
        writer: &Writer,
        handler: &Arc<dyn Handler>,
    ) -> Self {
        let workers = (0..count.max(1))
            .map(|_| {
                let inbound = inbound.clone();
                let writer = writer.clone();
                let handler = Arc::clone(handler);
                thread::spawn(move || {
                    let mut handled = 0;
                    for message in &inbound {
                        handler.handle(&writer, message);
                        handled += 1;
                    }
                    handled
                })
            })
            .collect();
        Self { workers }
    }

    /// Waits for every worker.
    ///
    /// A panicking handler takes its worker down while the remaining workers
    /// keep draining. Messages handled by a panicked worker are not counted.
    pub(crate) fn join(self) -> Joined {
        let mut joined = Joined::default();
        for worker in self.workers {
            match worker.join() {
                Ok(handled) => joined.handled += handled,
                Err(_) => {
                    warn!(target: SESSION_TARGET, "dispatch worker panicked");
                    joined.panicked += 1;
                }
            }
        }
        joined
    }
}

/// Totals gathered from a stopped pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Joined {
    pub(crate) handled: u64,
    pub(crate) panicked: usize,
}
