// LogPump - app/handoff.rs
//
// Consumer side of the pump's entry queue.
//
// The pump worker pushes entries into an `mpsc` channel as soon as the
// reorder buffers release them; the consumer drains it on its own schedule
// with a per-tick budget so one burst cannot starve the consumer's loop.

use crate::core::model::Entry;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Receiving end of the pump's FIFO entry queue.
#[derive(Debug)]
pub struct EntryReceiver {
    rx: mpsc::Receiver<Entry>,
    closed: bool,
}

impl EntryReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<Entry>) -> Self {
        Self { rx, closed: false }
    }

    /// Take up to `max` queued entries without blocking, oldest first.
    ///
    /// Entries beyond `max` stay queued for the next call.
    pub fn drain(&mut self, max: usize) -> Vec<Entry> {
        let mut entries = Vec::new();
        while entries.len() < max {
            match self.rx.try_recv() {
                Ok(entry) => entries.push(entry),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        if entries.len() == max {
            tracing::trace!(max, "Drain budget reached; remaining entries wait for next tick");
        }
        entries
    }

    /// Wait up to `timeout` for the next entry.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Entry> {
        match self.rx.recv_timeout(timeout) {
            Ok(entry) => Some(entry),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// True once the pump has been dropped and every entry has been taken.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
