//! Single-slot handoff feeding the engine's standard input.
//!
//! The engine is strictly request-then-response, so at most one response is
//! ever pending. [`ResponseSlot::publish`] replaces the pending value and
//! wakes the pump; [`ResponseSlot::take`] blocks until a value is published
//! (or the slot is closed) and empties the slot. The pump thread started by
//! [`spawn_pump`] is the only consumer.

use std::io::Write;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<String>,
    closed: bool,
}

/// One-capacity rendezvous between the dispatch loop and the stdin pump.
#[derive(Debug, Default)]
pub struct ResponseSlot {
    state: Mutex<SlotState>,
    published: Condvar,
}

impl ResponseSlot {
    /// Creates an empty, open slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a response line, replacing any undelivered one.
    pub fn publish(&self, line: String) {
        let mut state = self.state.lock().expect("response slot lock poisoned");
        if state.pending.replace(line).is_some() {
            log::warn!("Replaced an undelivered response");
        }
        self.published.notify_one();
    }

    /// Blocks until a response is published, then takes it.
    ///
    /// Returns `None` once the slot is closed and drained.
    pub fn take(&self) -> Option<String> {
        let mut state = self.state.lock().expect("response slot lock poisoned");
        loop {
            if let Some(line) = state.pending.take() {
                return Some(line);
            }
            if state.closed {
                return None;
            }
            state = self
                .published
                .wait(state)
                .expect("response slot lock poisoned");
        }
    }

    /// Closes the slot, releasing a blocked [`take`](Self::take).
    pub fn close(&self) {
        let mut state = self.state.lock().expect("response slot lock poisoned");
        state.closed = true;
        self.published.notify_all();
    }

    /// Returns `true` if a published response has not been taken yet.
    pub fn is_pending(&self) -> bool {
        self.state
            .lock()
            .expect("response slot lock poisoned")
            .pending
            .is_some()
    }
}

/// Starts the thread that copies each published line into `sink`.
///
/// Each line is written in full with a trailing newline and flushed. The
/// thread ends when the slot is closed or `sink` stops accepting writes.
pub fn spawn_pump<W>(slot: Arc<ResponseSlot>, mut sink: W) -> JoinHandle<()>
where
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        log::debug!("Stdin pump started");
        while let Some(line) = slot.take() {
            let result = sink
                .write_all(line.as_bytes())
                .and_then(|()| sink.write_all(b"\n"))
                .and_then(|()| sink.flush());
            if let Err(e) = result {
                log::warn!("Engine stdin closed: {e}");
                break;
            }
        }
        log::debug!("Stdin pump stopped");
    })
}
