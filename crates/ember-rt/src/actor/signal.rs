//! Exit-signal queue.
//!
//! Signals travel on their own queue so they are never ordered behind, or
//! matched away with, ordinary mailbox traffic. Producers push from any
//! thread; the process consumes one signal at a time.

use std::collections::VecDeque;

use ember_common::Term;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// A control-plane request for a process.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Terminate with the given reason (`normal` when `None`).
    Exit(Option<Term>),
}

pub struct SignalQueue {
    queue: Mutex<VecDeque<Signal>>,
    arrived: Notify,
}

impl SignalQueue {
    pub fn new() -> Self {
        SignalQueue {
            queue: Mutex::new(VecDeque::new()),
            arrived: Notify::new(),
        }
    }

    pub fn push(&self, signal: Signal) {
        self.queue.lock().push_back(signal);
        self.arrived.notify_one();
    }

    pub fn try_pop(&self) -> Option<Signal> {
        self.queue.lock().pop_front()
    }

    /// Wait for the next signal.
    pub async fn recv(&self) -> Signal {
        loop {
            if let Some(signal) = self.try_pop() {
                return signal;
            }
            self.arrived.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Default for SignalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalQueue").field("len", &self.len()).finish()
    }
}
