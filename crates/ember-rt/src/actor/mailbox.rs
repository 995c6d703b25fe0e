//! FIFO mailbox with selective receive.
//!
//! Senders push onto the tail from any thread; the owning process consumes
//! from the front. A selective receive walks the queue in arrival order,
//! moving messages that do not match into a scan buffer. When a message
//! matches, or the queue runs dry, the scan buffer is put back at the
//! front of the queue in its original order, ahead of anything that
//! arrived during the scan.
//!
//! A receive that finds nothing waits for the next arrival and then
//! rescans the whole queue from the front, so a previously skipped message
//! gets another chance against the same pattern.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use ember_common::Term;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::pattern::{Matched, Pattern};
use crate::error::ScanInProgress;

/// A thread-safe mailbox for one process.
pub struct Mailbox {
    queue: Mutex<VecDeque<Term>>,
    /// Skipped messages of the scan in progress. Empty outside `select`.
    scan: Mutex<VecDeque<Term>>,
    arrived: Notify,
    receiving: AtomicBool,
}

/// Restores the scan buffer and releases the in-flight flag, including
/// when the receive future is dropped by a timeout or task cancellation.
struct ScanGuard<'a> {
    mailbox: &'a Mailbox,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.mailbox.restore_scanned();
        self.mailbox.receiving.store(false, Ordering::Release);
    }
}

impl Mailbox {
    pub fn new() -> Self {
        Mailbox {
            queue: Mutex::new(VecDeque::new()),
            scan: Mutex::new(VecDeque::new()),
            arrived: Notify::new(),
            receiving: AtomicBool::new(false),
        }
    }

    /// Append to the tail and wake a waiting receive.
    pub fn push(&self, msg: Term) {
        self.queue.lock().push_back(msg);
        self.arrived.notify_one();
    }

    /// Remove the front message without pattern filtering.
    pub fn pop(&self) -> Option<Term> {
        self.queue.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of messages parked in the scan buffer.
    pub fn scan_len(&self) -> usize {
        self.scan.lock().len()
    }

    /// Copy of the queued messages, front first.
    pub fn snapshot(&self) -> Vec<Term> {
        self.queue.lock().iter().cloned().collect()
    }

    /// Wait for the first message accepted by `pattern` and return the
    /// result of its matching arm.
    ///
    /// Only one selective receive may run at a time; a second concurrent
    /// call fails with [`ScanInProgress`].
    pub async fn select(&self, pattern: &Pattern) -> Result<Term, ScanInProgress> {
        if self
            .receiving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ScanInProgress);
        }
        let guard = ScanGuard { mailbox: self };
        debug_assert_eq!(self.scan_len(), 0);

        loop {
            if let Some((msg, matched)) = self.scan_once(pattern) {
                drop(guard);
                return Ok(matched.run(msg));
            }
            self.arrived.notified().await;
        }
    }

    /// One pass over the queue. On return the scan buffer is empty.
    fn scan_once<'p>(&self, pattern: &'p Pattern) -> Option<(Term, Matched<'p>)> {
        loop {
            // The queue lock is not held while user predicates run.
            let next = self.queue.lock().pop_front();
            let Some(msg) = next else {
                self.restore_scanned();
                return None;
            };
            match pattern.test(&msg) {
                Some(matched) => {
                    self.restore_scanned();
                    return Some((msg, matched));
                }
                None => self.scan.lock().push_back(msg),
            }
        }
    }

    /// Move the scan buffer back to the front of the queue, oldest first.
    fn restore_scanned(&self) {
        let mut queue = self.queue.lock();
        let mut scan = self.scan.lock();
        while let Some(msg) = scan.pop_back() {
            queue.push_front(msg);
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("len", &self.len())
            .field("scan_len", &self.scan_len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
