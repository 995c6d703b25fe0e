//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ember_rt::{Atom, Handler, Pid, Process, Reference, Registry, Term};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// A registry that records everything processes ask of it.
///
/// `signal_wake_up` only records the pid; tests call `handle_signals`
/// themselves so they control when the exit protocol runs.
#[derive(Default)]
pub struct Recording {
    next: AtomicU64,
    processes: Mutex<FxHashMap<Pid, Process>>,
    pub sent: Mutex<Vec<(Pid, Pid, Term)>>,
    pub link_exits: Mutex<Vec<(Pid, Pid, Term)>>,
    pub exited: Mutex<Vec<(Pid, Term)>>,
    pub wake_ups: Mutex<Vec<Pid>>,
}

impl Recording {
    pub fn new() -> Arc<Recording> {
        Arc::new(Recording::default())
    }

    pub fn registry(self: &Arc<Self>) -> Arc<dyn Registry> {
        Arc::clone(self) as Arc<dyn Registry>
    }

    /// A pid that belongs to no process, for the far side of links and
    /// monitors.
    pub fn peer(&self) -> Pid {
        self.allocate_pid()
    }

    pub fn exit_count(&self) -> usize {
        self.exited.lock().len()
    }
}

impl Registry for Recording {
    fn allocate_pid(&self) -> Pid {
        Pid::new(Atom::new("test@localhost"), self.next.fetch_add(1, Ordering::Relaxed), 1)
    }

    fn register(&self, process: &Process) {
        self.processes.lock().insert(process.pid(), process.clone());
    }

    fn lookup(&self, pid: Pid) -> Option<Process> {
        self.processes.lock().get(&pid).cloned()
    }

    fn signal_wake_up(&self, pid: Pid) {
        self.wake_ups.lock().push(pid);
    }

    fn on_exit_process(&self, pid: Pid, reason: &Term) {
        self.processes.lock().remove(&pid);
        self.exited.lock().push((pid, reason.clone()));
    }

    fn send(&self, sender: Pid, receiver: Pid, message: Term) {
        self.sent.lock().push((sender, receiver, message));
    }

    fn send_link_exit_notification(&self, sender: Pid, receiver: Pid, reason: Term) {
        self.link_exits.lock().push((sender, receiver, reason));
    }

    fn make_ref(&self) -> Reference {
        Reference::new(Atom::new("test@localhost"), self.next.fetch_add(1, Ordering::Relaxed), 1)
    }
}

/// Records every message handed to it.
#[derive(Default, Clone)]
pub struct Collect {
    pub seen: Arc<Mutex<Vec<Term>>>,
}

impl Collect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Term> {
        self.seen.lock().clone()
    }
}

impl Handler for Collect {
    fn handle_one_inbox_message(&self, _process: &Process, msg: Term) {
        self.seen.lock().push(msg);
    }
}

/// Panics on the atom `boom`, records anything else.
#[derive(Default, Clone)]
pub struct Fragile {
    pub seen: Arc<Mutex<Vec<Term>>>,
}

impl Handler for Fragile {
    fn handle_one_inbox_message(&self, _process: &Process, msg: Term) {
        if msg.is_atom_named("boom") {
            panic!("handler blew up");
        }
        self.seen.lock().push(msg);
    }
}

/// Poll `cond` until it holds, failing the test after two seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub fn atoms(names: &[&str]) -> Vec<Term> {
    names.iter().map(|n| Term::atom(n)).collect()
}
