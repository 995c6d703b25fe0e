//! The registry seam and named registration.
//!
//! A [`Registry`] is everything a process needs from the node it lives on:
//! pid allocation, lookup, message routing and exit bookkeeping. Processes
//! hold an `Arc<dyn Registry>` handed to them at construction instead of
//! reaching for a global node table.
//!
//! [`NameTable`] implements named registration for registries that want
//! it. A name maps to one pid at a time, and all of a pid's names are
//! released when it exits.

use ember_common::{Atom, Pid, Reference, Term};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::process::Process;
use crate::error::NodeError;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Node-side services used by a [`Process`].
pub trait Registry: Send + Sync + 'static {
    /// A fresh pid for a process under construction.
    fn allocate_pid(&self) -> Pid;

    /// Make `process` reachable under its pid.
    fn register(&self, process: &Process);

    fn lookup(&self, pid: Pid) -> Option<Process>;

    /// An exit signal was queued for `pid`; arrange for
    /// [`Process::handle_signals`] to run.
    fn signal_wake_up(&self, pid: Pid);

    /// Called exactly once when `pid` finishes its exit protocol.
    fn on_exit_process(&self, pid: Pid, reason: &Term);

    fn send(&self, sender: Pid, receiver: Pid, message: Term);

    /// Tell a linked peer that `sender` exited with `reason`.
    fn send_link_exit_notification(&self, sender: Pid, receiver: Pid, reason: Term);

    fn make_ref(&self) -> Reference;
}

// ---------------------------------------------------------------------------
// NameTable
// ---------------------------------------------------------------------------

pub struct NameTable {
    /// name -> pid
    names: RwLock<FxHashMap<Atom, Pid>>,
    /// pid -> names, for cleanup on exit
    pid_names: RwLock<FxHashMap<Pid, Vec<Atom>>>,
}

impl NameTable {
    pub fn new() -> Self {
        NameTable {
            names: RwLock::new(FxHashMap::default()),
            pid_names: RwLock::new(FxHashMap::default()),
        }
    }

    /// Fails if `name` is already taken, even by the same pid.
    pub fn register(&self, name: Atom, pid: Pid) -> Result<(), NodeError> {
        let mut names = self.names.write();
        if let Some(&existing) = names.get(&name) {
            return Err(NodeError::NameTaken {
                name: name.as_str().to_string(),
                pid: existing,
            });
        }
        names.insert(name, pid);
        self.pid_names.write().entry(pid).or_default().push(name);
        Ok(())
    }

    pub fn whereis(&self, name: Atom) -> Option<Pid> {
        self.names.read().get(&name).copied()
    }

    /// Returns `true` if the name was registered.
    pub fn unregister(&self, name: Atom) -> bool {
        let Some(pid) = self.names.write().remove(&name) else {
            return false;
        };
        let mut pid_names = self.pid_names.write();
        if let Some(list) = pid_names.get_mut(&pid) {
            list.retain(|n| *n != name);
            if list.is_empty() {
                pid_names.remove(&pid);
            }
        }
        true
    }

    /// Drop every name held by `pid`.
    pub fn cleanup_process(&self, pid: Pid) {
        let released = self.pid_names.write().remove(&pid).unwrap_or_default();
        if !released.is_empty() {
            let mut names = self.names.write();
            for name in &released {
                names.remove(name);
            }
        }
    }
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
