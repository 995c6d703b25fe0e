//! In-process node: the default [`Registry`].
//!
//! A `Node` owns the process table for one runtime instance, allocates pids
//! and references from sequential counters, routes messages between local
//! processes, and keeps both sides of links and monitors consistent.
//!
//! Sends to a pid that is not (or no longer) in the table are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ember_common::{Atom, Pid, Reference, Term};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use super::link;
use super::process::{Process, ProcessOptions};
use super::registry::{NameTable, Registry};
use crate::config::NodeConfig;
use crate::error::{NodeError, ProcessError};

pub struct Node {
    name: Atom,
    creation: u32,
    processes: RwLock<FxHashMap<Pid, Process>>,
    names: NameTable,
    next_pid: AtomicU64,
    next_ref: AtomicU64,
}

impl Node {
    pub fn new(config: NodeConfig) -> Arc<Node> {
        Arc::new(Node {
            name: Atom::new(&config.name),
            creation: config.creation,
            processes: RwLock::new(FxHashMap::default()),
            names: NameTable::new(),
            next_pid: AtomicU64::new(1),
            next_ref: AtomicU64::new(1),
        })
    }

    pub fn name(&self) -> Atom {
        self.name
    }

    pub fn creation(&self) -> u32 {
        self.creation
    }

    /// Spawn a process registered on this node.
    pub fn spawn(self: &Arc<Self>, options: ProcessOptions) -> Result<Process, ProcessError> {
        Process::spawn(Arc::clone(self) as Arc<dyn Registry>, options)
    }

    pub fn process_count(&self) -> usize {
        self.processes.read().len()
    }

    pub fn is_alive(&self, pid: Pid) -> bool {
        self.processes.read().contains_key(&pid)
    }

    // -- names --------------------------------------------------------------

    pub fn register_name(&self, name: &str, pid: Pid) -> Result<(), NodeError> {
        // Held across the insert so `on_exit_process` cannot remove the pid
        // and clean up its names in between.
        let processes = self.processes.read();
        if !processes.contains_key(&pid) {
            return Err(NodeError::NoProcess(pid));
        }
        self.names.register(Atom::new(name), pid)
    }

    pub fn unregister_name(&self, name: &str) -> bool {
        self.names.unregister(Atom::new(name))
    }

    pub fn whereis(&self, name: &str) -> Option<Pid> {
        self.names.whereis(Atom::new(name))
    }

    pub fn send_to_name(&self, sender: Pid, name: &str, message: Term) -> Result<(), NodeError> {
        let receiver = self
            .whereis(name)
            .ok_or_else(|| NodeError::NotRegistered(name.to_string()))?;
        self.send(sender, receiver, message);
        Ok(())
    }

    // -- links and monitors -------------------------------------------------

    /// Link two live processes, both sides.
    pub fn link(&self, a: Pid, b: Pid) -> Result<(), NodeError> {
        let pa = self.lookup(a).ok_or(NodeError::NoProcess(a))?;
        let pb = self.lookup(b).ok_or(NodeError::NoProcess(b))?;
        pa.add_link(b);
        pb.add_link(a);
        Ok(())
    }

    /// Remove a link from whichever sides are still alive.
    pub fn unlink(&self, a: Pid, b: Pid) {
        if let Some(pa) = self.lookup(a) {
            pa.remove_link(b);
        }
        if let Some(pb) = self.lookup(b) {
            pb.remove_link(a);
        }
    }

    /// `owner` starts monitoring `target`. If `target` is not alive the
    /// owner immediately gets a `DOWN` with reason `noproc`.
    pub fn monitor_process(&self, owner: Pid, target: Pid) -> Reference {
        let reference = self.make_ref();
        match self.lookup(target) {
            Some(target_proc) => {
                target_proc.add_monitored_by(owner, reference);
                if let Some(owner_proc) = self.lookup(owner) {
                    owner_proc.add_monitor(target, reference);
                }
            }
            None => {
                let down = link::down_message(reference, target, &Term::atom("noproc"));
                self.send(target, owner, down);
            }
        }
        reference
    }

    pub fn demonitor_process(&self, owner: Pid, target: Pid, reference: Reference) {
        if let Some(target_proc) = self.lookup(target) {
            target_proc.remove_monitored_by(owner, reference);
        }
        if let Some(owner_proc) = self.lookup(owner) {
            owner_proc.remove_monitor(target, reference);
        }
    }

    /// Ask `receiver` to exit with `reason` on behalf of `sender`.
    pub fn exit_process(&self, sender: Pid, receiver: Pid, reason: Term) {
        match self.lookup(receiver) {
            Some(process) => {
                debug!(%sender, %receiver, %reason, "exit requested");
                process.exit(Some(reason));
            }
            None => debug!(%sender, %receiver, "exit for unknown process dropped"),
        }
    }

    /// Hard shutdown: cancel every process loop and empty the table.
    pub fn destroy(&self) {
        let processes: Vec<Process> = self.processes.write().drain().map(|(_, p)| p).collect();
        warn!(node = %self.name, count = processes.len(), "destroying node");
        for process in processes {
            self.names.cleanup_process(process.pid());
            process.destroy();
        }
    }
}

impl Registry for Node {
    fn allocate_pid(&self) -> Pid {
        Pid::new(self.name, self.next_pid.fetch_add(1, Ordering::Relaxed), self.creation)
    }

    fn register(&self, process: &Process) {
        self.processes.write().insert(process.pid(), process.clone());
    }

    fn lookup(&self, pid: Pid) -> Option<Process> {
        self.processes.read().get(&pid).cloned()
    }

    fn signal_wake_up(&self, pid: Pid) {
        let Some(process) = self.lookup(pid) else {
            debug!(%pid, "wake up for unknown process ignored");
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = process.handle_signals().await {
                        error!(pid = %process.pid(), error = %err, "signal handling failed");
                    }
                });
            }
            // Outside a runtime only passive processes can exist; handle
            // the signal inline.
            Err(_) => {
                if let Err(err) = process.handle_pending_signals() {
                    error!(%pid, error = %err, "signal handling failed");
                }
            }
        }
    }

    fn on_exit_process(&self, pid: Pid, reason: &Term) {
        debug!(%pid, %reason, "process exited");
        self.processes.write().remove(&pid);
        self.names.cleanup_process(pid);
    }

    fn send(&self, sender: Pid, receiver: Pid, message: Term) {
        match self.lookup(receiver) {
            Some(process) => process.deliver(message),
            None => debug!(%sender, %receiver, "message to unknown process dropped"),
        }
    }

    fn send_link_exit_notification(&self, sender: Pid, receiver: Pid, reason: Term) {
        let Some(process) = self.lookup(receiver) else {
            debug!(%sender, %receiver, "link exit for unknown process dropped");
            return;
        };
        // The sender is gone; do not notify it back.
        process.remove_link(sender);
        process.exit(Some(reason));
    }

    fn make_ref(&self) -> Reference {
        Reference::new(self.name, self.next_ref.fetch_add(1, Ordering::Relaxed), self.creation)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("creation", &self.creation)
            .field("processes", &self.process_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
