//! Links and monitors.
//!
//! [`Relations`] holds one process's side of its relationships:
//!
//! - **links**: symmetric peers. Abnormal exits propagate to every peer;
//!   `normal` does not, and `kill` is seen by peers as `killed`.
//! - **monitors**: targets this process watches, keyed by reference.
//! - **monitored_by**: owners watching this process, keyed by reference.
//!   Every exit, `normal` included, sends each owner a `DOWN` message.
//!
//! Keeping the peer's side consistent is the registry's job; see
//! [`Node::link`](super::Node::link) and
//! [`Node::monitor_process`](super::Node::monitor_process).

use ember_common::{Atom, Pid, Reference, Term};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Default, Clone)]
pub struct Relations {
    links: FxHashSet<Pid>,
    monitors: FxHashMap<Reference, Pid>,
    monitored_by: FxHashMap<Reference, Pid>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn add_link(&mut self, peer: Pid) {
        self.links.insert(peer);
    }

    /// Returns `true` if the peer was linked.
    pub fn remove_link(&mut self, peer: Pid) -> bool {
        self.links.remove(&peer)
    }

    /// A reused reference overwrites the previous target.
    pub fn add_monitor(&mut self, target: Pid, reference: Reference) {
        self.monitors.insert(reference, target);
    }

    pub fn add_monitored_by(&mut self, owner: Pid, reference: Reference) {
        self.monitored_by.insert(reference, owner);
    }

    /// Removes the monitor only if `reference` currently points at
    /// `target`; a stale demonitor is a no-op.
    pub fn remove_monitor(&mut self, target: Pid, reference: Reference) -> bool {
        remove_if_matches(&mut self.monitors, reference, target)
    }

    pub fn remove_monitored_by(&mut self, owner: Pid, reference: Reference) -> bool {
        remove_if_matches(&mut self.monitored_by, reference, owner)
    }

    pub fn links(&self) -> Vec<Pid> {
        self.links.iter().copied().collect()
    }

    pub fn is_linked(&self, peer: Pid) -> bool {
        self.links.contains(&peer)
    }

    pub fn monitors(&self) -> Vec<(Reference, Pid)> {
        self.monitors.iter().map(|(r, p)| (*r, *p)).collect()
    }

    pub fn monitored_by(&self) -> Vec<(Reference, Pid)> {
        self.monitored_by.iter().map(|(r, p)| (*r, *p)).collect()
    }
}

fn remove_if_matches(map: &mut FxHashMap<Reference, Pid>, reference: Reference, expected: Pid) -> bool {
    if map.get(&reference) == Some(&expected) {
        map.remove(&reference);
        true
    } else {
        false
    }
}

/// `{'DOWN', Ref, process, Pid, Reason}`
pub fn down_message(reference: Reference, pid: Pid, reason: &Term) -> Term {
    Term::tuple([
        Term::atom("DOWN"),
        Term::Ref(reference),
        Term::atom("process"),
        Term::Pid(pid),
        reason.clone(),
    ])
}

/// The reason linked peers observe, or `None` when the exit does not
/// propagate over links.
///
/// Errors with the offending term when `reason` is not an atom.
pub fn link_exit_reason(reason: &Term) -> Result<Option<Atom>, Term> {
    let Some(atom) = reason.as_atom() else {
        return Err(reason.clone());
    };
    if atom == "normal" {
        Ok(None)
    } else if atom == "kill" {
        Ok(Some(Atom::killed()))
    } else {
        Ok(Some(atom))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
