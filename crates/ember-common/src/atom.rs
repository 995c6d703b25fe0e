//! Interned atoms.
//!
//! An [`Atom`] is a `u32` index into a global intern table, so atoms are
//! `Copy` and compare in O(1). Names are leaked into the table and never
//! collected, matching the lifetime of atoms on a BEAM node.

use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// AtomTable
// ---------------------------------------------------------------------------

struct AtomTable {
    /// name -> index
    by_name: FxHashMap<&'static str, u32>,
    /// index -> name
    names: Vec<&'static str>,
}

static ATOM_TABLE: OnceLock<RwLock<AtomTable>> = OnceLock::new();

fn table() -> &'static RwLock<AtomTable> {
    ATOM_TABLE.get_or_init(|| {
        RwLock::new(AtomTable {
            by_name: FxHashMap::default(),
            names: Vec::new(),
        })
    })
}

fn intern(name: &str) -> u32 {
    if let Some(&index) = table().read().by_name.get(name) {
        return index;
    }

    let mut table = table().write();
    // Another thread may have interned it between the two locks.
    if let Some(&index) = table.by_name.get(name) {
        return index;
    }
    let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
    let index = table.names.len() as u32;
    table.names.push(leaked);
    table.by_name.insert(leaked, index);
    index
}

// ---------------------------------------------------------------------------
// Atom
// ---------------------------------------------------------------------------

/// An immutable, interned symbolic constant (`normal`, `kill`, `DOWN`, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(u32);

impl Atom {
    /// Intern `name`, returning the existing atom if it was seen before.
    pub fn new(name: &str) -> Self {
        Atom(intern(name))
    }

    /// The atom's name.
    pub fn as_str(self) -> &'static str {
        // Every Atom value was produced by `intern`, so the index is valid.
        table().read().names[self.0 as usize]
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn normal() -> Self {
        Atom::new("normal")
    }

    pub fn kill() -> Self {
        Atom::new("kill")
    }

    pub fn killed() -> Self {
        Atom::new("killed")
    }
}

impl PartialEq<str> for Atom {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Atom {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl From<&str> for Atom {
    fn from(name: &str) -> Self {
        Atom::new(name)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({:?})", self.as_str())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Atom {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Atom::new(&name))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
