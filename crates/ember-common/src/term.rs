//! Terms: the values carried in messages and exit reasons.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::atom::Atom;

// ---------------------------------------------------------------------------
// Pid
// ---------------------------------------------------------------------------

/// Process identifier.
///
/// Allocated exactly once by a registry when a process is constructed;
/// unique within `(node, creation)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid {
    pub node: Atom,
    pub id: u64,
    pub creation: u32,
}

impl Pid {
    pub fn new(node: Atom, id: u64, creation: u32) -> Self {
        Pid { node, id, creation }
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({}.{}.{})", self.node, self.id, self.creation)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}.{}.{}>", self.node, self.id, self.creation)
    }
}

// ---------------------------------------------------------------------------
// Reference
// ---------------------------------------------------------------------------

/// A unique token scoping one monitor (or any other one-shot relationship).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub node: Atom,
    pub id: u64,
    pub creation: u32,
}

impl Reference {
    pub fn new(node: Atom, id: u64, creation: u32) -> Self {
        Reference { node, id, creation }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({}.{}.{})", self.node, self.id, self.creation)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#Ref<{}.{}.{}>", self.node, self.id, self.creation)
    }
}

// ---------------------------------------------------------------------------
// Term
// ---------------------------------------------------------------------------

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Atom(Atom),
    Int(i64),
    Binary(Vec<u8>),
    Str(String),
    Pid(Pid),
    Ref(Reference),
    Tuple(Vec<Term>),
    List(Vec<Term>),
}

impl Term {
    pub fn atom(name: &str) -> Self {
        Term::Atom(Atom::new(name))
    }

    pub fn tuple(items: impl IntoIterator<Item = Term>) -> Self {
        Term::Tuple(items.into_iter().collect())
    }

    pub fn list(items: impl IntoIterator<Item = Term>) -> Self {
        Term::List(items.into_iter().collect())
    }

    pub fn as_atom(&self) -> Option<Atom> {
        match self {
            Term::Atom(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Term::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_pid(&self) -> Option<Pid> {
        match self {
            Term::Pid(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Term]> {
        match self {
            Term::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// `true` if this is the atom called `name`.
    pub fn is_atom_named(&self, name: &str) -> bool {
        matches!(self, Term::Atom(a) if *a == name)
    }

    /// `true` if this is a tuple whose first element is the atom `tag`.
    pub fn is_tagged(&self, tag: &str) -> bool {
        self.as_tuple()
            .and_then(|items| items.first())
            .is_some_and(|first| first.is_atom_named(tag))
    }
}

impl From<Atom> for Term {
    fn from(a: Atom) -> Self {
        Term::Atom(a)
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Int(n)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::Str(s.to_string())
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Term::Str(s)
    }
}

impl From<Vec<u8>> for Term {
    fn from(bytes: Vec<u8>) -> Self {
        Term::Binary(bytes)
    }
}

impl From<Pid> for Term {
    fn from(pid: Pid) -> Self {
        Term::Pid(pid)
    }
}

impl From<Reference> for Term {
    fn from(r: Reference) -> Self {
        Term::Ref(r)
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Term]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(a) => write!(f, "{}", a),
            Term::Int(n) => write!(f, "{}", n),
            Term::Binary(bytes) => {
                f.write_str("<<")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", b)?;
                }
                f.write_str(">>")
            }
            Term::Str(s) => write!(f, "{:?}", s),
            Term::Pid(p) => write!(f, "{}", p),
            Term::Ref(r) => write!(f, "{}", r),
            Term::Tuple(items) => {
                f.write_str("{")?;
                write_seq(f, items)?;
                f.write_str("}")
            }
            Term::List(items) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                f.write_str("]")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
