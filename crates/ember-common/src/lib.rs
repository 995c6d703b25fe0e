//! Shared value types for the Ember process runtime.
//!
//! Messages, exit reasons and routing keys are all [`Term`]s. The identity
//! types ([`Pid`], [`Reference`]) are opaque to the runtime: they are
//! allocated by a registry and only ever compared, hashed and printed.

pub mod atom;
pub mod term;

pub use atom::Atom;
pub use term::{Pid, Reference, Term};
