//! Ember process runtime.
//!
//! Erlang-style processes on top of tokio: each process has a pid, a FIFO
//! mailbox with selective receive, a separate exit-signal queue, links and
//! monitors. A process's death always runs the exit protocol exactly once,
//! whether it exited on request, crashed, or was cancelled.
//!
//! ## Modules
//!
//! - [`actor`]: process, mailbox, signals, links/monitors, supervision,
//!   the [`Registry`](actor::Registry) seam and the in-process [`Node`](actor::Node)
//! - [`config`]: node configuration (TOML via serde)
//! - [`error`]: error types

pub mod actor;
pub mod config;
pub mod error;

pub use actor::{
    Handler, LifecycleState, Mailbox, Node, Pattern, Process, ProcessOptions, Receive, Registry,
    Signal,
};
pub use config::NodeConfig;
pub use error::{ConfigError, NodeError, ProcessError};

pub use ember_common::{Atom, Pid, Reference, Term};
