//! Error types for the process runtime.

use ember_common::{Pid, Term};
use thiserror::Error;

/// Errors raised by process operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessError {
    /// A `receive` with a timeout and no timeout handler expired.
    #[error("receive in {pid} timed out")]
    Timeout { pid: Pid },

    /// A second `receive` was started while one is still in flight.
    #[error("receive already in progress in {pid}")]
    ReceiveInProgress { pid: Pid },

    /// Links only carry atom exit reasons.
    #[error("exit reason of {pid} must be an atom, got {reason}")]
    ReasonNotAtom { pid: Pid, reason: Term },

    /// Active processes run their loop on the ambient tokio runtime.
    #[error("active process requires a running tokio runtime")]
    NoRuntime,
}

/// A selective scan is already running on this mailbox.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("selective receive already in progress")]
pub struct ScanInProgress;

/// Errors raised by the in-process node registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("name '{name}' already registered to {pid}")]
    NameTaken { name: String, pid: Pid },

    #[error("no such process: {0}")]
    NoProcess(Pid),

    #[error("no process registered as '{0}'")]
    NotRegistered(String),
}

/// Errors raised while loading node configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid node config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid node name {0:?}: expected name@host")]
    InvalidName(String),
}
