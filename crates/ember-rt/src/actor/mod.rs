//! Process runtime.
//!
//! - **Process** (`process.rs`): the aggregate -- pid, lifecycle, handler,
//!   receive/deliver, and the exit protocol.
//! - **Mailbox** (`mailbox.rs`): FIFO queue with selective receive.
//! - **Signals** (`signal.rs`): the exit-signal queue, separate from the
//!   mailbox.
//! - **Links** (`link.rs`): link set and the two monitor maps, plus the
//!   `DOWN` message and link-reason rules.
//! - **Pattern** (`pattern.rs`): receive patterns.
//! - **Supervisor** (`supervisor.rs`): turns a crashed or unexpectedly
//!   cancelled loop into an exit.
//! - **Registry** (`registry.rs`): the node-side interface processes use,
//!   and named registration.
//! - **Node** (`node.rs`): the in-process registry.

pub mod link;
pub mod mailbox;
pub mod node;
pub mod pattern;
pub mod process;
pub mod registry;
pub mod signal;
pub mod supervisor;

pub use link::{down_message, link_exit_reason, Relations};
pub use mailbox::Mailbox;
pub use node::Node;
pub use pattern::{Matched, Pattern};
pub use process::{DropHandler, Handler, LifecycleState, Process, ProcessOptions, Receive};
pub use registry::{NameTable, Registry};
pub use signal::{Signal, SignalQueue};
pub use supervisor::UNHANDLED_EXCEPTION;
