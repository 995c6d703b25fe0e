//! Supervision of an active process's loop.
//!
//! The wrapper awaits the loop task and decides what its ending means:
//!
//! - clean return: nothing to do, the process just stops running.
//! - cancelled while `is_exiting`: the exit protocol cancelled it. Expected.
//! - cancelled otherwise, a panic, or a loop error: log it and run the exit
//!   protocol with reason `unhandledexception`, so links and monitors hear
//!   about the death exactly once.

use std::any::Any;

use ember_common::{Atom, Term};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error};

use super::process::Process;
use crate::error::ProcessError;

/// Exit reason used when the loop dies without going through `exit`.
pub const UNHANDLED_EXCEPTION: &str = "unhandledexception";

pub(crate) async fn run_wrapper(process: Process, run: JoinHandle<Result<(), ProcessError>>) {
    let pid = process.pid();
    let failure = match run.await {
        Ok(Ok(())) => {
            debug!(%pid, "process finished without any issues");
            return;
        }
        Ok(Err(err)) => err.to_string(),
        Err(join) if join.is_cancelled() => {
            if process.is_exiting() {
                return;
            }
            "loop cancelled while not exiting".to_string()
        }
        Err(join) => panic_message(join),
    };

    error!(%pid, error = %failure, "process got an exception in runtime");
    process.destroy();
    if let Err(err) = process.on_exit_signal(Some(Term::Atom(Atom::new(UNHANDLED_EXCEPTION)))) {
        error!(%pid, error = %err, "exit protocol failed");
    }
}

fn panic_message(join: JoinError) -> String {
    match join.try_into_panic() {
        Ok(payload) => describe_panic(payload),
        Err(join) => join.to_string(),
    }
}

fn describe_panic(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}
