//! Processes.
//!
//! A [`Process`] owns a mailbox, an exit-signal queue, its links and
//! monitors, and a lifecycle state. It is a cheap, cloneable handle; every
//! clone refers to the same process.
//!
//! Two modes, fixed at construction:
//!
//! - **active**: the process runs its own loop on the tokio runtime,
//!   receiving with its default pattern and passing each message to its
//!   [`Handler`]. The loop is wrapped by a supervisor so that a crash or an
//!   unexpected cancellation still runs the exit protocol.
//! - **passive**: no loop. [`Process::deliver`] calls the handler directly
//!   on the sender's thread.
//!
//! ## Exit protocol
//!
//! [`Process::exit`] only queues a signal and asks the registry to wake the
//! process. The teardown happens in [`Process::handle_signals`]: cancel the
//! loop, send `DOWN` to every monitor owner, notify linked peers (unless the
//! reason is `normal`), then tell the registry the pid is gone. The
//! `is_exiting` flag makes this run at most once.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ember_common::{Atom, Pid, Reference, Term};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use super::link::{self, Relations};
use super::mailbox::Mailbox;
use super::pattern::Pattern;
use super::registry::Registry;
use super::signal::{Signal, SignalQueue};
use super::supervisor;
use crate::error::ProcessError;

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Per-message behaviour of a process.
///
/// Handlers that keep state use interior mutability; the runtime never
/// calls a process's handler concurrently with itself or with that
/// process's exit handling.
pub trait Handler: Send + Sync + 'static {
    /// Handle one message. Active processes call this from their loop task;
    /// a passive delivery runs it on the delivering thread, or on the thread
    /// already handling a message for this process. The default logs the
    /// message at error level and drops it.
    fn handle_one_inbox_message(&self, process: &Process, msg: Term) {
        error!(pid = %process.pid(), %msg, "unhandled message");
    }
}

/// Logs and drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropHandler;

impl Handler for DropHandler {}

// ---------------------------------------------------------------------------
// ProcessOptions
// ---------------------------------------------------------------------------

/// Construction settings for a [`Process`].
pub struct ProcessOptions {
    passive: bool,
    handler: Arc<dyn Handler>,
    pattern: Pattern,
}

impl ProcessOptions {
    pub fn active() -> Self {
        ProcessOptions {
            passive: false,
            handler: Arc::new(DropHandler),
            pattern: Pattern::any(),
        }
    }

    pub fn passive() -> Self {
        ProcessOptions {
            passive: true,
            ..ProcessOptions::active()
        }
    }

    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub fn shared_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = handler;
        self
    }

    /// Default pattern for the process loop and for `receive` calls that
    /// do not supply one.
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = pattern;
        self
    }
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self::active()
    }
}

// ---------------------------------------------------------------------------
// Receive
// ---------------------------------------------------------------------------

type TimeoutHandler<'a> = Box<dyn FnOnce() -> Term + Send + 'a>;

/// Arguments of [`Process::receive`].
#[derive(Default)]
pub struct Receive<'a> {
    pattern: Option<&'a Pattern>,
    timeout: Option<Duration>,
    on_timeout: Option<TimeoutHandler<'a>>,
}

impl<'a> Receive<'a> {
    /// Use the process's default pattern.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matching(pattern: &'a Pattern) -> Self {
        Receive {
            pattern: Some(pattern),
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Produce the receive result when the timeout expires, instead of
    /// failing with [`ProcessError::Timeout`].
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Term + Send + 'a,
    {
        self.on_timeout = Some(Box::new(f));
        self
    }
}

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// Monotonic lifecycle of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Initializing,
    Running,
    Exiting,
    Terminated,
}

// ---------------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------------

struct ProcessInner {
    pid: Pid,
    passive: bool,
    registry: Arc<dyn Registry>,
    handler: Arc<dyn Handler>,
    pattern: Pattern,
    state: Mutex<LifecycleState>,
    mailbox: Mailbox,
    signals: SignalQueue,
    relations: Mutex<Relations>,
    is_exiting: AtomicBool,
    run_task: Mutex<Option<AbortHandle>>,
    /// Passive deliveries waiting for the step lock.
    deferred: Mutex<VecDeque<Term>>,
    /// Held while a handler runs and while exit begins, so the two never
    /// interleave. Reentrant so a handler may deliver to its own process.
    step: ReentrantMutex<()>,
}

/// Handle to a process.
#[derive(Clone)]
pub struct Process {
    inner: Arc<ProcessInner>,
}

impl Process {
    /// Create a process, register it, and (if active) start its loop on the
    /// current tokio runtime.
    pub fn spawn(registry: Arc<dyn Registry>, options: ProcessOptions) -> Result<Process, ProcessError> {
        let runtime = if options.passive {
            None
        } else {
            Some(Handle::try_current().map_err(|_| ProcessError::NoRuntime)?)
        };

        let pid = registry.allocate_pid();
        let process = Process {
            inner: Arc::new(ProcessInner {
                pid,
                passive: options.passive,
                registry: Arc::clone(&registry),
                handler: options.handler,
                pattern: options.pattern,
                state: Mutex::new(LifecycleState::Initializing),
                mailbox: Mailbox::new(),
                signals: SignalQueue::new(),
                relations: Mutex::new(Relations::new()),
                is_exiting: AtomicBool::new(false),
                run_task: Mutex::new(None),
                deferred: Mutex::new(VecDeque::new()),
                step: ReentrantMutex::new(()),
            }),
        };
        registry.register(&process);
        debug!(%pid, passive = options.passive, "spawned process");

        match runtime {
            None => process.advance(LifecycleState::Running),
            Some(handle) => {
                let run = handle.spawn(process.clone().process_loop());
                *process.inner.run_task.lock() = Some(run.abort_handle());
                handle.spawn(supervisor::run_wrapper(process.clone(), run));
            }
        }
        Ok(process)
    }

    pub fn pid(&self) -> Pid {
        self.inner.pid
    }

    pub fn is_passive(&self) -> bool {
        self.inner.passive
    }

    pub fn is_exiting(&self) -> bool {
        self.inner.is_exiting.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LifecycleState {
        *self.inner.state.lock()
    }

    /// The registry this process was spawned on.
    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.inner.registry
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.inner.mailbox
    }

    pub fn mailbox_len(&self) -> usize {
        self.inner.mailbox.len()
    }

    pub fn pending_signals(&self) -> usize {
        self.inner.signals.len()
    }

    fn advance(&self, next: LifecycleState) {
        let mut state = self.inner.state.lock();
        if next > *state {
            *state = next;
        }
    }

    // -- message loop -------------------------------------------------------

    async fn process_loop(self) -> Result<(), ProcessError> {
        self.advance(LifecycleState::Running);
        while !self.is_exiting() {
            let msg = self.receive(Receive::any()).await?;
            let _step = self.inner.step.lock();
            if self.is_exiting() {
                break;
            }
            self.inner.handler.handle_one_inbox_message(&self, msg);
        }
        debug!(pid = %self.pid(), "process loop stopped");
        Ok(())
    }

    /// Wait for a message.
    ///
    /// Without a pattern the process's default pattern is used. With a
    /// timeout, expiry returns the `on_timeout` result if one was given
    /// and [`ProcessError::Timeout`] otherwise; either way any messages
    /// skipped by the scan are back in the mailbox in their original order.
    pub async fn receive(&self, opts: Receive<'_>) -> Result<Term, ProcessError> {
        let Receive {
            pattern,
            timeout,
            on_timeout,
        } = opts;
        let pattern = pattern.unwrap_or(&self.inner.pattern);
        debug!(pid = %self.pid(), ?pattern, ?timeout, "starting receive");

        let Some(limit) = timeout else {
            return self.select(pattern).await;
        };
        match tokio::time::timeout(limit, self.select(pattern)).await {
            Ok(result) => result,
            Err(_elapsed) => match on_timeout {
                Some(f) => Ok(f()),
                None => Err(ProcessError::Timeout { pid: self.pid() }),
            },
        }
    }

    async fn select(&self, pattern: &Pattern) -> Result<Term, ProcessError> {
        self.inner
            .mailbox
            .select(pattern)
            .await
            .map_err(|_| ProcessError::ReceiveInProgress { pid: self.pid() })
    }

    /// Drain every queued message through the handler without blocking.
    /// Returns how many were handled.
    pub fn handle_inbox(&self) -> usize {
        let mut handled = 0;
        while let Some(msg) = self.inner.mailbox.pop() {
            handled += 1;
            let _step = self.inner.step.lock();
            self.inner.handler.handle_one_inbox_message(self, msg);
        }
        handled
    }

    /// Hand a message to this process: queued for an active process,
    /// handled synchronously for a passive one.
    ///
    /// A passive delivery never waits for another thread. If this process
    /// is already handling a message elsewhere, the message is left for
    /// that thread, which handles it before returning.
    pub fn deliver(&self, msg: Term) {
        if self.inner.passive {
            self.inner.deferred.lock().push_back(msg);
            self.drain_deferred();
        } else {
            self.inner.mailbox.push(msg);
        }
    }

    fn drain_deferred(&self) {
        loop {
            let Some(step) = self.inner.step.try_lock() else {
                // The holder rechecks the queue after unlocking.
                return;
            };
            loop {
                let next = self.inner.deferred.lock().pop_front();
                let Some(msg) = next else { break };
                if self.is_exiting() {
                    debug!(pid = %self.pid(), %msg, "message to exiting process dropped");
                    continue;
                }
                self.inner.handler.handle_one_inbox_message(self, msg);
            }
            drop(step);
            if self.inner.deferred.lock().is_empty() {
                return;
            }
        }
    }

    // -- exit protocol ------------------------------------------------------

    /// Request termination. Returns immediately; the teardown runs when the
    /// signal is handled.
    pub fn exit(&self, reason: Option<Term>) {
        info!(pid = %self.pid(), reason = ?reason, "got exit call, sending signal");
        self.inner.signals.push(Signal::Exit(reason));
        self.inner.registry.signal_wake_up(self.pid());
    }

    /// Wait for one signal and act on it.
    pub async fn handle_signals(&self) -> Result<(), ProcessError> {
        let Signal::Exit(reason) = self.inner.signals.recv().await;
        self.on_exit_signal(reason)
    }

    /// Handle every queued signal without waiting. Returns how many were
    /// taken off the queue.
    pub fn handle_pending_signals(&self) -> Result<usize, ProcessError> {
        let mut handled = 0;
        while let Some(Signal::Exit(reason)) = self.inner.signals.try_pop() {
            handled += 1;
            self.on_exit_signal(reason)?;
        }
        Ok(handled)
    }

    /// Cancel the loop task right away, skipping the signal queue.
    pub fn destroy(&self) {
        warn!(pid = %self.pid(), "destroying process");
        if let Some(task) = self.inner.run_task.lock().as_ref() {
            task.abort();
        }
    }

    pub(crate) fn on_exit_signal(&self, reason: Option<Term>) -> Result<(), ProcessError> {
        {
            let _step = self.inner.step.lock();
            if self.inner.is_exiting.swap(true, Ordering::AcqRel) {
                debug!(pid = %self.pid(), "already exiting");
                return Ok(());
            }
            self.advance(LifecycleState::Exiting);
            if let Some(task) = self.inner.run_task.lock().take() {
                task.abort();
            }
        }

        let reason = reason.unwrap_or_else(|| Term::Atom(Atom::normal()));
        debug!(pid = %self.pid(), %reason, "handling exit signal");
        self.trigger_monitors(&reason);
        self.trigger_links(&reason)?;

        self.inner.registry.on_exit_process(self.pid(), &reason);
        self.advance(LifecycleState::Terminated);
        Ok(())
    }

    fn trigger_monitors(&self, reason: &Term) {
        let owners = self.inner.relations.lock().monitored_by();
        for (reference, owner) in owners {
            let down = link::down_message(reference, self.pid(), reason);
            self.inner.registry.send(self.pid(), owner, down);
        }
    }

    fn trigger_links(&self, reason: &Term) -> Result<(), ProcessError> {
        let peer_reason = link::link_exit_reason(reason).map_err(|reason| {
            ProcessError::ReasonNotAtom {
                pid: self.pid(),
                reason,
            }
        })?;
        let Some(peer_reason) = peer_reason else {
            return Ok(());
        };
        let peers = self.inner.relations.lock().links();
        for peer in peers {
            self.inner
                .registry
                .send_link_exit_notification(self.pid(), peer, Term::Atom(peer_reason));
        }
        Ok(())
    }

    // -- links and monitors -------------------------------------------------

    pub fn add_link(&self, peer: Pid) {
        self.inner.relations.lock().add_link(peer);
    }

    pub fn remove_link(&self, peer: Pid) -> bool {
        self.inner.relations.lock().remove_link(peer)
    }

    pub fn add_monitor(&self, target: Pid, reference: Reference) {
        self.inner.relations.lock().add_monitor(target, reference);
    }

    pub fn add_monitored_by(&self, owner: Pid, reference: Reference) {
        self.inner.relations.lock().add_monitored_by(owner, reference);
    }

    pub fn remove_monitor(&self, target: Pid, reference: Reference) -> bool {
        self.inner.relations.lock().remove_monitor(target, reference)
    }

    pub fn remove_monitored_by(&self, owner: Pid, reference: Reference) -> bool {
        self.inner.relations.lock().remove_monitored_by(owner, reference)
    }

    pub fn links(&self) -> Vec<Pid> {
        self.inner.relations.lock().links()
    }

    pub fn monitors(&self) -> Vec<(Reference, Pid)> {
        self.inner.relations.lock().monitors()
    }

    pub fn monitored_by(&self) -> Vec<(Reference, Pid)> {
        self.inner.relations.lock().monitored_by()
    }
}

impl From<&Process> for Term {
    fn from(process: &Process) -> Self {
        Term::Pid(process.pid())
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process<{}>", self.pid())
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid())
            .field("passive", &self.inner.passive)
            .field("state", &self.state())
            .field("mailbox", &self.inner.mailbox)
            .field("signals", &self.inner.signals)
            .field("relations", &*self.inner.relations.lock())
            .finish()
    }
}
