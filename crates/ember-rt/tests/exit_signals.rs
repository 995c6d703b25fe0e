//! The exit protocol: monitors, links, crash containment and teardown.

mod common;

use std::sync::Arc;

use common::{eventually, settle, Collect, Fragile, Recording};
use ember_rt::{
    Atom, LifecycleState, Pid, Process, ProcessError, ProcessOptions, Reference, Registry, Term,
};

const UNHANDLED: &str = ember_rt::actor::UNHANDLED_EXCEPTION;

fn down(reference: Reference, pid: Pid, reason: &str) -> Term {
    ember_rt::actor::down_message(reference, pid, &Term::atom(reason))
}

/// A process with one linked peer and one monitor owner, both fake pids.
struct Watched {
    process: Process,
    peer: Pid,
    owner: Pid,
    reference: Reference,
}

fn watched(rec: &Arc<Recording>, options: ProcessOptions) -> Watched {
    let process = Process::spawn(rec.registry(), options).unwrap();
    let peer = rec.peer();
    let owner = rec.peer();
    let reference = rec.make_ref();
    process.add_link(peer);
    process.add_monitored_by(owner, reference);
    Watched {
        process,
        peer,
        owner,
        reference,
    }
}

// ── Requested exits ─────────────────────────────────────────────────────

#[tokio::test]
async fn exit_only_queues_and_wakes() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::passive());

    w.process.exit(None);

    assert_eq!(w.process.pending_signals(), 1);
    assert_eq!(*rec.wake_ups.lock(), vec![w.process.pid()]);
    assert!(!w.process.is_exiting());
    assert_eq!(rec.exit_count(), 0);
}

#[tokio::test]
async fn normal_exit_sends_down_but_no_link_notification() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::passive());
    let pid = w.process.pid();

    w.process.exit(None);
    w.process.handle_signals().await.unwrap();

    assert_eq!(
        *rec.sent.lock(),
        vec![(pid, w.owner, down(w.reference, pid, "normal"))]
    );
    assert!(rec.link_exits.lock().is_empty());
    assert_eq!(*rec.exited.lock(), vec![(pid, Term::atom("normal"))]);
    assert_eq!(w.process.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn kill_reaches_peers_as_killed() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::passive());
    let pid = w.process.pid();

    w.process.exit(Some(Term::Atom(Atom::kill())));
    w.process.handle_signals().await.unwrap();

    assert_eq!(
        *rec.link_exits.lock(),
        vec![(pid, w.peer, Term::atom("killed"))]
    );
    // Monitor owners see the reason as given.
    assert_eq!(
        *rec.sent.lock(),
        vec![(pid, w.owner, down(w.reference, pid, "kill"))]
    );
}

#[tokio::test]
async fn other_atom_reasons_pass_through_to_peers() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::passive());

    w.process.exit(Some(Term::atom("shutdown")));
    w.process.handle_signals().await.unwrap();

    assert_eq!(
        *rec.link_exits.lock(),
        vec![(w.process.pid(), w.peer, Term::atom("shutdown"))]
    );
}

#[tokio::test]
async fn non_atom_reason_is_rejected_after_monitors_fire() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::passive());
    let pid = w.process.pid();

    w.process.exit(Some(Term::Int(5)));
    let err = w.process.handle_signals().await.unwrap_err();

    assert_eq!(
        err,
        ProcessError::ReasonNotAtom {
            pid,
            reason: Term::Int(5)
        }
    );
    assert_eq!(rec.sent.lock().len(), 1);
    assert!(rec.link_exits.lock().is_empty());
    assert_eq!(rec.exit_count(), 0);
    assert_eq!(w.process.state(), LifecycleState::Exiting);
}

#[tokio::test]
async fn second_exit_is_a_no_op() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::passive());

    w.process.exit(Some(Term::atom("first")));
    w.process.exit(Some(Term::atom("second")));
    w.process.handle_signals().await.unwrap();
    w.process.handle_signals().await.unwrap();

    assert_eq!(rec.sent.lock().len(), 1);
    assert_eq!(rec.link_exits.lock().len(), 1);
    assert_eq!(
        *rec.exited.lock(),
        vec![(w.process.pid(), Term::atom("first"))]
    );
}

#[test]
fn pending_signals_drain_without_runtime() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::passive());

    w.process.exit(None);
    w.process.exit(Some(Term::Atom(Atom::kill())));

    assert_eq!(w.process.handle_pending_signals().unwrap(), 2);
    assert_eq!(w.process.pending_signals(), 0);
    assert_eq!(rec.exit_count(), 1);
    assert!(rec.link_exits.lock().is_empty());
}

#[tokio::test]
async fn demonitored_owner_gets_no_down() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::passive());

    // Wrong owner: nothing removed.
    assert!(!w.process.remove_monitored_by(w.peer, w.reference));
    assert!(w.process.remove_monitored_by(w.owner, w.reference));

    w.process.exit(Some(Term::atom("shutdown")));
    w.process.handle_signals().await.unwrap();

    assert!(rec.sent.lock().is_empty());
    assert_eq!(rec.link_exits.lock().len(), 1);
}

#[tokio::test]
async fn unlinked_peer_is_not_notified() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::passive());
    assert!(w.process.remove_link(w.peer));

    w.process.exit(Some(Term::Atom(Atom::kill())));
    w.process.handle_signals().await.unwrap();

    assert!(rec.link_exits.lock().is_empty());
}

// ── Active processes ────────────────────────────────────────────────────

#[tokio::test]
async fn exit_cancels_loop_without_second_exit() {
    let rec = Recording::new();
    let collect = Collect::new();
    let w = watched(&rec, ProcessOptions::active().handler(collect.clone()));
    settle().await;

    w.process.exit(Some(Term::atom("shutdown")));
    w.process.handle_signals().await.unwrap();
    settle().await;

    // The loop no longer handles messages.
    w.process.deliver(Term::atom("late"));
    settle().await;

    assert!(collect.messages().is_empty());
    assert_eq!(rec.exit_count(), 1);
    assert_eq!(rec.sent.lock().len(), 1);
    assert_eq!(w.process.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn handler_panic_runs_exit_protocol_once() {
    let rec = Recording::new();
    let fragile = Fragile::default();
    let w = watched(&rec, ProcessOptions::active().handler(fragile.clone()));
    let pid = w.process.pid();

    w.process.deliver(Term::atom("a"));
    w.process.deliver(Term::atom("boom"));
    w.process.deliver(Term::atom("never"));

    eventually("crash handled", || rec.exit_count() == 1).await;
    settle().await;

    assert_eq!(*fragile.seen.lock(), vec![Term::atom("a")]);
    assert_eq!(*rec.exited.lock(), vec![(pid, Term::atom(UNHANDLED))]);
    assert_eq!(
        *rec.sent.lock(),
        vec![(pid, w.owner, down(w.reference, pid, UNHANDLED))]
    );
    assert_eq!(
        *rec.link_exits.lock(),
        vec![(pid, w.peer, Term::atom(UNHANDLED))]
    );
    assert_eq!(w.process.state(), LifecycleState::Terminated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_panic_on_multi_thread_runtime() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::active().handler(Fragile::default()));

    w.process.deliver(Term::atom("boom"));

    eventually("crash handled", || rec.exit_count() == 1).await;
    settle().await;
    assert_eq!(rec.exit_count(), 1);
    assert_eq!(rec.link_exits.lock().len(), 1);
}

#[tokio::test]
async fn destroy_exits_with_unhandled_exception() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::active());
    let pid = w.process.pid();
    settle().await;

    w.process.destroy();

    eventually("destroy handled", || rec.exit_count() == 1).await;
    settle().await;
    assert_eq!(*rec.exited.lock(), vec![(pid, Term::atom(UNHANDLED))]);
    assert_eq!(
        *rec.link_exits.lock(),
        vec![(pid, w.peer, Term::atom(UNHANDLED))]
    );
}

#[tokio::test]
async fn destroy_after_exit_changes_nothing() {
    let rec = Recording::new();
    let w = watched(&rec, ProcessOptions::active());
    settle().await;

    w.process.exit(None);
    w.process.handle_signals().await.unwrap();
    w.process.destroy();
    settle().await;

    assert_eq!(
        *rec.exited.lock(),
        vec![(w.process.pid(), Term::atom("normal"))]
    );
}

#[tokio::test]
async fn passive_process_drops_messages_once_exiting() {
    let rec = Recording::new();
    let collect = Collect::new();
    let p = Process::spawn(rec.registry(), ProcessOptions::passive().handler(collect.clone()))
        .unwrap();

    p.deliver(Term::atom("before"));
    p.exit(None);
    p.handle_signals().await.unwrap();
    p.deliver(Term::atom("after"));

    assert_eq!(collect.messages(), vec![Term::atom("before")]);
}
