//! Receive patterns.
//!
//! A [`Pattern`] is an ordered list of arms. Each arm has a predicate that
//! decides whether a message matches, and an action that turns the matched
//! message into the value handed back by `receive`. The first matching arm
//! wins.

use std::fmt;

use ember_common::Term;

type Predicate = Box<dyn Fn(&Term) -> bool + Send + Sync>;
type Action = Box<dyn Fn(Term) -> Term + Send + Sync>;

struct Arm {
    predicate: Predicate,
    /// `None` returns the message unchanged.
    action: Option<Action>,
}

/// A set of receive arms tested in order.
pub struct Pattern {
    arms: Vec<Arm>,
}

/// The arm that accepted a message. Call [`Matched::run`] to produce the
/// receive result.
pub struct Matched<'p> {
    arm: &'p Arm,
}

impl Pattern {
    /// A pattern with no arms. Matches nothing until arms are added.
    pub fn new() -> Self {
        Pattern { arms: Vec::new() }
    }

    /// Accepts every message and returns it unchanged.
    pub fn any() -> Self {
        Pattern::when(|_| true)
    }

    /// Single arm, identity action.
    pub fn when<P>(predicate: P) -> Self
    where
        P: Fn(&Term) -> bool + Send + Sync + 'static,
    {
        Pattern::new().or_when(predicate)
    }

    pub fn or_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Term) -> bool + Send + Sync + 'static,
    {
        self.arms.push(Arm {
            predicate: Box::new(predicate),
            action: None,
        });
        self
    }

    pub fn arm<P, A>(mut self, predicate: P, action: A) -> Self
    where
        P: Fn(&Term) -> bool + Send + Sync + 'static,
        A: Fn(Term) -> Term + Send + Sync + 'static,
    {
        self.arms.push(Arm {
            predicate: Box::new(predicate),
            action: Some(Box::new(action)),
        });
        self
    }

    /// Test `msg` against each arm in order.
    pub fn test(&self, msg: &Term) -> Option<Matched<'_>> {
        self.arms
            .iter()
            .find(|arm| (arm.predicate)(msg))
            .map(|arm| Matched { arm })
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::any()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("arms", &self.arms.len())
            .finish()
    }
}

impl Matched<'_> {
    pub fn run(self, msg: Term) -> Term {
        match &self.arm.action {
            Some(action) => action(msg),
            None => msg,
        }
    }
}
