// src/handler.rs

//! Registered channel operations.
//!
//! A [`Handler`] is what a channel keeps in its put or take queue while an
//! operation is parked: a continuation to call with the result, plus a
//! [`CommitFlag`]. Plain puts and takes get a flag of their own; every handler a
//! select registers shares one flag, which is how the select commits to exactly
//! one operand.
//!
//! Committing is a test-and-clear on the flag. Whoever clears it first owns the
//! continuation; everybody else sees an inactive handler. Channels never search
//! their queues to unlink stale handlers, they skip them when they reach them.
//!
//! When a select registers against a parked counterpart, both flags must clear
//! together or not at all. [`CommitFlag::commit_with`] locks the two cells in
//! address order and clears them as one step.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Boxed continuation of a parked operation.
pub(crate) type Resume<R> = Box<dyn FnOnce(R) + Send + 'static>;

/// Shared "still waiting" cell. `true` until the first commit.
#[derive(Clone)]
pub(crate) struct CommitFlag(Arc<Mutex<bool>>);

/// Outcome of committing two flags together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PairCommit {
  /// Both flags were active and are now cleared.
  Both,
  /// The calling flag was already cleared; the other is untouched.
  OwnStale,
  /// The other flag was already cleared; the calling flag is untouched.
  OtherStale,
}

impl fmt::Debug for CommitFlag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("CommitFlag").field(&self.is_active()).finish()
  }
}

impl CommitFlag {
  pub(crate) fn new() -> Self {
    CommitFlag(Arc::new(Mutex::new(true)))
  }

  #[inline]
  pub(crate) fn is_active(&self) -> bool {
    *self.0.lock()
  }

  /// Clears the flag. Returns `true` only for the caller that cleared it.
  #[inline]
  pub(crate) fn try_commit(&self) -> bool {
    std::mem::replace(&mut *self.0.lock(), false)
  }

  /// Clears this flag and `other` together, or neither.
  ///
  /// The two must be different cells.
  pub(crate) fn commit_with(&self, other: &CommitFlag) -> PairCommit {
    debug_assert!(!self.same_as(other), "a flag cannot be paired with itself");
    // Address order, so two threads pairing the same cells cannot deadlock.
    let own_first = Arc::as_ptr(&self.0) < Arc::as_ptr(&other.0);
    let (mut first, mut second) = if own_first {
      (self.0.lock(), other.0.lock())
    } else {
      (other.0.lock(), self.0.lock())
    };
    let (own, theirs) = if own_first {
      (&mut *first, &mut *second)
    } else {
      (&mut *second, &mut *first)
    };
    if !*own {
      return PairCommit::OwnStale;
    }
    if !*theirs {
      return PairCommit::OtherStale;
    }
    *own = false;
    *theirs = false;
    PairCommit::Both
  }

  /// Whether both flags are the same cell, i.e. belong to the same operation.
  #[inline]
  pub(crate) fn same_as(&self, other: &CommitFlag) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

/// A parked operation waiting for a result of type `R`.
pub(crate) struct Handler<R> {
  flag: CommitFlag,
  resume: Resume<R>,
}

impl<R> fmt::Debug for Handler<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Handler").field("flag", &self.flag).finish_non_exhaustive()
  }
}

impl<R> Handler<R> {
  /// A handler that shares `flag` with its siblings.
  pub(crate) fn new(flag: CommitFlag, resume: impl FnOnce(R) + Send + 'static) -> Self {
    Handler {
      flag,
      resume: Box::new(resume),
    }
  }

  #[inline]
  pub(crate) fn is_active(&self) -> bool {
    self.flag.is_active()
  }

  #[inline]
  pub(crate) fn flag(&self) -> &CommitFlag {
    &self.flag
  }

  /// Commits this handler. Returns the continuation if this call won the flag,
  /// `None` if a sibling (or a cancellation) got there first.
  pub(crate) fn commit(self) -> Option<Resume<R>> {
    if self.flag.try_commit() {
      Some(self.resume)
    } else {
      None
    }
  }

  /// The continuation of a handler whose flag was already cleared on its behalf
  /// by [`CommitFlag::commit_with`].
  pub(crate) fn into_resume(self) -> Resume<R> {
    self.resume
  }
}
