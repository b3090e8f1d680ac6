// src/chan/core.rs

//! The mutex-protected state of a channel and the algorithms that act on it.
//!
//! ### Design Principles:
//!
//! 1.  **One lock per channel**: the owning [`ChanShared`](super::ChanShared) wraps a
//!     [`ChannelCore`] in a `parking_lot::Mutex`. Every method here runs with that
//!     lock held and never calls user code.
//! 2.  **Counterparts before storage**: a put first looks for a parked take, then
//!     for buffer room, and only then parks. A take drains the buffer first (and
//!     refills it from the oldest parked put), then takes from a parked put, then
//!     reports `Closed`. The put and take queues are therefore never live at the
//!     same time, and parked puts only exist while the buffer is full.
//! 3.  **Deferred continuations**: matching a parked handler commits it here but
//!     only records its continuation in a [`Wakeups`] list. The caller runs that
//!     list after releasing the lock.
//! 4.  **Lazy invalidation**: handlers whose commit flag was cleared elsewhere stay
//!     queued until a scan reaches them, and are then dropped. Every `MAX_DIRTY`
//!     parks on one side the whole queue is purged, which bounds the dead weight.

use super::Taken;
use crate::buffer::{Buffer, BufferPolicy};
use crate::handler::{CommitFlag, Handler, PairCommit, Resume};

use std::collections::VecDeque;
use std::fmt;

/// Parks allowed on one side of a channel between two purges of stale handlers.
pub(crate) const MAX_DIRTY: usize = 64;

/// Continuations released by channel operations, run after the lock is dropped.
#[must_use = "released continuations must be fired"]
pub(crate) struct Wakeups(Vec<Box<dyn FnOnce() + Send + 'static>>);

impl Wakeups {
  pub(crate) fn new() -> Self {
    Wakeups(Vec::new())
  }

  fn push<R: Send + 'static>(&mut self, resume: Resume<R>, result: R) {
    self.0.push(Box::new(move || resume(result)));
  }

  pub(crate) fn len(&self) -> usize {
    self.0.len()
  }

  /// Runs every continuation in release order.
  pub(crate) fn fire(self) {
    for wakeup in self.0 {
      wakeup();
    }
  }
}

/// Result of matching a select registration against a parked counterpart.
enum Paired<R> {
  Matched(R),
  /// A sibling of the registering handler committed first.
  OwnStale,
  Unmatched,
}

/// A parked put: the value waiting to be delivered and who to tell.
struct PendingPut<T> {
  value: T,
  handler: Handler<bool>,
}

pub(crate) struct ChannelCore<T> {
  buf: Option<Buffer<T>>,
  puts: VecDeque<PendingPut<T>>,
  takes: VecDeque<Handler<Taken<T>>>,
  dirty_puts: usize,
  dirty_takes: usize,
  closed: bool,
}

impl<T> fmt::Debug for ChannelCore<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelCore")
      .field("buf", &self.buf)
      .field("puts", &self.puts.len())
      .field("takes", &self.takes.len())
      .field("closed", &self.closed)
      .finish()
  }
}

impl<T> ChannelCore<T> {
  pub(crate) fn new(buf: Option<Buffer<T>>) -> Self {
    ChannelCore {
      buf,
      puts: VecDeque::new(),
      takes: VecDeque::new(),
      dirty_puts: 0,
      dirty_takes: 0,
      closed: false,
    }
  }

  // --- Queries ---

  #[inline]
  pub(crate) fn is_closed(&self) -> bool {
    self.closed
  }

  /// Number of buffered values.
  pub(crate) fn len(&self) -> usize {
    self.buf.as_ref().map_or(0, Buffer::len)
  }

  pub(crate) fn capacity(&self) -> usize {
    self.buf.as_ref().map_or(0, Buffer::capacity)
  }

  pub(crate) fn policy(&self) -> Option<BufferPolicy> {
    self.buf.as_ref().map(Buffer::policy)
  }

  /// Parked puts that can still be matched.
  pub(crate) fn pending_puts(&self) -> usize {
    self.puts.iter().filter(|p| p.handler.is_active()).count()
  }

  /// Parked takes that can still be matched.
  pub(crate) fn pending_takes(&self) -> usize {
    self.takes.iter().filter(|h| h.is_active()).count()
  }

  /// Raw queue lengths `(puts, takes)`, stale entries included.
  #[cfg(test)]
  pub(crate) fn queued(&self) -> (usize, usize) {
    (self.puts.len(), self.takes.len())
  }

  fn has_buffered(&self) -> bool {
    self.buf.as_ref().is_some_and(|buf| !buf.is_empty())
  }

  fn has_room(&self) -> bool {
    self.buf.as_ref().is_some_and(|buf| !buf.is_full())
  }
}

impl<T: Send + 'static> ChannelCore<T> {
  // --- Matching ---

  /// Pops and commits the oldest live parked take.
  fn commit_taker(&mut self) -> Option<Resume<Taken<T>>> {
    while let Some(handler) = self.takes.pop_front() {
      if let Some(resume) = handler.commit() {
        return Some(resume);
      }
    }
    None
  }

  /// Pops and commits the oldest live parked put, returning its value.
  fn commit_putter(&mut self) -> Option<(T, Resume<bool>)> {
    while let Some(PendingPut { value, handler }) = self.puts.pop_front() {
      if let Some(resume) = handler.commit() {
        return Some((value, resume));
      }
    }
    None
  }

  /// Pops the oldest live parked take and commits it together with `own`.
  /// Entries sharing `own` are left in place: an operation never matches itself.
  fn pair_taker(&mut self, own: &CommitFlag) -> Paired<Resume<Taken<T>>> {
    let mut i = 0;
    while i < self.takes.len() {
      let taker = &self.takes[i];
      if taker.flag().same_as(own) {
        i += 1;
        continue;
      }
      match own.commit_with(taker.flag()) {
        PairCommit::Both => {
          return self.takes.remove(i).map_or(Paired::Unmatched, |h| Paired::Matched(h.into_resume()));
        }
        PairCommit::OwnStale => return Paired::OwnStale,
        // Dropped, and `i` now points at its successor.
        PairCommit::OtherStale => {
          let _ = self.takes.remove(i);
        }
      }
    }
    Paired::Unmatched
  }

  /// Pops the oldest live parked put and commits it together with `own`.
  fn pair_putter(&mut self, own: &CommitFlag) -> Paired<(T, Resume<bool>)> {
    let mut i = 0;
    while i < self.puts.len() {
      let putter = &self.puts[i].handler;
      if putter.flag().same_as(own) {
        i += 1;
        continue;
      }
      match own.commit_with(putter.flag()) {
        PairCommit::Both => {
          return self
            .puts
            .remove(i)
            .map_or(Paired::Unmatched, |p| Paired::Matched((p.value, p.handler.into_resume())));
        }
        PairCommit::OwnStale => return Paired::OwnStale,
        PairCommit::OtherStale => {
          let _ = self.puts.remove(i);
        }
      }
    }
    Paired::Unmatched
  }

  // --- Immediate operations (never park) ---

  /// Completes a put without parking if a take is waiting, the buffer has room or
  /// the channel is closed (`Ok(false)`). Hands the value back otherwise.
  pub(crate) fn put_now(&mut self, value: T, wakeups: &mut Wakeups) -> Result<bool, T> {
    if self.closed {
      return Ok(false);
    }
    if let Some(resume) = self.commit_taker() {
      wakeups.push(resume, Taken::Value(value));
      return Ok(true);
    }
    match self.buf.as_mut() {
      Some(buf) if !buf.is_full() => {
        buf.add(value);
        Ok(true)
      }
      _ => Err(value),
    }
  }

  /// Completes a take without parking if a value is buffered, a put is waiting
  /// or the channel is closed (`Taken::Closed`).
  pub(crate) fn take_now(&mut self, wakeups: &mut Wakeups) -> Option<Taken<T>> {
    if let Some(value) = self.buf.as_mut().and_then(Buffer::remove) {
      // The removal freed exactly one slot; let the oldest parked put have it.
      if let Some((pending, resume)) = self.commit_putter() {
        if let Some(buf) = self.buf.as_mut() {
          buf.add(pending);
        }
        wakeups.push(resume, true);
      }
      return Some(Taken::Value(value));
    }
    if let Some((value, resume)) = self.commit_putter() {
      wakeups.push(resume, true);
      return Some(Taken::Value(value));
    }
    if self.closed {
      return Some(Taken::Closed);
    }
    None
  }

  // --- Parking ---

  /// Queues a put that could not complete immediately.
  pub(crate) fn park_put(&mut self, value: T, handler: Handler<bool>) {
    if self.dirty_puts > MAX_DIRTY {
      self.puts.retain(|p| p.handler.is_active());
      self.dirty_puts = 0;
    } else {
      self.dirty_puts += 1;
    }
    self.puts.push_back(PendingPut { value, handler });
  }

  /// Queues a take that could not complete immediately.
  pub(crate) fn park_take(&mut self, handler: Handler<Taken<T>>) {
    if self.dirty_takes > MAX_DIRTY {
      self.takes.retain(Handler::is_active);
      self.dirty_takes = 0;
    } else {
      self.dirty_takes += 1;
    }
    self.takes.push_back(handler);
  }

  // --- Registration on behalf of a shared flag (select) ---

  /// Completes the put now, committing `handler`, or parks it.
  ///
  /// Returns `Some(result)` for an immediate completion and `None` when the
  /// handler was parked or was already stale (a sibling committed first). A
  /// stale handler consumes nothing: it is committed before any value moves,
  /// and against a parked take both flags clear in one step.
  pub(crate) fn put(&mut self, value: T, handler: Handler<bool>, wakeups: &mut Wakeups) -> Option<bool> {
    if self.closed {
      return handler.commit().map(|_| false);
    }
    match self.pair_taker(handler.flag()) {
      Paired::Matched(resume) => {
        wakeups.push(resume, Taken::Value(value));
        return Some(true);
      }
      Paired::OwnStale => return None,
      Paired::Unmatched => {}
    }
    if self.has_room() {
      handler.commit()?;
      if let Some(buf) = self.buf.as_mut() {
        buf.add(value);
      }
      return Some(true);
    }
    self.park_put(value, handler);
    None
  }

  /// Completes the take now, committing `handler`, or parks it.
  pub(crate) fn take(&mut self, handler: Handler<Taken<T>>, wakeups: &mut Wakeups) -> Option<Taken<T>> {
    if self.has_buffered() {
      handler.commit()?;
      return self.take_now(wakeups);
    }
    match self.pair_putter(handler.flag()) {
      Paired::Matched((value, resume)) => {
        wakeups.push(resume, true);
        return Some(Taken::Value(value));
      }
      Paired::OwnStale => return None,
      Paired::Unmatched => {}
    }
    if self.closed {
      return handler.commit().map(|_| Taken::Closed);
    }
    self.park_take(handler);
    None
  }

  // --- Close ---

  /// Marks the channel closed and releases every live parked operation: puts
  /// resolve `false`, takes resolve `Taken::Closed`, each in queue order.
  ///
  /// Returns `false` if the channel was already closed.
  pub(crate) fn close(&mut self, wakeups: &mut Wakeups) -> bool {
    if self.closed {
      return false;
    }
    self.closed = true;
    for PendingPut { handler, .. } in self.puts.drain(..) {
      if let Some(resume) = handler.commit() {
        wakeups.push(resume, false);
      }
    }
    for handler in self.takes.drain(..) {
      if let Some(resume) = handler.commit() {
        wakeups.push(resume, Taken::Closed);
      }
    }
    self.dirty_puts = 0;
    self.dirty_takes = 0;
    true
  }
}
