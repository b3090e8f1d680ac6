// src/scheduler/timer.rs

//! Timeout channels and the deadline heap that closes them.

use super::schedule_timer;
use crate::chan::Chan;

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::time::{Duration, Instant};

type TimerAction = Box<dyn FnOnce() + 'static>;

struct TimerEntry {
  deadline: Instant,
  // Insertion order; timers with equal deadlines fire first-in first-out.
  seq: u64,
  action: TimerAction,
}

impl PartialEq for TimerEntry {
  fn eq(&self, other: &Self) -> bool {
    self.deadline == other.deadline && self.seq == other.seq
  }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for TimerEntry {
  fn cmp(&self, other: &Self) -> Ordering {
    self.deadline.cmp(&other.deadline).then(self.seq.cmp(&other.seq))
  }
}

/// Pending timers of one scheduler, earliest deadline first.
#[derive(Default)]
pub(crate) struct Timers {
  heap: BinaryHeap<Reverse<TimerEntry>>,
  next_seq: u64,
}

impl fmt::Debug for Timers {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Timers")
      .field("pending", &self.heap.len())
      .field("next_deadline", &self.next_deadline())
      .finish()
  }
}

impl Timers {
  pub(crate) fn insert(&mut self, deadline: Instant, action: TimerAction) {
    let seq = self.next_seq;
    self.next_seq += 1;
    self.heap.push(Reverse(TimerEntry { deadline, seq, action }));
  }

  pub(crate) fn next_deadline(&self) -> Option<Instant> {
    self.heap.peek().map(|Reverse(entry)| entry.deadline)
  }

  pub(crate) fn len(&self) -> usize {
    self.heap.len()
  }

  /// Removes every timer due at `now`, in deadline order.
  pub(crate) fn take_due(&mut self, now: Instant) -> Vec<TimerAction> {
    let mut due = Vec::new();
    while self.heap.peek().is_some_and(|Reverse(entry)| entry.deadline <= now) {
      if let Some(Reverse(entry)) = self.heap.pop() {
        due.push(entry.action);
      }
    }
    due
  }
}

/// Returns a channel that closes after `duration`.
///
/// Nothing is ever put on it, so a take (or a select operand) on it resolves to
/// [`Taken::Closed`](crate::Taken::Closed) once the delay has elapsed. The timer is
/// driven by the calling thread's scheduler: it fires while [`run`](crate::run) is
/// waiting, or at the next scheduler entry point after the deadline.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fibre_csp::{alts, timeout, Chan, Chosen, Op};
///
/// let never = Chan::<u8>::new();
/// let selected = fibre_csp::run(async move {
///   alts([Op::Take(never), Op::Take(timeout(Duration::from_millis(5)))], Default::default()).await
/// });
/// assert!(matches!(selected.channel, Chosen::Operand { index: 1, .. }));
/// ```
pub fn timeout<T: Send + 'static>(duration: Duration) -> Chan<T> {
  let ch = Chan::new();
  let closer = ch.clone();
  schedule_timer(Instant::now() + duration, Box::new(move || closer.close()));
  ch
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::rc::Rc;

  #[test]
  fn due_timers_fire_in_deadline_order() {
    let fired = Rc::new(RefCell::new(Vec::new()));
    let mut timers = Timers::default();
    let base = Instant::now();
    for (label, offset) in [("late", 30), ("early", 10), ("tie-a", 20), ("tie-b", 20)] {
      let fired = fired.clone();
      timers.insert(base + Duration::from_millis(offset), Box::new(move || fired.borrow_mut().push(label)));
    }

    assert_eq!(timers.next_deadline(), Some(base + Duration::from_millis(10)));
    for action in timers.take_due(base + Duration::from_millis(20)) {
      action();
    }
    assert_eq!(*fired.borrow(), vec!["early", "tie-a", "tie-b"]);
    assert_eq!(timers.len(), 1);
    assert!(timers.take_due(base).is_empty());
  }
}
