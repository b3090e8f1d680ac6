//! Result slots shared between a parked future and the handler that completes it.

// Re-export AtomicWaker from futures-util for internal crate use.
pub(crate) use futures_util::task::AtomicWaker;

use parking_lot::Mutex;
use std::fmt;
use std::task::{Context, Poll};

/// A one-shot cell a handler continuation fills and a future polls.
///
/// `fill` stores the value and wakes whoever registered last, which for a process
/// means pushing it back onto the scheduler's run queue. Nothing runs inline.
pub(crate) struct Slot<R> {
  value: Mutex<Option<R>>,
  waker: AtomicWaker,
}

impl<R> fmt::Debug for Slot<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Slot")
      .field("filled", &self.value.lock().is_some())
      .finish()
  }
}

impl<R> Slot<R> {
  pub(crate) fn new() -> Self {
    Slot {
      value: Mutex::new(None),
      waker: AtomicWaker::new(),
    }
  }

  pub(crate) fn fill(&self, value: R) {
    *self.value.lock() = Some(value);
    self.waker.wake();
  }

  pub(crate) fn poll_take(&self, cx: &mut Context<'_>) -> Poll<R> {
    if let Some(value) = self.value.lock().take() {
      return Poll::Ready(value);
    }
    self.waker.register(cx.waker());
    // Re-check: the value may have landed between the first check and registering.
    match self.value.lock().take() {
      Some(value) => Poll::Ready(value),
      None => Poll::Pending,
    }
  }
}
