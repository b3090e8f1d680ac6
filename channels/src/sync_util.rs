//! Thread parking for the scheduler's idle loop.
//!
//! A scheduler that has nothing runnable parks its thread until the next timer
//! deadline, or indefinitely when no timer is pending. Wakers unpark it, which is
//! how a wake-up coming from another thread reaches the owning run loop.

use std::thread::{self, Thread};
use std::time::Instant;

/// Parks the current thread until `deadline`, or until unparked when `None`.
///
/// Returns immediately if the deadline has already passed. Spurious returns are
/// possible; callers loop.
pub(crate) fn park_until(deadline: Option<Instant>) {
  match deadline {
    Some(deadline) => {
      let now = Instant::now();
      if deadline > now {
        thread::park_timeout(deadline - now);
      }
    }
    None => thread::park(),
  }
}

/// Unparks the given thread.
#[inline]
pub(crate) fn unpark_thread(thread: &Thread) {
  thread.unpark();
}
