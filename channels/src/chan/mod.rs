// src/chan/mod.rs

//! CSP channels: rendezvous or buffered, shared by any number of processes.
//!
//! A [`Chan`] is a single cloneable handle; there is no sender/receiver split and
//! any holder may put, take or close. Every clone refers to the same channel and
//! channels compare equal by identity.
//!
//! Operations come in three flavours:
//!
//! - **Suspending**: [`Chan::put`] and [`Chan::take`] return futures. Awaited inside
//!   a process (see [`go`](crate::go)) they complete immediately when they can and
//!   otherwise park the process until a counterpart or `close` arrives.
//! - **Non-suspending**: [`Chan::offer`] and [`Chan::poll`] only succeed when the
//!   operation can complete right now, and never leave anything behind.
//! - **Callback**: [`Chan::put_async`] and [`Chan::take_async`] can be used outside
//!   any process. An immediate result calls the callback before returning; a
//!   deferred one runs it from the scheduler's run queue.
//!
//! # Examples
//!
//! ```
//! use fibre_csp::{go, Chan, Taken};
//!
//! let ch = Chan::<i32>::buffered(2);
//! assert!(ch.offer(42).is_ok());
//! assert!(ch.offer(43).is_ok());
//! assert!(ch.offer(44).is_err()); // full
//! assert_eq!(ch.poll(), Some(42));
//! assert_eq!(ch.poll(), Some(43));
//! assert_eq!(ch.poll(), None); // NO_VALUE
//!
//! let ping = Chan::new();
//! let pong = ping.clone();
//! let out = go(async move { pong.take().await });
//! assert!(ch.is_empty());
//! fibre_csp::run(async move {
//!   assert!(ping.put("hello").await);
//!   assert_eq!(out.take().await, Taken::Value(Ok(Taken::Value("hello"))));
//! });
//! ```

mod async_impl;
pub(crate) mod core;

pub use async_impl::{PutFuture, TakeFuture};

use self::core::{ChannelCore, Wakeups};
use crate::buffer::{Buffer, BufferPolicy};
use crate::error::TrySendError;
use crate::handler::{CommitFlag, Handler};
use crate::scheduler::{self, Runnable};
use crate::telemetry;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// The outcome of a take: a value, or the CLOSED sentinel.
///
/// `Closed` is only produced once the channel is closed *and* drained, so it can
/// never be confused with a value that was put, whatever `T` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Taken<T> {
  /// A value put on the channel.
  Value(T),
  /// The channel is closed and nothing is left to take.
  Closed,
}

impl<T> Taken<T> {
  /// Returns `true` for the CLOSED sentinel.
  #[inline]
  pub fn is_closed(&self) -> bool {
    matches!(self, Taken::Closed)
  }

  /// Converts into `Option<T>`, mapping `Closed` to `None`.
  #[inline]
  pub fn into_value(self) -> Option<T> {
    match self {
      Taken::Value(v) => Some(v),
      Taken::Closed => None,
    }
  }

  /// Borrows the value, if any.
  #[inline]
  pub fn as_value(&self) -> Option<&T> {
    match self {
      Taken::Value(v) => Some(v),
      Taken::Closed => None,
    }
  }
}

impl<T> From<Taken<T>> for Option<T> {
  fn from(taken: Taken<T>) -> Self {
    taken.into_value()
  }
}

pub(crate) struct ChanShared<T> {
  pub(crate) id: u64,
  pub(crate) core: Mutex<ChannelCore<T>>,
}

/// A CSP channel handle.
///
/// Cloning is cheap and yields another handle to the same channel. The channel is
/// freed when the last handle (including those held by parked operations and
/// timers) is dropped.
pub struct Chan<T> {
  pub(crate) shared: Arc<ChanShared<T>>,
}

impl<T> Clone for Chan<T> {
  fn clone(&self) -> Self {
    Chan {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> PartialEq for Chan<T> {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.shared, &other.shared)
  }
}

impl<T> Eq for Chan<T> {}

impl<T> fmt::Debug for Chan<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let core = self.shared.core.lock();
    f.debug_struct("Chan")
      .field("id", &self.shared.id)
      .field("len", &core.len())
      .field("capacity", &core.capacity())
      .field("closed", &core.is_closed())
      .finish()
  }
}

impl<T: Send + 'static> Default for Chan<T> {
  fn default() -> Self {
    Self::new()
  }
}

/// Creates a channel. A `capacity` of `0` makes a rendezvous channel, anything
/// larger a fixed-size FIFO buffer.
pub fn chan<T: Send + 'static>(capacity: usize) -> Chan<T> {
  Chan::buffered(capacity)
}

impl<T: Send + 'static> Chan<T> {
  // --- Constructors ---

  /// Creates an unbuffered (rendezvous) channel: a put completes only when a take
  /// meets it.
  pub fn new() -> Self {
    Self::from_buffer(None)
  }

  /// Creates a channel with a fixed FIFO buffer of `capacity` values. Puts park
  /// once the buffer is full. `0` is the same as [`Chan::new`].
  pub fn buffered(capacity: usize) -> Self {
    if capacity == 0 {
      Self::new()
    } else {
      Self::from_buffer(Some(Buffer::new(capacity, BufferPolicy::Fixed)))
    }
  }

  /// Creates a channel whose buffer discards new values while full. Puts never park.
  ///
  /// # Panics
  ///
  /// Panics if `capacity` is `0`.
  pub fn dropping(capacity: usize) -> Self {
    assert!(capacity > 0, "a dropping buffer needs a capacity of at least 1");
    Self::from_buffer(Some(Buffer::new(capacity, BufferPolicy::Dropping)))
  }

  /// Creates a channel whose buffer evicts its oldest value while full. Puts never park.
  ///
  /// # Panics
  ///
  /// Panics if `capacity` is `0`.
  pub fn sliding(capacity: usize) -> Self {
    assert!(capacity > 0, "a sliding buffer needs a capacity of at least 1");
    Self::from_buffer(Some(Buffer::new(capacity, BufferPolicy::Sliding)))
  }

  fn from_buffer(buf: Option<Buffer<T>>) -> Self {
    Chan {
      shared: Arc::new(ChanShared {
        id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
        core: Mutex::new(ChannelCore::new(buf)),
      }),
    }
  }

  // --- Suspending operations ---

  /// Puts `value` on the channel.
  ///
  /// Resolves to `true` once a take has received the value or it has been
  /// buffered, and to `false` if the channel was or became closed first (the
  /// value is then dropped).
  pub fn put(&self, value: T) -> PutFuture<T> {
    PutFuture::new(self.clone(), value)
  }

  /// Takes a value from the channel, or [`Taken::Closed`] once it is closed and
  /// drained.
  pub fn take(&self) -> TakeFuture<T> {
    TakeFuture::new(self.clone())
  }

  // --- Non-suspending operations ---

  /// Puts `value` only if that can complete right now, i.e. a take is parked or
  /// the buffer has room.
  ///
  /// # Errors
  ///
  /// - `Err(TrySendError::Full(value))` if the put would have to park.
  /// - `Err(TrySendError::Closed(value))` if the channel is closed.
  pub fn offer(&self, value: T) -> Result<(), TrySendError<T>> {
    let mut wakeups = Wakeups::new();
    let result = {
      let mut core = self.shared.core.lock();
      if core.is_closed() {
        Err(TrySendError::Closed(value))
      } else {
        core.put_now(value, &mut wakeups).map(|_| ()).map_err(TrySendError::Full)
      }
    };
    wakeups.fire();
    scheduler::drain();
    result
  }

  /// Takes a value only if one is available right now, from the buffer or a
  /// parked put. `None` is the NO_VALUE outcome.
  ///
  /// A closed channel still yields its buffered values, then `None` (never
  /// [`Taken::Closed`]).
  pub fn poll(&self) -> Option<T> {
    let mut wakeups = Wakeups::new();
    let taken = self.shared.core.lock().take_now(&mut wakeups);
    wakeups.fire();
    scheduler::drain();
    taken.and_then(Taken::into_value)
  }

  // --- Callback operations ---

  /// Puts `value` without suspending the caller; `on_complete` receives what
  /// [`Chan::put`] would have resolved to.
  pub fn put_async<F>(&self, value: T, on_complete: F)
  where
    F: FnOnce(bool) + Send + 'static,
  {
    let mut wakeups = Wakeups::new();
    let mut callback = Some(on_complete);
    let immediate = {
      let mut core = self.shared.core.lock();
      match core.put_now(value, &mut wakeups) {
        Ok(delivered) => Some(delivered),
        Err(value) => {
          if let Some(callback) = callback.take() {
            let queue = scheduler::local_queue();
            let handler = Handler::new(CommitFlag::new(), move |delivered| {
              queue.push(Runnable::Call(Box::new(move || callback(delivered))));
            });
            core.park_put(value, handler);
            telemetry::log_event(Some(self.shared.id), "chan::put_async", "Park", None);
          }
          None
        }
      }
    };
    wakeups.fire();
    if let (Some(delivered), Some(callback)) = (immediate, callback) {
      callback(delivered);
    }
    scheduler::drain();
  }

  /// Takes a value without suspending the caller; `on_complete` receives what
  /// [`Chan::take`] would have resolved to.
  pub fn take_async<F>(&self, on_complete: F)
  where
    F: FnOnce(Taken<T>) + Send + 'static,
  {
    let mut wakeups = Wakeups::new();
    let mut callback = Some(on_complete);
    let immediate = {
      let mut core = self.shared.core.lock();
      let taken = core.take_now(&mut wakeups);
      if taken.is_none() {
        if let Some(callback) = callback.take() {
          let queue = scheduler::local_queue();
          let handler = Handler::new(CommitFlag::new(), move |taken| {
            queue.push(Runnable::Call(Box::new(move || callback(taken))));
          });
          core.park_take(handler);
          telemetry::log_event(Some(self.shared.id), "chan::take_async", "Park", None);
        }
      }
      taken
    };
    wakeups.fire();
    if let (Some(taken), Some(callback)) = (immediate, callback) {
      callback(taken);
    }
    scheduler::drain();
  }

  // --- Lifecycle & introspection ---

  /// Closes the channel. Idempotent.
  ///
  /// Every parked put resolves `false` and every parked take resolves
  /// [`Taken::Closed`], each side in the order it parked. Buffered values stay
  /// available to later takes.
  pub fn close(&self) {
    let mut wakeups = Wakeups::new();
    let newly_closed = self.shared.core.lock().close(&mut wakeups);
    if newly_closed {
      tracing::debug!(channel = self.shared.id, flushed = wakeups.len(), "channel closed");
      telemetry::log_event(Some(self.shared.id), "chan::close", "Close", None);
    }
    wakeups.fire();
    scheduler::drain();
  }

  /// Returns `true` once [`Chan::close`] has been called.
  pub fn is_closed(&self) -> bool {
    self.shared.core.lock().is_closed()
  }

  /// Process-unique identifier of this channel, shared by all its clones.
  #[inline]
  pub fn id(&self) -> u64 {
    self.shared.id
  }

  /// Returns `true` if both handles refer to the same channel.
  #[inline]
  pub fn same_channel(&self, other: &Chan<T>) -> bool {
    self == other
  }

  /// Number of values currently buffered. Always `0` for rendezvous channels.
  pub fn len(&self) -> usize {
    self.shared.core.lock().len()
  }

  /// Returns `true` if no values are buffered.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Buffer capacity; `0` for rendezvous channels.
  pub fn capacity(&self) -> usize {
    self.shared.core.lock().capacity()
  }

  /// The buffer policy, `None` for rendezvous channels.
  pub fn buffer_policy(&self) -> Option<BufferPolicy> {
    self.shared.core.lock().policy()
  }

  /// Number of parked puts that can still complete.
  pub fn pending_puts(&self) -> usize {
    self.shared.core.lock().pending_puts()
  }

  /// Number of parked takes that can still complete.
  pub fn pending_takes(&self) -> usize {
    self.shared.core.lock().pending_takes()
  }
}
