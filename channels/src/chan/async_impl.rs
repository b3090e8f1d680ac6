// src/chan/async_impl.rs

//! The suspending put and take futures.

use super::core::Wakeups;
use super::{Chan, Taken};
use crate::async_util::Slot;
use crate::handler::{CommitFlag, Handler};
use crate::telemetry;

use futures_core::future::FusedFuture;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

// Shared by both futures: before the first poll the operation has not touched the
// channel; once parked, the handler owns a clone of `slot` and fills it exactly
// once; `Done` is terminal.
enum OpState<I, R> {
  Init(I),
  Parked { slot: Arc<Slot<R>>, flag: CommitFlag },
  Done,
}

impl<I, R> OpState<I, R> {
  fn name(&self) -> &'static str {
    match self {
      OpState::Init(_) => "Init",
      OpState::Parked { .. } => "Parked",
      OpState::Done => "Done",
    }
  }

  fn poll_parked(&mut self, cx: &mut Context<'_>) -> Poll<R> {
    let polled = match self {
      OpState::Parked { slot, .. } => slot.poll_take(cx),
      _ => return Poll::Pending,
    };
    if polled.is_ready() {
      *self = OpState::Done;
    }
    polled
  }

  /// Clears the commit flag of a parked operation so the channel skips it.
  fn cancel(&mut self) {
    if let OpState::Parked { flag, .. } = self {
      flag.try_commit();
    }
  }
}

fn parked_slot<R: Send + 'static>() -> (Arc<Slot<R>>, CommitFlag, Handler<R>) {
  let slot = Arc::new(Slot::new());
  let flag = CommitFlag::new();
  let filler = Arc::clone(&slot);
  let handler = Handler::new(flag.clone(), move |result| filler.fill(result));
  (slot, flag, handler)
}

// --- PutFuture ---

/// A future that resolves to `true` once its value has been handed to a take or
/// buffered, and to `false` if the channel closed first.
///
/// Dropping the future while it is parked withdraws the put; the value is then
/// dropped by the channel.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct PutFuture<T> {
  chan: Chan<T>,
  state: OpState<T, bool>,
}

impl<T> Unpin for PutFuture<T> {}

impl<T> fmt::Debug for PutFuture<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PutFuture")
      .field("channel", &self.chan.shared.id)
      .field("state", &self.state.name())
      .finish()
  }
}

impl<T: Send + 'static> PutFuture<T> {
  pub(super) fn new(chan: Chan<T>, value: T) -> Self {
    PutFuture {
      chan,
      state: OpState::Init(value),
    }
  }
}

impl<T: Send + 'static> Future for PutFuture<T> {
  type Output = bool;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    let value = match mem::replace(&mut this.state, OpState::Done) {
      OpState::Init(value) => value,
      parked @ OpState::Parked { .. } => {
        this.state = parked;
        return this.state.poll_parked(cx);
      }
      OpState::Done => panic!("PutFuture polled after completion"),
    };

    let mut wakeups = Wakeups::new();
    let immediate = {
      let mut core = this.chan.shared.core.lock();
      match core.put_now(value, &mut wakeups) {
        Ok(delivered) => Some(delivered),
        Err(value) => {
          let (slot, flag, handler) = parked_slot();
          core.park_put(value, handler);
          this.state = OpState::Parked { slot, flag };
          None
        }
      }
    };
    wakeups.fire();

    match immediate {
      Some(delivered) => Poll::Ready(delivered),
      None => {
        tracing::trace!(channel = this.chan.shared.id, "put parked");
        telemetry::log_event(Some(this.chan.shared.id), "chan::put", "Park", None);
        this.state.poll_parked(cx)
      }
    }
  }
}

impl<T: Send + 'static> FusedFuture for PutFuture<T> {
  fn is_terminated(&self) -> bool {
    matches!(self.state, OpState::Done)
  }
}

impl<T> Drop for PutFuture<T> {
  fn drop(&mut self) {
    self.state.cancel();
  }
}

// --- TakeFuture ---

/// A future that resolves to the next value of the channel, or to
/// [`Taken::Closed`] once the channel is closed and drained.
///
/// Dropping the future while it is parked withdraws the take.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct TakeFuture<T> {
  chan: Chan<T>,
  state: OpState<(), Taken<T>>,
}

impl<T> Unpin for TakeFuture<T> {}

impl<T> fmt::Debug for TakeFuture<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TakeFuture")
      .field("channel", &self.chan.shared.id)
      .field("state", &self.state.name())
      .finish()
  }
}

impl<T: Send + 'static> TakeFuture<T> {
  pub(super) fn new(chan: Chan<T>) -> Self {
    TakeFuture {
      chan,
      state: OpState::Init(()),
    }
  }
}

impl<T: Send + 'static> Future for TakeFuture<T> {
  type Output = Taken<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    match mem::replace(&mut this.state, OpState::Done) {
      OpState::Init(()) => {}
      parked @ OpState::Parked { .. } => {
        this.state = parked;
        return this.state.poll_parked(cx);
      }
      OpState::Done => panic!("TakeFuture polled after completion"),
    }

    let mut wakeups = Wakeups::new();
    let immediate = {
      let mut core = this.chan.shared.core.lock();
      let taken = core.take_now(&mut wakeups);
      if taken.is_none() {
        let (slot, flag, handler) = parked_slot();
        core.park_take(handler);
        this.state = OpState::Parked { slot, flag };
      }
      taken
    };
    wakeups.fire();

    match immediate {
      Some(taken) => Poll::Ready(taken),
      None => {
        tracing::trace!(channel = this.chan.shared.id, "take parked");
        telemetry::log_event(Some(this.chan.shared.id), "chan::take", "Park", None);
        this.state.poll_parked(cx)
      }
    }
  }
}

impl<T: Send + 'static> FusedFuture for TakeFuture<T> {
  fn is_terminated(&self) -> bool {
    matches!(self.state, OpState::Done)
  }
}

impl<T> Drop for TakeFuture<T> {
  fn drop(&mut self) {
    self.state.cancel();
  }
}
