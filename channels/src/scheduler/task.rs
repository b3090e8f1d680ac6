// src/scheduler/task.rs

//! Processes and the wakers that reschedule them.

use super::{RunQueue, Runnable};

use futures_util::future::LocalBoxFuture;
use futures_util::task::ArcWake;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessState {
  /// Being polled by the scheduler right now.
  Running,
  /// Parked on a channel or select, or queued for resumption.
  Suspended,
  Done,
}

/// Wakes a process by queueing its id on the owning scheduler.
///
/// Only ever enqueues; the process is polled later by the drain loop. `queued`
/// collapses repeated wakes between two polls into one queue entry.
pub(crate) struct ProcessWaker {
  id: u64,
  queue: Arc<RunQueue>,
  queued: AtomicBool,
}

impl ProcessWaker {
  pub(crate) fn new(id: u64, queue: Arc<RunQueue>) -> Self {
    ProcessWaker {
      id,
      queue,
      queued: AtomicBool::new(false),
    }
  }
}

impl ArcWake for ProcessWaker {
  fn wake_by_ref(arc_self: &Arc<Self>) {
    if !arc_self.queued.swap(true, Ordering::AcqRel) {
      arc_self.queue.push(Runnable::Resume(arc_self.id));
    }
  }
}

/// A spawned process body together with its scheduling state.
pub(crate) struct Process {
  id: u64,
  body: LocalBoxFuture<'static, ()>,
  waker: Arc<ProcessWaker>,
  state: ProcessState,
}

impl fmt::Debug for Process {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Process")
      .field("id", &self.id)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

impl Process {
  pub(crate) fn new(id: u64, body: LocalBoxFuture<'static, ()>, queue: Arc<RunQueue>) -> Self {
    Process {
      id,
      body,
      waker: Arc::new(ProcessWaker::new(id, queue)),
      state: ProcessState::Suspended,
    }
  }

  /// Marks the process as queued and enqueues its first resumption.
  pub(crate) fn schedule(&self) {
    ArcWake::wake_by_ref(&self.waker);
  }

  pub(crate) fn state(&self) -> ProcessState {
    self.state
  }

  /// Polls the body once. Runs until the body's next suspension point.
  pub(crate) fn resume(&mut self) -> ProcessState {
    // Cleared before polling so a wake during this poll queues another turn.
    self.waker.queued.store(false, Ordering::Release);
    self.state = ProcessState::Running;
    let waker = futures_util::task::waker(Arc::clone(&self.waker));
    let mut cx = Context::from_waker(&waker);
    self.state = match self.body.as_mut().poll(&mut cx) {
      Poll::Ready(()) => ProcessState::Done,
      Poll::Pending => ProcessState::Suspended,
    };
    self.state
  }
}
