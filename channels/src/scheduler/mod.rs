// src/scheduler/mod.rs

//! The cooperative, per-thread process scheduler.
//!
//! ### Design Principles:
//!
//! 1.  **Wakers only enqueue**: a process that is woken (because a channel handed
//!     it a result) is pushed onto its scheduler's run queue. Nothing is ever
//!     resumed from inside a channel operation.
//! 2.  **One trampoline per thread**: the outermost scheduler entry point runs the
//!     drain loop, which pops and resumes queued work until the queue is empty.
//!     Entry points reached from inside that loop only enqueue. The stack depth is
//!     therefore constant no matter how long a chain of immediate operations is.
//! 3.  **Thread-local ownership**: process bodies need not be `Send`. Each thread
//!     has its own scheduler; only the run queue is shared (wakers may fire on
//!     other threads, which then unpark the owning thread).

pub(crate) mod task;
pub(crate) mod timer;

use self::task::{Process, ProcessState};
use self::timer::Timers;
use crate::sync_util::{park_until, unpark_thread};
use crate::telemetry;

use futures_util::future::LocalBoxFuture;
use parking_lot::Mutex;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::Instant;

static NEXT_PROCESS_ID: AtomicU64 = AtomicU64::new(1);

/// Runnables executed between two timer checks while the run queue is busy.
const TIMER_CHECK_INTERVAL: usize = 64;

/// A unit of work on the run queue.
pub(crate) enum Runnable {
  /// Poll the process with this id.
  Resume(u64),
  /// Run a deferred callback (from `put_async`, `take_async` or `alts_async`).
  Call(Box<dyn FnOnce() + Send + 'static>),
}

impl fmt::Debug for Runnable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Runnable::Resume(id) => f.debug_tuple("Resume").field(id).finish(),
      Runnable::Call(_) => f.write_str("Call(..)"),
    }
  }
}

/// The work queue of one scheduler. Shared with wakers, which may live anywhere.
pub(crate) struct RunQueue {
  items: Mutex<VecDeque<Runnable>>,
  owner: Thread,
}

impl fmt::Debug for RunQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RunQueue")
      .field("len", &self.items.lock().len())
      .field("owner", &self.owner.id())
      .finish()
  }
}

impl RunQueue {
  fn new() -> Self {
    RunQueue {
      items: Mutex::new(VecDeque::new()),
      owner: thread::current(),
    }
  }

  pub(crate) fn push(&self, runnable: Runnable) {
    self.items.lock().push_back(runnable);
    if thread::current().id() != self.owner.id() {
      unpark_thread(&self.owner);
    }
  }

  fn pop(&self) -> Option<Runnable> {
    self.items.lock().pop_front()
  }
}

struct Scheduler {
  queue: Arc<RunQueue>,
  processes: RefCell<HashMap<u64, Process>>,
  timers: RefCell<Timers>,
  draining: Cell<bool>,
  current: Cell<Option<u64>>,
}

thread_local! {
  static SCHEDULER: Scheduler = Scheduler::new();
}

// Resets the drain state even when a resumed body unwinds through the loop.
struct DrainGuard<'a>(&'a Scheduler);

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    self.0.current.set(None);
    self.0.draining.set(false);
  }
}

impl Scheduler {
  fn new() -> Self {
    Scheduler {
      queue: Arc::new(RunQueue::new()),
      processes: RefCell::new(HashMap::new()),
      timers: RefCell::new(Timers::default()),
      draining: Cell::new(false),
      current: Cell::new(None),
    }
  }

  fn spawn(&self, body: LocalBoxFuture<'static, ()>) -> u64 {
    let id = NEXT_PROCESS_ID.fetch_add(1, Ordering::Relaxed);
    let process = Process::new(id, body, Arc::clone(&self.queue));
    process.schedule();
    self.processes.borrow_mut().insert(id, process);
    tracing::trace!(process = id, "process spawned");
    telemetry::log_event(None, "scheduler::spawn", "Spawn", Some(format!("process {}", id)));
    id
  }

  fn drain(&self) {
    if self.draining.replace(true) {
      return;
    }
    let _guard = DrainGuard(self);
    let mut since_timer_check = 0;
    loop {
      let Some(runnable) = self.queue.pop() else {
        if self.fire_due_timers() {
          continue;
        }
        break;
      };
      match runnable {
        Runnable::Resume(id) => self.resume(id),
        Runnable::Call(callback) => callback(),
      }
      // Timers must fire even while processes keep each other busy.
      since_timer_check += 1;
      if since_timer_check == TIMER_CHECK_INTERVAL {
        since_timer_check = 0;
        self.fire_due_timers();
      }
    }
  }

  fn resume(&self, id: u64) {
    // Out of the table while polling: the body may spawn processes.
    let Some(mut process) = self.processes.borrow_mut().remove(&id) else {
      return;
    };
    tracing::trace!(process = id, "process resumed");
    let previous = self.current.replace(Some(id));
    let state = process.resume();
    self.current.set(previous);
    match state {
      ProcessState::Done => {
        tracing::trace!(process = id, "process finished");
        telemetry::log_event(None, "scheduler::resume", "Done", Some(format!("process {}", id)));
      }
      _ => {
        debug_assert_eq!(process.state(), ProcessState::Suspended);
        self.processes.borrow_mut().insert(id, process);
      }
    }
  }

  /// Runs every timer that is due. Returns `true` if any fired.
  fn fire_due_timers(&self) -> bool {
    let due = self.timers.borrow_mut().take_due(Instant::now());
    if due.is_empty() {
      return false;
    }
    tracing::debug!(fired = due.len(), "timers fired");
    for action in due {
      action();
    }
    true
  }

  fn next_deadline(&self) -> Option<Instant> {
    self.timers.borrow().next_deadline()
  }
}

// --- Crate-internal entry points ---

/// Spawns `body` as a new process on this thread's scheduler and queues its first
/// turn. Does not drain.
pub(crate) fn spawn(body: LocalBoxFuture<'static, ()>) -> u64 {
  SCHEDULER.with(|s| s.spawn(body))
}

/// Runs queued work until the queue is empty, unless a drain loop is already
/// running further up this thread's stack.
pub(crate) fn drain() {
  SCHEDULER.with(Scheduler::drain)
}

/// The run queue of the calling thread's scheduler.
pub(crate) fn local_queue() -> Arc<RunQueue> {
  SCHEDULER.with(|s| Arc::clone(&s.queue))
}

/// Registers `action` to run once `deadline` has passed.
pub(crate) fn schedule_timer(deadline: Instant, action: Box<dyn FnOnce() + 'static>) {
  SCHEDULER.with(|s| {
    tracing::debug!(pending = s.timers.borrow().len() + 1, "timer scheduled");
    s.timers.borrow_mut().insert(deadline, action);
  });
}

/// Id of the process being polled on this thread, if any.
pub(crate) fn current_process() -> Option<u64> {
  SCHEDULER.try_with(|s| s.current.get()).ok().flatten()
}

// --- Public driver ---

/// Drives the calling thread's scheduler until `future` completes, and returns
/// its output.
///
/// `future` runs as a process, so it can await channel operations and spawn other
/// processes with [`go`](crate::go). While nothing is runnable the thread sleeps
/// until the next timer deadline or until a wake-up arrives from another thread.
///
/// # Panics
///
/// Panics if called from inside a process (the scheduler is already running on
/// this thread), and propagates a panic of `future` itself.
///
/// # Examples
///
/// ```
/// use fibre_csp::{go, Chan, Taken};
///
/// let ch = Chan::new();
/// let producer = ch.clone();
/// go(async move {
///   for i in 0..3 {
///     producer.put(i).await;
///   }
///   producer.close();
/// });
///
/// let sum = fibre_csp::run(async move {
///   let mut sum = 0;
///   while let Taken::Value(v) = ch.take().await {
///     sum += v;
///   }
///   sum
/// });
/// assert_eq!(sum, 3);
/// ```
pub fn run<F>(future: F) -> F::Output
where
  F: Future + 'static,
  F::Output: 'static,
{
  let nested = SCHEDULER.with(|s| s.draining.get());
  assert!(
    !nested,
    "fibre_csp::run cannot be called from inside a process; await the future instead"
  );

  let output = Rc::new(RefCell::new(None));
  let slot = Rc::clone(&output);
  spawn(Box::pin(async move {
    let value = future.await;
    *slot.borrow_mut() = Some(value);
  }));

  loop {
    drain();
    if let Some(value) = output.borrow_mut().take() {
      return value;
    }
    park_until(SCHEDULER.with(Scheduler::next_deadline));
  }
}
