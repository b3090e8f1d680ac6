// src/select/mod.rs

//! Atomic multi-channel select ("alts").
//!
//! A select waits on several channel operations at once and commits to exactly
//! one of them. It proceeds in three steps:
//!
//! 1.  **Immediate scan**: operands are tried in order (given order with
//!     `priority`, a fresh random permutation otherwise) without registering
//!     anything. The first that can complete wins. A closed channel is always
//!     ready: a take yields [`Taken::Closed`], a put yields `false`.
//! 2.  **Default**: with nothing ready and a `default` value supplied, the select
//!     resolves to it, tagged [`Chosen::Default`].
//! 3.  **Registration**: otherwise one handler per operand is parked, all sharing
//!     a single commit flag. The first handler to clear that flag delivers the
//!     result; the others are skipped by their channels from then on.
//!
//! A select never matches its own operands: putting to and taking from the same
//! channel in one select parks both instead of completing against itself.

use crate::async_util::Slot;
use crate::chan::core::Wakeups;
use crate::chan::{Chan, Taken};
use crate::handler::{CommitFlag, Handler};
use crate::scheduler::{self, Runnable};
use crate::telemetry;

use futures_core::future::FusedFuture;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// One select operand.
#[derive(Debug)]
pub enum Op<T> {
  /// Take a value from the channel.
  Take(Chan<T>),
  /// Put the value on the channel.
  Put(Chan<T>, T),
}

impl<T> Op<T> {
  /// The channel this operand acts on.
  pub fn channel(&self) -> &Chan<T> {
    match self {
      Op::Take(ch) | Op::Put(ch, _) => ch,
    }
  }
}

impl<T> From<Chan<T>> for Op<T> {
  fn from(ch: Chan<T>) -> Self {
    Op::Take(ch)
  }
}

impl<T> From<(Chan<T>, T)> for Op<T> {
  fn from((ch, value): (Chan<T>, T)) -> Self {
    Op::Put(ch, value)
  }
}

/// Options for [`alts`] and [`alts_async`].
#[derive(Debug, Clone)]
pub struct AltsOptions<T> {
  /// Scan operands in the given order instead of a random one.
  pub priority: bool,
  /// Resolve to this value when no operand is immediately ready.
  pub default: Option<T>,
}

impl<T> Default for AltsOptions<T> {
  fn default() -> Self {
    AltsOptions {
      priority: false,
      default: None,
    }
  }
}

impl<T> AltsOptions<T> {
  /// Random scan order, no default.
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets whether operands are scanned in the given order.
  pub fn priority(mut self, priority: bool) -> Self {
    self.priority = priority;
    self
  }

  /// Sets the value to resolve to when nothing is immediately ready.
  pub fn default_value(mut self, value: T) -> Self {
    self.default = Some(value);
    self
  }
}

/// What the committed operand produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltValue<T> {
  /// A take operand won.
  Taken(Taken<T>),
  /// A put operand won: `true` if delivered, `false` if the channel was closed.
  Put(bool),
  /// Nothing was ready; this is the `default` from the options.
  Default(T),
}

/// Which operand a select committed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chosen<T> {
  /// The operand at `index` in the list passed to the select.
  Operand { index: usize, channel: Chan<T> },
  /// The DEFAULT sentinel: no operand was ready and a default was supplied.
  Default,
}

/// The result of a select: the value and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected<T> {
  /// The committed operand's result.
  pub value: AltValue<T>,
  /// The committed operand, or DEFAULT.
  pub channel: Chosen<T>,
}

impl<T> Selected<T> {
  fn operand(index: usize, channel: Chan<T>, value: AltValue<T>) -> Self {
    Selected {
      value,
      channel: Chosen::Operand { index, channel },
    }
  }

  /// Index of the committed operand, `None` for the default.
  pub fn index(&self) -> Option<usize> {
    match &self.channel {
      Chosen::Operand { index, .. } => Some(*index),
      Chosen::Default => None,
    }
  }

  /// Returns `true` if the select resolved to its default value.
  pub fn is_default(&self) -> bool {
    matches!(self.channel, Chosen::Default)
  }

  /// The taken value, if a take operand won with one.
  pub fn into_taken(self) -> Option<T> {
    match self.value {
      AltValue::Taken(Taken::Value(v)) => Some(v),
      _ => None,
    }
  }
}

// --- Engine ---

type Deliver<T> = Arc<dyn Fn(Selected<T>) + Send + Sync + 'static>;

enum Arm<T> {
  Take(Chan<T>),
  Put(Chan<T>, Option<T>),
}

impl<T> Arm<T> {
  fn channel(&self) -> &Chan<T> {
    match self {
      Arm::Take(ch) | Arm::Put(ch, _) => ch,
    }
  }
}

impl<T> From<Op<T>> for Arm<T> {
  fn from(op: Op<T>) -> Self {
    match op {
      Op::Take(ch) => Arm::Take(ch),
      Op::Put(ch, value) => Arm::Put(ch, Some(value)),
    }
  }
}

enum Start<T> {
  Ready(Selected<T>),
  Parked(CommitFlag),
}

fn scan_order(len: usize, priority: bool) -> Vec<usize> {
  let mut order: Vec<usize> = (0..len).collect();
  if !priority {
    order.shuffle(&mut rand::rng());
  }
  order
}

/// Attempts one operand without registering. A put that cannot complete keeps
/// its value in the arm.
fn try_now<T: Send + 'static>(arm: &mut Arm<T>, wakeups: &mut Wakeups) -> Option<AltValue<T>> {
  match arm {
    Arm::Take(ch) => ch.shared.core.lock().take_now(wakeups).map(AltValue::Taken),
    Arm::Put(ch, slot) => {
      let value = slot.take()?;
      match ch.shared.core.lock().put_now(value, wakeups) {
        Ok(delivered) => Some(AltValue::Put(delivered)),
        Err(value) => {
          *slot = Some(value);
          None
        }
      }
    }
  }
}

/// Parks a handler for `arm` under `flag`, or completes it if it became ready.
fn register<T: Send + 'static>(
  index: usize,
  arm: &mut Arm<T>,
  flag: &CommitFlag,
  deliver: &Deliver<T>,
  wakeups: &mut Wakeups,
) -> Option<AltValue<T>> {
  let channel = arm.channel().clone();
  let deliver = Arc::clone(deliver);
  match arm {
    Arm::Take(ch) => {
      let handler = Handler::new(flag.clone(), move |taken| {
        deliver(Selected::operand(index, channel, AltValue::Taken(taken)));
      });
      ch.shared.core.lock().take(handler, wakeups).map(AltValue::Taken)
    }
    Arm::Put(ch, slot) => {
      let value = slot.take()?;
      let handler = Handler::new(flag.clone(), move |delivered| {
        deliver(Selected::operand(index, channel, AltValue::Put(delivered)));
      });
      ch.shared.core.lock().put(value, handler, wakeups).map(AltValue::Put)
    }
  }
}

fn start<T: Send + 'static>(ops: Vec<Op<T>>, options: AltsOptions<T>, deliver: Deliver<T>) -> Start<T> {
  let mut arms: Vec<Arm<T>> = ops.into_iter().map(Arm::from).collect();
  let order = scan_order(arms.len(), options.priority);

  for &index in &order {
    let mut wakeups = Wakeups::new();
    let ready = try_now(&mut arms[index], &mut wakeups);
    wakeups.fire();
    if let Some(value) = ready {
      telemetry::increment_counter("select::start", "immediate");
      return Start::Ready(Selected::operand(index, arms[index].channel().clone(), value));
    }
  }

  if let Some(value) = options.default {
    telemetry::increment_counter("select::start", "default");
    return Start::Ready(Selected {
      value: AltValue::Default(value),
      channel: Chosen::Default,
    });
  }

  let flag = CommitFlag::new();
  for &index in &order {
    // A handler registered earlier may already have been committed from another thread.
    if !flag.is_active() {
      break;
    }
    let mut wakeups = Wakeups::new();
    let ready = register(index, &mut arms[index], &flag, &deliver, &mut wakeups);
    wakeups.fire();
    if let Some(value) = ready {
      telemetry::increment_counter("select::start", "immediate");
      return Start::Ready(Selected::operand(index, arms[index].channel().clone(), value));
    }
  }
  tracing::trace!(operands = arms.len(), "select parked");
  telemetry::increment_counter("select::start", "parked");
  Start::Parked(flag)
}

fn log_commit<T: Send + 'static>(selected: &Selected<T>) {
  if let Chosen::Operand { index, channel } = &selected.channel {
    telemetry::log_event(Some(channel.id()), "select", "Commit", Some(format!("operand {}", index)));
  }
}

// --- Public API ---

/// Waits on every operation in `ops` and completes exactly one of them.
///
/// The returned future resolves to the committed operand's result and identity.
/// An empty `ops` without a default never resolves. Dropping the future while it
/// waits withdraws all of its registrations.
///
/// # Examples
///
/// ```
/// use fibre_csp::{alts, AltValue, AltsOptions, Chan, Op, Taken};
///
/// let a = Chan::<&str>::buffered(1);
/// let b = Chan::<&str>::new();
/// a.offer("ready").unwrap();
///
/// let picked = fibre_csp::run(async move {
///   alts([Op::Take(b), Op::Take(a)], AltsOptions::new().priority(true)).await
/// });
/// assert_eq!(picked.index(), Some(1));
/// assert_eq!(picked.value, AltValue::Taken(Taken::Value("ready")));
/// ```
pub fn alts<T, I>(ops: I, options: AltsOptions<T>) -> AltsFuture<T>
where
  T: Send + 'static,
  I: IntoIterator<Item = Op<T>>,
{
  AltsFuture {
    state: AltsState::Init {
      ops: ops.into_iter().collect(),
      options,
    },
  }
}

/// Callback form of [`alts`], usable outside any process.
///
/// An immediate result calls `callback` before returning; otherwise it runs from
/// the calling thread's scheduler once an operand commits.
pub fn alts_async<T, I, F>(ops: I, options: AltsOptions<T>, callback: F)
where
  T: Send + 'static,
  I: IntoIterator<Item = Op<T>>,
  F: FnOnce(Selected<T>) + Send + 'static,
{
  let callback = Arc::new(Mutex::new(Some(callback)));
  let deferred = Arc::clone(&callback);
  let queue = scheduler::local_queue();
  let deliver: Deliver<T> = Arc::new(move |selected: Selected<T>| {
    log_commit(&selected);
    if let Some(callback) = deferred.lock().take() {
      queue.push(Runnable::Call(Box::new(move || callback(selected))));
    }
  });

  if let Start::Ready(selected) = start(ops.into_iter().collect(), options, deliver) {
    log_commit(&selected);
    // Bind first: the guard must be released before user code runs.
    let immediate = callback.lock().take();
    if let Some(callback) = immediate {
      callback(selected);
    }
  }
  scheduler::drain();
}

enum AltsState<T> {
  Init { ops: Vec<Op<T>>, options: AltsOptions<T> },
  Parked { slot: Arc<Slot<Selected<T>>>, flag: CommitFlag },
  Done,
}

/// Future returned by [`alts`].
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct AltsFuture<T> {
  state: AltsState<T>,
}

impl<T> Unpin for AltsFuture<T> {}

impl<T> fmt::Debug for AltsFuture<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match &self.state {
      AltsState::Init { ops, .. } => format!("Init({} operands)", ops.len()),
      AltsState::Parked { .. } => "Parked".to_string(),
      AltsState::Done => "Done".to_string(),
    };
    f.debug_struct("AltsFuture").field("state", &state).finish()
  }
}

impl<T: Send + 'static> Future for AltsFuture<T> {
  type Output = Selected<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    match mem::replace(&mut this.state, AltsState::Done) {
      AltsState::Init { ops, options } => {
        let slot = Arc::new(Slot::new());
        let filler = Arc::clone(&slot);
        let deliver: Deliver<T> = Arc::new(move |selected: Selected<T>| {
          log_commit(&selected);
          filler.fill(selected);
        });
        match start(ops, options, deliver) {
          Start::Ready(selected) => {
            log_commit(&selected);
            Poll::Ready(selected)
          }
          Start::Parked(flag) => {
            this.state = AltsState::Parked { slot, flag };
            this.poll_parked(cx)
          }
        }
      }
      parked @ AltsState::Parked { .. } => {
        this.state = parked;
        this.poll_parked(cx)
      }
      AltsState::Done => panic!("AltsFuture polled after completion"),
    }
  }
}

impl<T> AltsFuture<T> {
  fn poll_parked(&mut self, cx: &mut Context<'_>) -> Poll<Selected<T>> {
    let polled = match &self.state {
      AltsState::Parked { slot, .. } => slot.poll_take(cx),
      _ => return Poll::Pending,
    };
    if polled.is_ready() {
      self.state = AltsState::Done;
    }
    polled
  }
}

impl<T: Send + 'static> FusedFuture for AltsFuture<T> {
  fn is_terminated(&self) -> bool {
    matches!(self.state, AltsState::Done)
  }
}

impl<T> Drop for AltsFuture<T> {
  fn drop(&mut self) {
    if let AltsState::Parked { flag, .. } = &self.state {
      flag.try_commit();
    }
  }
}
