// src/process.rs

//! Spawning processes ("goroutines").

use crate::chan::Chan;
use crate::error::ProcessError;
use crate::scheduler;
use crate::telemetry;

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Spawns `body` as a process on the calling thread's scheduler.
///
/// Returns the process's result channel (capacity 1). When the body completes its
/// output is put on that channel as `Ok(value)` and the channel is then closed.
/// If the body panics, the panic is contained: the channel receives
/// `Err(ProcessError::Panicked(message))` and is closed, and every other process
/// keeps running.
///
/// Called outside any process, `go` also runs queued work (the new process
/// included) until every process is parked. Called from inside a process it only
/// queues the new one.
///
/// # Examples
///
/// ```
/// use fibre_csp::go;
///
/// let result = go(async { 6 * 7 });
/// assert_eq!(result.poll(), Some(Ok(42)));
/// assert!(result.is_closed());
/// ```
pub fn go<F>(body: F) -> Chan<Result<F::Output, ProcessError>>
where
  F: Future + 'static,
  F::Output: Send + 'static,
{
  let result = Chan::buffered(1);
  let out = result.clone();
  scheduler::spawn(Box::pin(async move {
    let outcome = AssertUnwindSafe(body).catch_unwind().await.map_err(|payload| {
      let message = panic_message(payload.as_ref());
      tracing::warn!(process = ?scheduler::current_process(), error = %message, "process panicked");
      telemetry::log_event(None, "process::go", "Panic", Some(message.clone()));
      ProcessError::Panicked(message)
    });
    out.put(outcome).await;
    out.close();
  }));
  scheduler::drain();
  result
}

/// Spawns `f(args)` as a process. Same as `go(async move { f(args).await })`.
///
/// The call to `f` itself happens inside the new process, so a panic while
/// building the body is contained like any other.
pub fn spawn<A, F, Fut>(f: F, args: A) -> Chan<Result<Fut::Output, ProcessError>>
where
  A: 'static,
  F: FnOnce(A) -> Fut + 'static,
  Fut: Future + 'static,
  Fut::Output: Send + 'static,
{
  go(async move { f(args).await })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&'static str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
