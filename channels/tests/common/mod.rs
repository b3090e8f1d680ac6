#![allow(dead_code)]

use fibre_csp::{Chan, Taken};
use std::time::Duration;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(20);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(3);
pub const ITEMS_LOW: usize = 50;
pub const ITEMS_MEDIUM: usize = 200;
pub const ITEMS_HIGH: usize = 25_000;

/// Takes from `ch` until it reports `Closed`.
pub async fn drain_chan<T: Send + 'static>(ch: &Chan<T>) -> Vec<T> {
  let mut items = Vec::new();
  while let Taken::Value(v) = ch.take().await {
    items.push(v);
  }
  items
}

/// A channel that is already closed.
pub fn closed<T: Send + 'static>() -> Chan<T> {
  let ch = Chan::new();
  ch.close();
  ch
}
