// src/buffer.rs

//! Bounded value storage owned by a buffered channel.
//!
//! A [`Buffer`] is a FIFO of at most `capacity` values with one of three overflow
//! policies:
//!
//! - [`BufferPolicy::Fixed`]: reports `full` once `capacity` values are stored. The
//!   channel then parks further puts until a take makes room (backpressure).
//! - [`BufferPolicy::Dropping`]: never reports `full`; a value added while at
//!   capacity is discarded.
//! - [`BufferPolicy::Sliding`]: never reports `full`; adding while at capacity
//!   evicts the oldest value.
//!
//! The channel only calls [`Buffer::add`] after checking [`Buffer::is_full`] and
//! only removes through [`Buffer::remove`], which returns `None` when empty, so
//! neither precondition can be violated.

use std::collections::VecDeque;
use std::fmt;

/// What a buffer does with a value that arrives while it is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
  /// Apply backpressure: the buffer is full at capacity.
  Fixed,
  /// Discard the newly added value.
  Dropping,
  /// Discard the oldest stored value.
  Sliding,
}

/// A bounded FIFO of channel values.
pub(crate) struct Buffer<T> {
  items: VecDeque<T>,
  capacity: usize,
  policy: BufferPolicy,
}

impl<T> fmt::Debug for Buffer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Buffer")
      .field("len", &self.items.len())
      .field("capacity", &self.capacity)
      .field("policy", &self.policy)
      .finish()
  }
}

impl<T> Buffer<T> {
  /// Creates an empty buffer. `capacity` must be at least 1; a channel without
  /// storage has no buffer at all.
  pub(crate) fn new(capacity: usize, policy: BufferPolicy) -> Self {
    debug_assert!(capacity > 0, "a buffer needs room for at least one value");
    Self {
      items: VecDeque::with_capacity(capacity),
      capacity,
      policy,
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.items.len()
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }

  #[inline]
  pub(crate) fn policy(&self) -> BufferPolicy {
    self.policy
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Only a fixed buffer can be full; the other policies absorb every add.
  #[inline]
  pub(crate) fn is_full(&self) -> bool {
    self.policy == BufferPolicy::Fixed && self.items.len() >= self.capacity
  }

  /// Appends `value` at the tail. Callers check `is_full` first.
  pub(crate) fn add(&mut self, value: T) {
    debug_assert!(!self.is_full(), "add on a full buffer");
    if self.items.len() < self.capacity {
      self.items.push_back(value);
      return;
    }
    match self.policy {
      BufferPolicy::Dropping => drop(value),
      BufferPolicy::Sliding => {
        self.items.pop_front();
        self.items.push_back(value);
      }
      // Unreachable for callers that respect `is_full`.
      BufferPolicy::Fixed => self.items.push_back(value),
    }
  }

  /// Removes and returns the head, `None` if the buffer is empty.
  #[inline]
  pub(crate) fn remove(&mut self) -> Option<T> {
    self.items.pop_front()
  }
}
