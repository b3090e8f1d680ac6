//! Communicating Sequential Processes for Rust: channels, processes and select.
//!
//! Fibre CSP lets independently scheduled processes coordinate purely through
//! channel hand-off. It provides rendezvous and buffered [`Chan`]nels, a
//! cooperative per-thread scheduler that runs process bodies written as `async`
//! blocks ([`go`], [`run`]), and an atomic multi-channel select ([`alts`]) that
//! commits to exactly one operation.
//!
//! Resumptions are trampolined through the scheduler's run queue, so arbitrarily
//! long chains of immediately-satisfied operations run in constant stack space.
//!
//! Protocol outcomes are plain enum variants and can never be confused with data:
//!
//! - CLOSED: [`Taken::Closed`], what a take yields on a closed, drained channel.
//! - NO_VALUE: `None` from [`Chan::poll`].
//! - DEFAULT: [`Chosen::Default`], the origin of a select's default value.

pub mod buffer;
pub mod chan;
pub mod error;
pub mod select;
pub mod telemetry;

mod process;
mod scheduler;

// Internal utilities - not part of public API but exposed for crate use
mod async_util;
mod handler;
mod sync_util;

pub use buffer::BufferPolicy;
pub use chan::{chan, Chan, PutFuture, TakeFuture, Taken};
pub use error::{ProcessError, TrySendError};
pub use process::{go, spawn};
pub use scheduler::run;
pub use scheduler::timer::timeout;
pub use select::{alts, alts_async, AltValue, AltsFuture, AltsOptions, Chosen, Op, Selected};
