// src/error.rs

use core::fmt;

// Generates `into_inner`, `Display` and `Error` for an error enum whose
// every variant carries the rejected value back to the caller.
macro_rules! impl_error_for_enum_with_inner {
    (
        $enum_name:ident < $generic_param:ident >,
        $($variant:ident ( $message:expr ) ),+
        $(,)?
    ) => {
        impl<$generic_param> $enum_name<$generic_param> {
            /// Consumes the error, returning the value that could not be delivered.
            #[inline]
            pub fn into_inner(self) -> $generic_param {
                match self {
                    $( $enum_name::$variant(v) => v, )+
                }
            }
        }

        impl<$generic_param> fmt::Display for $enum_name<$generic_param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$variant(_) => f.write_str($message), )+
                }
            }
        }

        impl<$generic_param: fmt::Debug> std::error::Error for $enum_name<$generic_param> {}
    };
}

/// Error returned by [`Chan::offer`](crate::Chan::offer) when the value could not be
/// delivered immediately. The value is handed back.
///
/// An offer never parks, so a failed offer leaves no trace on the channel.
#[derive(PartialEq, Eq, Clone)]
pub enum TrySendError<T> {
  /// No taker is waiting and the buffer (if any) has no room.
  Full(T),
  /// The channel has been closed.
  Closed(T),
}

impl<T> TrySendError<T> {
  /// Returns `true` if the offer failed because the channel is closed.
  pub fn is_closed(&self) -> bool {
    matches!(self, TrySendError::Closed(_))
  }

  /// Returns `true` if the offer failed for lack of a taker or buffer room.
  pub fn is_full(&self) -> bool {
    matches!(self, TrySendError::Full(_))
  }
}

impl<T> fmt::Debug for TrySendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TrySendError::Full(_) => write!(f, "TrySendError::Full(..)"),
      TrySendError::Closed(_) => write!(f, "TrySendError::Closed(..)"),
    }
  }
}

impl_error_for_enum_with_inner!(
  TrySendError<T>,
  Full("channel full"),
  Closed("channel closed"),
);

/// Why a process ended without producing a value.
///
/// Delivered as `Err(..)` on the result channel returned by [`go`](crate::go).
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ProcessError {
  /// The process body panicked. Carries the panic message when one was available.
  Panicked(String),
}

impl std::error::Error for ProcessError {}
impl fmt::Display for ProcessError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ProcessError::Panicked(msg) => write!(f, "process panicked: {}", msg),
    }
  }
}
