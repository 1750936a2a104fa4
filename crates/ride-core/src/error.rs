//! Error types for `ride-core`.

use thiserror::Error;

use crate::ride::RideStatus;

/// Domain failures. Everything else a backend can hit is an internal error
/// of that backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  #[error("{0}")]
  Validation(String),

  #[error("cannot {action} a ride that is {from}")]
  InvalidTransition {
    action: &'static str,
    from:   RideStatus,
  },

  #[error("user {0} not found")]
  UserNotFound(i64),

  #[error("ride {0} not found")]
  RideNotFound(i64),

  #[error("ride event {0} not found")]
  EventNotFound(i64),

  #[error("unknown ride status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown user role: {0:?}")]
  UnknownRole(String),
}

impl Error {
  /// Stable machine-readable classification used in API error bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Validation(_) => "validation_error",
      Self::InvalidTransition { .. } => "invalid_transition",
      Self::UserNotFound(_) | Self::RideNotFound(_) | Self::EventNotFound(_) => {
        "not_found"
      }
      // A stored value we cannot decode is a data problem, not a caller one.
      Self::UnknownStatus(_) | Self::UnknownRole(_) => "internal_error",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
