//! The ride lifecycle state machine.
//!
//! ```text
//! REQUESTED ──start──▶ IN_PROGRESS ──complete──▶ COMPLETED
//!     │                    │
//!     └──────cancel────────┴──────▶ CANCELLED
//! ```
//!
//! `COMPLETED` and `CANCELLED` are terminal. This module only decides whether
//! a move is legal and what its audit record looks like; a store applies the
//! status update and the event insert in one transaction.

use serde::Serialize;

use crate::{
  Error, Result,
  event::RideEvent,
  ride::{Ride, RideStatus},
  user::User,
};

/// A requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Cancel,
  /// `driver_id` is `None` when the caller did not supply one; the request
  /// is then rejected after the status check.
  Start { driver_id: Option<i64> },
  Complete,
}

impl Transition {
  /// Verb used in error messages.
  pub fn action(&self) -> &'static str {
    match self {
      Self::Cancel => "cancel",
      Self::Start { .. } => "start",
      Self::Complete => "complete",
    }
  }

  pub fn target(&self) -> RideStatus {
    match self {
      Self::Cancel => RideStatus::Cancelled,
      Self::Start { .. } => RideStatus::InProgress,
      Self::Complete => RideStatus::Completed,
    }
  }

  /// Check that the move is legal from `from` and return the new status.
  ///
  /// For `Start` the status is checked before the driver id, so starting a
  /// finished ride reports the bad transition rather than the missing input.
  pub fn validate(&self, from: RideStatus) -> Result<RideStatus> {
    let allowed = match self {
      Self::Cancel => !from.is_terminal(),
      Self::Start { .. } => from == RideStatus::Requested,
      Self::Complete => from == RideStatus::InProgress,
    };
    if !allowed {
      return Err(Error::InvalidTransition { action: self.action(), from });
    }
    if let Self::Start { driver_id: None } = self {
      return Err(Error::Validation("Driver ID is required".into()));
    }
    Ok(self.target())
  }

  /// Who the audit event is attributed to.
  ///
  /// Cancellation is attributed to whoever asked for it. Starting and
  /// completing are attributed to the driver, regardless of the requester.
  pub fn actor(&self, requester: Option<i64>, ride: &Ride) -> Option<i64> {
    match self {
      Self::Cancel => requester,
      Self::Start { driver_id } => *driver_id,
      Self::Complete => ride.driver_id,
    }
  }

  /// Audit description. `driver` is the driver being assigned by `Start`.
  pub fn describe(&self, driver: Option<&User>) -> String {
    match (self, driver) {
      (Self::Cancel, _) => "Ride cancelled".into(),
      (Self::Start { .. }, Some(d)) => {
        format!("Ride started with driver {}", d.full_name())
      }
      (Self::Start { .. }, None) => "Ride started".into(),
      (Self::Complete, _) => "Ride completed".into(),
    }
  }

  /// Short confirmation returned to the caller.
  pub fn confirmation(&self) -> &'static str {
    match self {
      Self::Cancel => "Ride cancelled",
      Self::Start { .. } => "Ride started",
      Self::Complete => "Ride completed",
    }
  }
}

/// Description of the event written when a ride is first requested.
pub const REQUESTED_DESCRIPTION: &str = "Ride requested";

/// The persisted result of a successful transition.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
  pub ride:  Ride,
  pub event: RideEvent,
}

#[cfg(test)]
mod tests {
  use super::*;
  use RideStatus::*;

  const START: Transition = Transition::Start { driver_id: Some(7) };

  #[test]
  fn cancel_allowed_from_non_terminal_states_only() {
    assert_eq!(Transition::Cancel.validate(Requested), Ok(Cancelled));
    assert_eq!(Transition::Cancel.validate(InProgress), Ok(Cancelled));
    for from in [Completed, Cancelled] {
      assert!(matches!(
        Transition::Cancel.validate(from),
        Err(Error::InvalidTransition { action: "cancel", .. })
      ));
    }
  }

  #[test]
  fn start_requires_requested() {
    assert_eq!(START.validate(Requested), Ok(InProgress));
    for from in [InProgress, Completed, Cancelled] {
      assert!(matches!(
        START.validate(from),
        Err(Error::InvalidTransition { from: f, .. }) if f == from
      ));
    }
  }

  #[test]
  fn start_without_driver_is_a_validation_error() {
    let start = Transition::Start { driver_id: None };
    assert!(matches!(start.validate(Requested), Err(Error::Validation(_))));
    // Status is checked first.
    assert!(matches!(
      start.validate(Completed),
      Err(Error::InvalidTransition { .. })
    ));
  }

  #[test]
  fn complete_requires_in_progress() {
    assert_eq!(Transition::Complete.validate(InProgress), Ok(Completed));
    for from in [Requested, Completed, Cancelled] {
      assert!(Transition::Complete.validate(from).is_err());
    }
  }

  #[test]
  fn actors_follow_the_transition_kind() {
    let now = chrono::Utc::now();
    let ride = Ride {
      id:                1,
      status:            InProgress,
      rider_id:          2,
      driver_id:         Some(3),
      pickup_latitude:   0.0,
      pickup_longitude:  0.0,
      dropoff_latitude:  0.0,
      dropoff_longitude: 0.0,
      pickup_time:       now,
      created_at:        now,
      updated_at:        now,
    };
    assert_eq!(Transition::Cancel.actor(Some(9), &ride), Some(9));
    assert_eq!(Transition::Cancel.actor(None, &ride), None);
    assert_eq!(START.actor(Some(9), &ride), Some(7));
    assert_eq!(Transition::Complete.actor(Some(9), &ride), Some(3));
  }
}
