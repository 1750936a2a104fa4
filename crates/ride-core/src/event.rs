//! Ride events: the append-only audit trail of a ride.
//!
//! An event is written when a ride is requested and on every status change.
//! Events are never updated; deleting a ride deletes its events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ride::RideStatus;

/// An immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideEvent {
  pub id:          i64,
  pub ride_id:     i64,
  pub description: String,
  /// `None` for the initial "requested" event.
  pub old_status:  Option<RideStatus>,
  pub new_status:  RideStatus,
  /// The acting user; nulled if that user is deleted.
  pub user_id:     Option<i64>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::RideStore::append_event`], for backfilling
/// history recorded elsewhere. Transitions write their own events.
#[derive(Debug, Clone)]
pub struct NewRideEvent {
  pub ride_id:     i64,
  pub description: String,
  pub old_status:  Option<RideStatus>,
  pub new_status:  RideStatus,
  pub user_id:     Option<i64>,
  pub created_at:  DateTime<Utc>,
}
