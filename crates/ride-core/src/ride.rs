//! Rides and their status.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Where a ride is in its lifecycle. See [`crate::lifecycle`] for the allowed
/// moves between these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
  Requested,
  InProgress,
  Completed,
  Cancelled,
}

impl RideStatus {
  pub const ALL: [Self; 4] =
    [Self::Requested, Self::InProgress, Self::Completed, Self::Cancelled];

  /// The value stored in the `status` column and accepted by the list filter.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Requested => "REQUESTED",
      Self::InProgress => "IN_PROGRESS",
      Self::Completed => "COMPLETED",
      Self::Cancelled => "CANCELLED",
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Cancelled)
  }
}

impl fmt::Display for RideStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RideStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| Error::UnknownStatus(s.to_owned()))
  }
}

/// One transportation request.
///
/// `driver_id` is `None` while the ride is [`RideStatus::Requested`] and set
/// once it has been started. Deleting the driver nulls it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
  pub id:                i64,
  pub status:            RideStatus,
  pub rider_id:          i64,
  pub driver_id:         Option<i64>,
  pub pickup_latitude:   f64,
  pub pickup_longitude:  f64,
  pub dropoff_latitude:  f64,
  pub dropoff_longitude: f64,
  pub pickup_time:       DateTime<Utc>,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// Input to [`crate::store::RideStore::create_ride`]. Status, timestamps and
/// the id are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRide {
  pub rider_id:          i64,
  pub pickup_latitude:   f64,
  pub pickup_longitude:  f64,
  pub dropoff_latitude:  f64,
  pub dropoff_longitude: f64,
  pub pickup_time:       DateTime<Utc>,
}

impl NewRide {
  /// Reject coordinates that cannot be stored or compared meaningfully.
  pub fn validate(&self) -> crate::Result<()> {
    let coords = [
      ("pickup_latitude", self.pickup_latitude),
      ("pickup_longitude", self.pickup_longitude),
      ("dropoff_latitude", self.dropoff_latitude),
      ("dropoff_longitude", self.dropoff_longitude),
    ];
    match coords.iter().find(|(_, v)| !v.is_finite()) {
      Some((name, _)) => {
        Err(Error::Validation(format!("{name} must be a finite number")))
      }
      None => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_round_trips_through_its_column_value() {
    for status in RideStatus::ALL {
      assert_eq!(status.as_str().parse::<RideStatus>().unwrap(), status);
    }
    assert!("completed".parse::<RideStatus>().is_err());
  }

  #[test]
  fn non_finite_coordinates_are_rejected() {
    let ride = NewRide {
      rider_id:          1,
      pickup_latitude:   f64::NAN,
      pickup_longitude:  0.0,
      dropoff_latitude:  0.0,
      dropoff_longitude: 0.0,
      pickup_time:       Utc::now(),
    };
    assert!(matches!(ride.validate(), Err(Error::Validation(m)) if m.contains("pickup_latitude")));
  }
}
