//! Read models: what the store hands back for joined reads, and the shapes
//! the API serialises.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  event::RideEvent,
  ride::{Ride, RideStatus},
  user::{Role, User},
};

/// The public projection of a [`User`] embedded in rides and events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
  pub id:           i64,
  pub username:     String,
  pub first_name:   String,
  pub last_name:    String,
  pub email:        String,
  pub phone_number: String,
  pub role:         Role,
}

impl From<User> for UserSummary {
  fn from(u: User) -> Self {
    Self {
      id:           u.id,
      username:     u.username,
      first_name:   u.first_name,
      last_name:    u.last_name,
      email:        u.email,
      phone_number: u.phone_number,
      role:         u.role,
    }
  }
}

/// A ride event joined with its acting user, as loaded in one query.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
  pub event: RideEvent,
  pub user:  Option<User>,
}

/// A ride joined with its rider and driver, as loaded in one query.
#[derive(Debug, Clone, PartialEq)]
pub struct RideRow {
  pub ride:     Ride,
  pub rider:    User,
  pub driver:   Option<User>,
  /// Planar distance to the query point when distance sorting was active.
  pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideEventView {
  pub id:          i64,
  pub ride_id:     i64,
  pub description: String,
  pub old_status:  Option<RideStatus>,
  pub new_status:  RideStatus,
  pub user:        Option<UserSummary>,
  pub created_at:  DateTime<Utc>,
}

impl From<EventRow> for RideEventView {
  fn from(row: EventRow) -> Self {
    let EventRow { event, user } = row;
    Self {
      id:          event.id,
      ride_id:     event.ride_id,
      description: event.description,
      old_status:  event.old_status,
      new_status:  event.new_status,
      user:        user.map(UserSummary::from),
      created_at:  event.created_at,
    }
  }
}

/// A ride as returned by the list and detail endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideView {
  pub id:                 i64,
  pub status:             RideStatus,
  pub pickup_latitude:    f64,
  pub pickup_longitude:   f64,
  pub dropoff_latitude:   f64,
  pub dropoff_longitude:  f64,
  pub pickup_time:        DateTime<Utc>,
  pub rider:              UserSummary,
  pub driver:             Option<UserSummary>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  /// Events from the trailing 24 hours only.
  pub todays_ride_events: Vec<RideEventView>,
  pub distance:           Option<f64>,
}

impl RideView {
  pub fn new(row: RideRow, todays_ride_events: Vec<RideEventView>) -> Self {
    let RideRow { ride, rider, driver, distance } = row;
    Self {
      id: ride.id,
      status: ride.status,
      pickup_latitude: ride.pickup_latitude,
      pickup_longitude: ride.pickup_longitude,
      dropoff_latitude: ride.dropoff_latitude,
      dropoff_longitude: ride.dropoff_longitude,
      pickup_time: ride.pickup_time,
      rider: rider.into(),
      driver: driver.map(UserSummary::from),
      created_at: ride.created_at,
      updated_at: ride.updated_at,
      todays_ride_events,
      distance,
    }
  }
}
