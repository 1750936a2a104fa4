//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision, so comparing the strings compares the instants. Enums are stored
//! as their canonical string form.

use chrono::{DateTime, SecondsFormat, Utc};
use ride_core::{
  event::RideEvent,
  ride::{Ride, RideStatus},
  user::{Role, User},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Stored timestamps are microsecond precision; truncate in-memory values
/// to match what a later read returns.
pub fn truncate_dt(dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
  decode_dt(&encode_dt(dt))
}

// ─── Counts ──────────────────────────────────────────────────────────────────

pub fn decode_count(n: i64) -> Result<u64> {
  u64::try_from(n).map_err(|_| Error::Count(n))
}

// ─── Column lists ────────────────────────────────────────────────────────────

/// Number of columns produced by [`user_columns`].
pub const USER_WIDTH: usize = 12;

/// The `users` columns read by [`RawUser::read`], qualified by `alias`.
pub fn user_columns(alias: &str) -> String {
  [
    "user_id",
    "role",
    "first_name",
    "last_name",
    "email",
    "phone_number",
    "username",
    "is_active",
    "is_staff",
    "is_superuser",
    "date_joined",
    "last_login",
  ]
  .iter()
  .map(|c| format!("{alias}.{c}"))
  .collect::<Vec<_>>()
  .join(", ")
}

pub const RIDE_WIDTH: usize = 11;

pub const RIDE_COLUMNS: &str = "r.ride_id, r.status, r.rider_id, r.driver_id, \
   r.pickup_latitude, r.pickup_longitude, r.dropoff_latitude, \
   r.dropoff_longitude, r.pickup_time, r.created_at, r.updated_at";

pub const EVENT_WIDTH: usize = 7;

pub const EVENT_COLUMNS: &str = "e.event_id, e.ride_id, e.description, \
   e.old_status, e.new_status, e.user_id, e.created_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:      i64,
  pub role:         String,
  pub first_name:   String,
  pub last_name:    String,
  pub email:        String,
  pub phone_number: String,
  pub username:     String,
  pub is_active:    bool,
  pub is_staff:     bool,
  pub is_superuser: bool,
  pub date_joined:  String,
  pub last_login:   Option<String>,
}

impl RawUser {
  /// Read [`USER_WIDTH`] columns starting at `at`.
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(at)?,
      role:         row.get(at + 1)?,
      first_name:   row.get(at + 2)?,
      last_name:    row.get(at + 3)?,
      email:        row.get(at + 4)?,
      phone_number: row.get(at + 5)?,
      username:     row.get(at + 6)?,
      is_active:    row.get(at + 7)?,
      is_staff:     row.get(at + 8)?,
      is_superuser: row.get(at + 9)?,
      date_joined:  row.get(at + 10)?,
      last_login:   row.get(at + 11)?,
    })
  }

  /// Like [`RawUser::read`], for the nullable side of a `LEFT JOIN`.
  pub fn read_optional(row: &Row<'_>, at: usize) -> rusqlite::Result<Option<Self>> {
    match row.get::<_, Option<i64>>(at)? {
      Some(_) => Self::read(row, at).map(Some),
      None => Ok(None),
    }
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:           self.user_id,
      role:         self.role.parse::<Role>()?,
      first_name:   self.first_name,
      last_name:    self.last_name,
      email:        self.email,
      phone_number: self.phone_number,
      username:     self.username,
      is_active:    self.is_active,
      is_staff:     self.is_staff,
      is_superuser: self.is_superuser,
      date_joined:  decode_dt(&self.date_joined)?,
      last_login:   self.last_login.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw values read directly from a `rides` row.
pub struct RawRide {
  pub ride_id:           i64,
  pub status:            String,
  pub rider_id:          i64,
  pub driver_id:         Option<i64>,
  pub pickup_latitude:   f64,
  pub pickup_longitude:  f64,
  pub dropoff_latitude:  f64,
  pub dropoff_longitude: f64,
  pub pickup_time:       String,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawRide {
  /// Read [`RIDE_WIDTH`] columns starting at `at`.
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      ride_id:           row.get(at)?,
      status:            row.get(at + 1)?,
      rider_id:          row.get(at + 2)?,
      driver_id:         row.get(at + 3)?,
      pickup_latitude:   row.get(at + 4)?,
      pickup_longitude:  row.get(at + 5)?,
      dropoff_latitude:  row.get(at + 6)?,
      dropoff_longitude: row.get(at + 7)?,
      pickup_time:       row.get(at + 8)?,
      created_at:        row.get(at + 9)?,
      updated_at:        row.get(at + 10)?,
    })
  }

  pub fn into_ride(self) -> Result<Ride> {
    Ok(Ride {
      id:                self.ride_id,
      status:            self.status.parse::<RideStatus>()?,
      rider_id:          self.rider_id,
      driver_id:         self.driver_id,
      pickup_latitude:   self.pickup_latitude,
      pickup_longitude:  self.pickup_longitude,
      dropoff_latitude:  self.dropoff_latitude,
      dropoff_longitude: self.dropoff_longitude,
      pickup_time:       decode_dt(&self.pickup_time)?,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `ride_events` row.
pub struct RawEvent {
  pub event_id:    i64,
  pub ride_id:     i64,
  pub description: String,
  pub old_status:  Option<String>,
  pub new_status:  String,
  pub user_id:     Option<i64>,
  pub created_at:  String,
}

impl RawEvent {
  /// Read [`EVENT_WIDTH`] columns starting at `at`.
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:    row.get(at)?,
      ride_id:     row.get(at + 1)?,
      description: row.get(at + 2)?,
      old_status:  row.get(at + 3)?,
      new_status:  row.get(at + 4)?,
      user_id:     row.get(at + 5)?,
      created_at:  row.get(at + 6)?,
    })
  }

  pub fn into_event(self) -> Result<RideEvent> {
    Ok(RideEvent {
      id:          self.event_id,
      ride_id:     self.ride_id,
      description: self.description,
      old_status:  self
        .old_status
        .as_deref()
        .map(str::parse::<RideStatus>)
        .transpose()?,
      new_status:  self.new_status.parse::<RideStatus>()?,
      user_id:     self.user_id,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
