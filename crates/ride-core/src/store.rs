//! The `RideStore` trait.
//!
//! Implemented by storage backends (e.g. `ride-store-sqlite`). The query
//! engine, the instrumentation layer and the API depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  event::{NewRideEvent, RideEvent},
  lifecycle::{Transition, TransitionOutcome},
  query::{PageRequest, RideQuery},
  ride::{NewRide, Ride},
  user::{NewUser, User},
  view::{EventRow, RideRow},
};

/// Errors produced by a backend, which may carry a domain failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The domain failure behind this error, if it is one. `None` means the
  /// backend itself failed.
  fn domain(&self) -> Option<&crate::Error>;
}

/// Abstraction over a ride store backend.
///
/// Every read method issues exactly one round trip to the backing database.
/// [`crate::instrument::CountingStore`] relies on this to count round trips
/// by counting calls.
///
/// Ride events are append-only. Ride status only changes through
/// [`RideStore::transition`], which writes the status and its audit event
/// atomically.
pub trait RideStore: Send + Sync {
  type Error: StoreError;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Provision a user. Fails if the email or username is taken.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Users ordered by id.
  fn list_users(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  fn count_users(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Rides ─────────────────────────────────────────────────────────────

  /// Insert a `REQUESTED` ride together with its initial event, attributed
  /// to the rider. Fails with a not-found error if the rider does not exist.
  fn create_ride(
    &self,
    input: NewRide,
  ) -> impl Future<Output = Result<(Ride, RideEvent), Self::Error>> + Send + '_;

  /// A single ride with its rider and driver.
  fn get_ride(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<RideRow>, Self::Error>> + Send + '_;

  /// The page of rides selected by `query`, each joined with its rider and
  /// driver, and annotated with a distance when distance sorting is active.
  fn find_rides(
    &self,
    query: RideQuery,
  ) -> impl Future<Output = Result<Vec<RideRow>, Self::Error>> + Send + '_;

  /// Number of rides matching the filters of `query`; sort and page are
  /// ignored.
  fn count_rides(
    &self,
    query: RideQuery,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Apply a lifecycle transition and append its audit event in a single
  /// transaction. `acting_user` is the authenticated requester.
  fn transition(
    &self,
    ride_id: i64,
    transition: Transition,
    acting_user: Option<i64>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<TransitionOutcome, Self::Error>> + Send + '_;

  // ── Events ────────────────────────────────────────────────────────────

  /// Append a historical event. Fails if the ride does not exist.
  fn append_event(
    &self,
    input: NewRideEvent,
  ) -> impl Future<Output = Result<RideEvent, Self::Error>> + Send + '_;

  /// Events belonging to any of `ride_ids`, oldest first, each joined with its
  /// acting user. With `since`, only events created at or after it.
  fn events_for_rides(
    &self,
    ride_ids: Vec<i64>,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<EventRow>, Self::Error>> + Send + '_;

  /// Events newest first, optionally restricted to one ride.
  fn list_events(
    &self,
    ride_id: Option<i64>,
    page: PageRequest,
  ) -> impl Future<Output = Result<Vec<EventRow>, Self::Error>> + Send + '_;

  fn count_events(
    &self,
    ride_id: Option<i64>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn get_event(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<EventRow>, Self::Error>> + Send + '_;
}
