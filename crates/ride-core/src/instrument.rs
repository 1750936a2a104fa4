//! Round-trip counting for store access.
//!
//! [`CountingStore`] wraps a borrowed [`RideStore`] and counts every call made
//! through it. Since each read method of a store is a single round trip, the
//! count is the number of queries the wrapped work issued. Create one wrapper
//! per measurement; counters are never shared between wrappers.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::{
  event::{NewRideEvent, RideEvent},
  lifecycle::{Transition, TransitionOutcome},
  query::{PageRequest, RideQuery},
  ride::{NewRide, Ride},
  store::RideStore,
  user::{NewUser, User},
  view::{EventRow, RideRow},
};

/// A [`RideStore`] decorator that counts calls to the inner store.
#[derive(Debug)]
pub struct CountingStore<'a, S> {
  inner:       &'a S,
  round_trips: AtomicU64,
}

impl<'a, S: RideStore> CountingStore<'a, S> {
  pub fn new(inner: &'a S) -> Self {
    Self { inner, round_trips: AtomicU64::new(0) }
  }

  /// Calls made through this wrapper so far.
  pub fn round_trips(&self) -> u64 { self.round_trips.load(Ordering::Relaxed) }

  fn hit(&self, method: &'static str) {
    let n = self.round_trips.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::trace!(method, round_trip = n, "store call");
  }
}

impl<S: RideStore> RideStore for CountingStore<'_, S> {
  type Error = S::Error;

  async fn add_user(&self, input: NewUser) -> Result<User, Self::Error> {
    self.hit("add_user");
    self.inner.add_user(input).await
  }

  async fn get_user(&self, id: i64) -> Result<Option<User>, Self::Error> {
    self.hit("get_user");
    self.inner.get_user(id).await
  }

  async fn list_users(&self, page: PageRequest) -> Result<Vec<User>, Self::Error> {
    self.hit("list_users");
    self.inner.list_users(page).await
  }

  async fn count_users(&self) -> Result<u64, Self::Error> {
    self.hit("count_users");
    self.inner.count_users().await
  }

  async fn create_ride(
    &self,
    input: NewRide,
  ) -> Result<(Ride, RideEvent), Self::Error> {
    self.hit("create_ride");
    self.inner.create_ride(input).await
  }

  async fn get_ride(&self, id: i64) -> Result<Option<RideRow>, Self::Error> {
    self.hit("get_ride");
    self.inner.get_ride(id).await
  }

  async fn find_rides(&self, query: RideQuery) -> Result<Vec<RideRow>, Self::Error> {
    self.hit("find_rides");
    self.inner.find_rides(query).await
  }

  async fn count_rides(&self, query: RideQuery) -> Result<u64, Self::Error> {
    self.hit("count_rides");
    self.inner.count_rides(query).await
  }

  async fn transition(
    &self,
    ride_id: i64,
    transition: Transition,
    acting_user: Option<i64>,
    at: DateTime<Utc>,
  ) -> Result<TransitionOutcome, Self::Error> {
    self.hit("transition");
    self.inner.transition(ride_id, transition, acting_user, at).await
  }

  async fn append_event(&self, input: NewRideEvent) -> Result<RideEvent, Self::Error> {
    self.hit("append_event");
    self.inner.append_event(input).await
  }

  async fn events_for_rides(
    &self,
    ride_ids: Vec<i64>,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<EventRow>, Self::Error> {
    self.hit("events_for_rides");
    self.inner.events_for_rides(ride_ids, since).await
  }

  async fn list_events(
    &self,
    ride_id: Option<i64>,
    page: PageRequest,
  ) -> Result<Vec<EventRow>, Self::Error> {
    self.hit("list_events");
    self.inner.list_events(ride_id, page).await
  }

  async fn count_events(&self, ride_id: Option<i64>) -> Result<u64, Self::Error> {
    self.hit("count_events");
    self.inner.count_events(ride_id).await
  }

  async fn get_event(&self, id: i64) -> Result<Option<EventRow>, Self::Error> {
    self.hit("get_event");
    self.inner.get_event(id).await
  }
}
