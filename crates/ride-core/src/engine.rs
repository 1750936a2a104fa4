//! The ride query engine.
//!
//! A page of rides is assembled from a fixed number of round trips no matter
//! how many rides it holds or how much history they have:
//!
//! 1. count the rides matching the filters,
//! 2. load the page of rides joined with rider and driver,
//! 3. load the events of exactly those rides from the trailing window, joined
//!    with their acting user, and group them onto their ride in memory.
//!
//! Step 3 is skipped when the page is empty.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
  instrument::CountingStore,
  query::{Page, RideQuery},
  store::RideStore,
  view::{EventRow, RideEventView, RideRow, RideView},
};

/// How far back `todays_ride_events` reaches, in hours.
pub const EVENT_WINDOW_HOURS: i64 = 24;

/// Rides sampled by [`performance_report`].
pub const REPORT_SAMPLE: u32 = 10;

/// Start of the event window ending at `now`.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
  now - Duration::hours(EVENT_WINDOW_HOURS)
}

/// Attach events to their rides, preserving ride order and event order.
fn assemble(rows: Vec<RideRow>, events: Vec<EventRow>) -> Vec<RideView> {
  let mut by_ride: HashMap<i64, Vec<RideEventView>> = HashMap::new();
  for row in events {
    by_ride
      .entry(row.event.ride_id)
      .or_default()
      .push(row.into());
  }
  rows
    .into_iter()
    .map(|row| {
      let events = by_ride.remove(&row.ride.id).unwrap_or_default();
      RideView::new(row, events)
    })
    .collect()
}

/// Load rides and their events from `since` (all events when `None`).
/// Two round trips, or one if there are no rides.
async fn load_with_events<S: RideStore>(
  store: &S,
  query: RideQuery,
  since: Option<DateTime<Utc>>,
) -> Result<Vec<RideView>, S::Error> {
  let rows = store.find_rides(query).await?;
  if rows.is_empty() {
    return Ok(Vec::new());
  }
  let ids = rows.iter().map(|r| r.ride.id).collect();
  let events = store.events_for_rides(ids, since).await?;
  Ok(assemble(rows, events))
}

/// `GET /rides`: one page of rides with their recent events.
pub async fn list_rides<S: RideStore>(
  store: &S,
  query: RideQuery,
  now: DateTime<Utc>,
) -> Result<Page<RideView>, S::Error> {
  let request = query.page;
  let count = store.count_rides(query.clone()).await?;
  let results = load_with_events(store, query, Some(window_start(now))).await?;
  tracing::debug!(count, returned = results.len(), "listed rides");
  Ok(Page::new(request, count, results))
}

/// `GET /rides/{id}`: one ride with its recent events, or `None`.
pub async fn ride_detail<S: RideStore>(
  store: &S,
  id: i64,
  now: DateTime<Utc>,
) -> Result<Option<RideView>, S::Error> {
  let Some(row) = store.get_ride(id).await? else {
    return Ok(None);
  };
  let events = store
    .events_for_rides(vec![id], Some(window_start(now)))
    .await?;
  Ok(assemble(vec![row], events).pop())
}

// ─── Instrumented views ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryStats {
  pub total_queries: u64,
}

/// A ride page together with the round trips it took to build.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentedPage {
  #[serde(flatten)]
  pub page:        Page<RideView>,
  pub query_stats: QueryStats,
}

/// [`list_rides`], counting the round trips it issues.
pub async fn list_rides_with_stats<S: RideStore>(
  store: &S,
  query: RideQuery,
  now: DateTime<Utc>,
) -> Result<InstrumentedPage, S::Error> {
  let counting = CountingStore::new(store);
  let page = list_rides(&counting, query, now).await?;
  Ok(InstrumentedPage {
    page,
    query_stats: QueryStats { total_queries: counting.round_trips() },
  })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseStats {
  pub total_rides:         u64,
  pub total_events:        u64,
  pub events_per_ride_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApproachStats {
  pub query_count:   u64,
  pub events_loaded: u64,
  pub description:   &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Improvement {
  pub query_reduction: String,
  pub data_reduction:  String,
}

/// Comparison of unbounded and window-bounded event loading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
  pub database_stats:       DatabaseStats,
  pub unoptimized_approach: ApproachStats,
  pub optimized_approach:   ApproachStats,
  pub improvement:          Improvement,
}

async fn measure<S: RideStore>(
  store: &S,
  since: Option<DateTime<Utc>>,
  description: &'static str,
) -> Result<ApproachStats, S::Error> {
  let counting = CountingStore::new(store);
  let rides =
    load_with_events(&counting, RideQuery::first(REPORT_SAMPLE), since).await?;
  let events_loaded = rides
    .iter()
    .map(|r| r.todays_ride_events.len() as u64)
    .sum();
  Ok(ApproachStats {
    query_count: counting.round_trips(),
    events_loaded,
    description,
  })
}

/// `GET /performance`: load the first [`REPORT_SAMPLE`] rides twice, once
/// with every event and once with only the trailing window, and compare.
///
/// Each approach is measured through its own [`CountingStore`], so the counts
/// reflect this call only. The totals are gathered outside the measurement.
pub async fn performance_report<S: RideStore>(
  store: &S,
  now: DateTime<Utc>,
) -> Result<PerformanceReport, S::Error> {
  let total_rides = store.count_rides(RideQuery::default()).await?;
  let total_events = store.count_events(None).await?;
  let events_per_ride_avg = if total_rides > 0 {
    total_events as f64 / total_rides as f64
  } else {
    0.0
  };

  let unoptimized =
    measure(store, None, "Loads ALL events for each ride").await?;
  let optimized = measure(
    store,
    Some(window_start(now)),
    "Loads ONLY events from last 24 hours",
  )
  .await?;

  let improvement = Improvement {
    query_reduction: format!(
      "{} fewer queries",
      unoptimized.query_count.saturating_sub(optimized.query_count)
    ),
    data_reduction:  format!(
      "{} fewer events loaded",
      unoptimized.events_loaded.saturating_sub(optimized.events_loaded)
    ),
  };

  tracing::info!(
    total_rides,
    total_events,
    unoptimized_events = unoptimized.events_loaded,
    optimized_events = optimized.events_loaded,
    "performance report"
  );

  Ok(PerformanceReport {
    database_stats: DatabaseStats {
      total_rides,
      total_events,
      events_per_ride_avg,
    },
    unoptimized_approach: unoptimized,
    optimized_approach: optimized,
    improvement,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    event::RideEvent,
    ride::{Ride, RideStatus},
    user::{Role, User},
  };

  fn user(id: i64) -> User {
    User {
      id,
      role: Role::User,
      first_name: "Test".into(),
      last_name: format!("User{id}"),
      email: format!("user{id}@example.com"),
      phone_number: String::new(),
      username: format!("user{id}"),
      is_active: true,
      is_staff: false,
      is_superuser: false,
      date_joined: Utc::now(),
      last_login: None,
    }
  }

  fn ride_row(id: i64) -> RideRow {
    let now = Utc::now();
    RideRow {
      ride:     Ride {
        id,
        status: RideStatus::Requested,
        rider_id: 1,
        driver_id: None,
        pickup_latitude: 0.0,
        pickup_longitude: 0.0,
        dropoff_latitude: 0.0,
        dropoff_longitude: 0.0,
        pickup_time: now,
        created_at: now,
        updated_at: now,
      },
      rider:    user(1),
      driver:   None,
      distance: None,
    }
  }

  fn event_row(id: i64, ride_id: i64) -> EventRow {
    EventRow {
      event: RideEvent {
        id,
        ride_id,
        description: "Ride requested".into(),
        old_status: None,
        new_status: RideStatus::Requested,
        user_id: Some(1),
        created_at: Utc::now(),
      },
      user:  Some(user(1)),
    }
  }

  #[test]
  fn assemble_groups_events_onto_their_rides() {
    let views = assemble(
      vec![ride_row(3), ride_row(1), ride_row(2)],
      vec![event_row(10, 1), event_row(11, 3), event_row(12, 1)],
    );

    let ids: Vec<_> = views.iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![3, 1, 2]);

    let event_ids = |i: usize| -> Vec<i64> {
      views[i].todays_ride_events.iter().map(|e| e.id).collect()
    };
    assert_eq!(event_ids(0), vec![11]);
    assert_eq!(event_ids(1), vec![10, 12]);
    assert!(event_ids(2).is_empty());
    assert_eq!(
      views[1].todays_ride_events[0].user.as_ref().map(|u| u.id),
      Some(1)
    );
  }

  #[test]
  fn window_is_a_day() {
    let now = Utc::now();
    assert_eq!(now - window_start(now), Duration::hours(24));
  }
}
