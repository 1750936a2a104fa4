//! SQL text for the dynamic ride and event reads.
//!
//! Each builder returns one statement plus its positional parameters, so
//! every store read stays a single round trip.

use ride_core::query::{PageRequest, RideFilter, RideQuery, RideSort};
use rusqlite::types::Value;

use crate::encode::{
  EVENT_COLUMNS, EVENT_WIDTH, RIDE_COLUMNS, RIDE_WIDTH, USER_WIDTH, user_columns,
};

/// Column offsets in a row produced by [`select_rides`].
pub const RIDER_AT: usize = RIDE_WIDTH;
pub const DRIVER_AT: usize = RIDE_WIDTH + USER_WIDTH;
pub const DISTANCE_AT: usize = RIDE_WIDTH + 2 * USER_WIDTH;

/// Column offset of the acting user in a row produced by the event selects.
pub const ACTOR_AT: usize = EVENT_WIDTH;

/// A statement and its parameters.
#[derive(Debug)]
pub struct Statement {
  pub sql:    String,
  pub params: Vec<Value>,
}

impl Statement {
  fn bind(&mut self, value: Value) -> String {
    self.params.push(value);
    format!("?{}", self.params.len())
  }

  fn bind_page(&mut self, page: PageRequest) -> String {
    let limit = self.bind(Value::Integer(clamp_i64(page.limit())));
    let offset = self.bind(Value::Integer(clamp_i64(page.offset())));
    format!("LIMIT {limit} OFFSET {offset}")
  }
}

fn clamp_i64(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

const RIDE_FROM: &str = "FROM rides r
  JOIN users u ON u.user_id = r.rider_id
  LEFT JOIN users d ON d.user_id = r.driver_id";

fn where_clause(stmt: &mut Statement, filters: &[RideFilter]) -> String {
  let conds: Vec<String> = filters
    .iter()
    .map(|filter| match filter {
      RideFilter::Status(status) => {
        let p = stmt.bind(Value::Text(status.clone()));
        format!("r.status = {p}")
      }
      RideFilter::RiderEmailContains(needle) => {
        let p = stmt.bind(Value::Text(needle.clone()));
        format!("instr(lower(u.email), lower({p})) > 0")
      }
    })
    .collect();

  if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  }
}

/// Squared planar distance expression (or `NULL`) and the ordering terms.
fn sort_clause(stmt: &mut Statement, sort: &RideSort) -> (String, String) {
  let mut terms = Vec::new();

  let distance = match sort.distance_from {
    Some(origin) => {
      let lat = stmt.bind(Value::Real(origin.lat));
      let lng = stmt.bind(Value::Real(origin.lng));
      terms.push("distance_sq ASC".to_owned());
      format!(
        "((r.pickup_latitude - {lat}) * (r.pickup_latitude - {lat}) \
         + (r.pickup_longitude - {lng}) * (r.pickup_longitude - {lng}))"
      )
    }
    None => "NULL".to_owned(),
  };

  for order in &sort.order_by {
    let dir = if order.descending { "DESC" } else { "ASC" };
    terms.push(format!("r.{} {dir}", order.field.column()));
  }

  // Total order: break ties by id in the direction of the first explicit term.
  let descending = sort.order_by.first().is_none_or(|o| o.descending);
  terms.push(format!("r.ride_id {}", if descending { "DESC" } else { "ASC" }));

  (distance, terms.join(", "))
}

/// One page of rides joined with rider and driver.
pub fn select_rides(query: &RideQuery) -> Statement {
  let mut stmt = Statement { sql: String::new(), params: Vec::new() };
  let (distance, order) = sort_clause(&mut stmt, &query.sort);
  let filter = where_clause(&mut stmt, &query.filters);
  let page = stmt.bind_page(query.page);

  stmt.sql = format!(
    "SELECT {RIDE_COLUMNS}, {rider}, {driver}, {distance} AS distance_sq
     {RIDE_FROM}
     {filter}
     ORDER BY {order}
     {page}",
    rider = user_columns("u"),
    driver = user_columns("d"),
  );
  stmt
}

/// One ride joined with rider and driver, in the [`select_rides`] row shape.
pub fn select_ride(ride_id: i64) -> Statement {
  let mut stmt = Statement { sql: String::new(), params: Vec::new() };
  let id = stmt.bind(Value::Integer(ride_id));
  stmt.sql = format!(
    "SELECT {RIDE_COLUMNS}, {rider}, {driver}, NULL AS distance_sq
     {RIDE_FROM}
     WHERE r.ride_id = {id}",
    rider = user_columns("u"),
    driver = user_columns("d"),
  );
  stmt
}

/// Number of rides matching the filters of `query`.
pub fn count_rides(query: &RideQuery) -> Statement {
  let mut stmt = Statement { sql: String::new(), params: Vec::new() };
  let filter = where_clause(&mut stmt, &query.filters);
  stmt.sql = format!("SELECT COUNT(*) {RIDE_FROM} {filter}");
  stmt
}

const EVENT_FROM: &str =
  "FROM ride_events e LEFT JOIN users a ON a.user_id = e.user_id";

/// Events of the given rides, oldest first, optionally bounded below.
pub fn select_events_for_rides(
  ride_ids: &[i64],
  since: Option<String>,
) -> Statement {
  let mut stmt = Statement { sql: String::new(), params: Vec::new() };
  let ids = ride_ids
    .iter()
    .map(|id| stmt.bind(Value::Integer(*id)))
    .collect::<Vec<_>>()
    .join(", ");
  let bound = match since {
    Some(since) => {
      let p = stmt.bind(Value::Text(since));
      format!("AND e.created_at >= {p}")
    }
    None => String::new(),
  };
  stmt.sql = format!(
    "SELECT {EVENT_COLUMNS}, {actor}
     {EVENT_FROM}
     WHERE e.ride_id IN ({ids}) {bound}
     ORDER BY e.created_at ASC, e.event_id ASC",
    actor = user_columns("a"),
  );
  stmt
}

/// A page of events, newest first, optionally restricted to one ride.
pub fn select_events(ride_id: Option<i64>, page: PageRequest) -> Statement {
  let mut stmt = Statement { sql: String::new(), params: Vec::new() };
  let filter = match ride_id {
    Some(id) => format!("WHERE e.ride_id = {}", stmt.bind(Value::Integer(id))),
    None => String::new(),
  };
  let page = stmt.bind_page(page);
  stmt.sql = format!(
    "SELECT {EVENT_COLUMNS}, {actor}
     {EVENT_FROM}
     {filter}
     ORDER BY e.created_at DESC, e.event_id DESC
     {page}",
    actor = user_columns("a"),
  );
  stmt
}

/// One event with its acting user.
pub fn select_event(event_id: i64) -> Statement {
  let mut stmt = Statement { sql: String::new(), params: Vec::new() };
  let id = stmt.bind(Value::Integer(event_id));
  stmt.sql = format!(
    "SELECT {EVENT_COLUMNS}, {actor} {EVENT_FROM} WHERE e.event_id = {id}",
    actor = user_columns("a"),
  );
  stmt
}

pub fn count_events(ride_id: Option<i64>) -> Statement {
  let mut stmt = Statement { sql: String::new(), params: Vec::new() };
  let filter = match ride_id {
    Some(id) => format!("WHERE ride_id = {}", stmt.bind(Value::Integer(id))),
    None => String::new(),
  };
  stmt.sql = format!("SELECT COUNT(*) FROM ride_events {filter}");
  stmt
}

#[cfg(test)]
mod tests {
  use ride_core::query::{OrderBy, OrderField, Origin, RideListParams};

  use super::*;

  #[test]
  fn default_ride_select_orders_newest_first() {
    let stmt = select_rides(&RideQuery::default());
    assert!(stmt.sql.contains("ORDER BY r.created_at DESC, r.ride_id DESC"));
    assert!(!stmt.sql.contains("WHERE"));
    // limit + offset
    assert_eq!(stmt.params.len(), 2);
  }

  #[test]
  fn filters_bind_in_order() {
    let query = RideQuery::from_params(&RideListParams {
      status: Some("completed".into()),
      rider_email: Some("bob".into()),
      ..Default::default()
    });
    let stmt = count_rides(&query);
    assert!(stmt.sql.contains("r.status = ?1 AND instr(lower(u.email), lower(?2)) > 0"));
    assert_eq!(stmt.params, vec![
      Value::Text("COMPLETED".into()),
      Value::Text("bob".into()),
    ]);
  }

  #[test]
  fn distance_sort_comes_first() {
    let query = RideQuery {
      sort: RideSort {
        distance_from: Some(Origin { lat: 1.0, lng: 2.0 }),
        order_by:      vec![OrderBy { field: OrderField::PickupTime, descending: false }],
      },
      ..Default::default()
    };
    let stmt = select_rides(&query);
    assert!(stmt.sql.contains("ORDER BY distance_sq ASC, r.pickup_time ASC, r.ride_id ASC"));
    assert_eq!(stmt.params[0], Value::Real(1.0));
    assert_eq!(stmt.params[1], Value::Real(2.0));
  }

  #[test]
  fn bounded_event_select_adds_lower_bound() {
    let stmt = select_events_for_rides(&[4, 5], Some("2026-01-01T00:00:00.000000Z".into()));
    assert!(stmt.sql.contains("e.ride_id IN (?1, ?2) AND e.created_at >= ?3"));
    let unbounded = select_events_for_rides(&[4], None);
    assert!(!unbounded.sql.contains("created_at >="));
  }
}
