//! Handlers for `/rides` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/rides` | Filters, distance sort, ordering, pagination |
//! | `POST` | `/rides` | Body: rider, pickup/dropoff coordinates, pickup time |
//! | `GET`  | `/rides/query-stats` | Like `/rides`, plus round-trip count |
//! | `GET`  | `/rides/:id` | 404 if not found |
//! | `POST` | `/rides/:id/cancel` | |
//! | `POST` | `/rides/:id/start` | Body: `{"driver_id": 7}` (int or numeric string) |
//! | `POST` | `/rides/:id/complete` | |
//! | `GET`  | `/rides/:id/events` | Full history, newest first, unpaginated |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ride_core::{
  engine::{self, InstrumentedPage},
  event::RideEvent,
  lifecycle::Transition,
  query::{Page, RideListParams, RideQuery},
  ride::NewRide,
  store::RideStore,
  view::{RideEventView, RideView},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ApiPath, AppState, auth::AdminCaller, error::ApiError, json_body};

async fn load_view<S: RideStore>(
  store: &S,
  id: i64,
) -> Result<RideView, ApiError> {
  engine::ride_detail(store, id, Utc::now())
    .await
    .map_err(ApiError::from_store)?
    .ok_or(ApiError::Domain(ride_core::Error::RideNotFound(id)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /rides`
pub async fn list<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
  Query(params): Query<RideListParams>,
) -> Result<Json<Page<RideView>>, ApiError> {
  let query = RideQuery::from_params(&params);
  let page = engine::list_rides(&*state.store, query, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(page))
}

/// `GET /rides/query-stats`
pub async fn query_stats<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
  Query(params): Query<RideListParams>,
) -> Result<Json<InstrumentedPage>, ApiError> {
  let query = RideQuery::from_params(&params);
  let page = engine::list_rides_with_stats(&*state.store, query, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(page))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub rider_id:          i64,
  pub pickup_latitude:   f64,
  pub pickup_longitude:  f64,
  #[serde(default)]
  pub dropoff_latitude:  f64,
  #[serde(default)]
  pub dropoff_longitude: f64,
  pub pickup_time:       DateTime<Utc>,
}

/// `POST /rides`
pub async fn create<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
  let body: CreateBody = json_body(&body)?;
  let (ride, _) = state
    .store
    .create_ride(NewRide {
      rider_id:          body.rider_id,
      pickup_latitude:   body.pickup_latitude,
      pickup_longitude:  body.pickup_longitude,
      dropoff_latitude:  body.dropoff_latitude,
      dropoff_longitude: body.dropoff_longitude,
      pickup_time:       body.pickup_time,
    })
    .await
    .map_err(ApiError::from_store)?;

  let view = load_view(&*state.store, ride.id).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /rides/:id`
pub async fn get_one<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
  ApiPath(id): ApiPath<i64>,
) -> Result<Json<RideView>, ApiError> {
  Ok(Json(load_view(&*state.store, id).await?))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
  pub status: &'static str,
  pub ride:   RideView,
  pub event:  RideEvent,
}

async fn run_transition<S: RideStore>(
  state: &AppState<S>,
  caller: &AdminCaller,
  id: i64,
  transition: Transition,
) -> Result<Json<TransitionResponse>, ApiError> {
  let outcome = state
    .store
    .transition(id, transition, Some(caller.0.id), Utc::now())
    .await
    .map_err(ApiError::from_store)?;

  let ride = load_view(&*state.store, id).await?;
  Ok(Json(TransitionResponse {
    status: transition.confirmation(),
    ride,
    event: outcome.event,
  }))
}

/// `POST /rides/:id/cancel`
pub async fn cancel<S: RideStore>(
  State(state): State<AppState<S>>,
  admin: AdminCaller,
  ApiPath(id): ApiPath<i64>,
) -> Result<Json<TransitionResponse>, ApiError> {
  run_transition(&state, &admin, id, Transition::Cancel).await
}

#[derive(Debug, Default, Deserialize)]
pub struct StartBody {
  #[serde(default)]
  pub driver_id: Value,
}

/// Read `driver_id` leniently. Missing, `null`, `""` and `0` all mean "not
/// supplied"; the lifecycle rejects that after checking the ride's status.
fn driver_id(raw: &Value) -> Result<Option<i64>, ApiError> {
  let invalid = || {
    ApiError::Domain(ride_core::Error::Validation(
      "Driver ID must be an integer".into(),
    ))
  };
  let id = match raw {
    Value::Null => None,
    Value::Number(n) => Some(n.as_i64().ok_or_else(invalid)?),
    Value::String(s) if s.trim().is_empty() => None,
    Value::String(s) => Some(s.trim().parse::<i64>().map_err(|_| invalid())?),
    _ => return Err(invalid()),
  };
  Ok(id.filter(|id| *id != 0))
}

/// `POST /rides/:id/start`
pub async fn start<S: RideStore>(
  State(state): State<AppState<S>>,
  admin: AdminCaller,
  ApiPath(id): ApiPath<i64>,
  body: Bytes,
) -> Result<Json<TransitionResponse>, ApiError> {
  let body: StartBody = json_body(&body)?;
  let driver_id = driver_id(&body.driver_id)?;
  run_transition(&state, &admin, id, Transition::Start { driver_id }).await
}

/// `POST /rides/:id/complete`
pub async fn complete<S: RideStore>(
  State(state): State<AppState<S>>,
  admin: AdminCaller,
  ApiPath(id): ApiPath<i64>,
) -> Result<Json<TransitionResponse>, ApiError> {
  run_transition(&state, &admin, id, Transition::Complete).await
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /rides/:id/events`
///
/// Returns every event of the ride as a plain list, newest first.
pub async fn history<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
  ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<RideEventView>>, ApiError> {
  let store = &*state.store;
  if store.get_ride(id).await.map_err(ApiError::from_store)?.is_none() {
    return Err(ride_core::Error::RideNotFound(id).into());
  }

  let rows = store
    .events_for_rides(vec![id], None)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows.into_iter().rev().map(RideEventView::from).collect()))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn driver_id_is_lenient() {
    assert_eq!(driver_id(&json!(7)).unwrap(), Some(7));
    assert_eq!(driver_id(&json!("7")).unwrap(), Some(7));
    assert_eq!(driver_id(&json!(" 12 ")).unwrap(), Some(12));
    assert_eq!(driver_id(&json!(null)).unwrap(), None);
    assert_eq!(driver_id(&json!("")).unwrap(), None);
    assert_eq!(driver_id(&json!(0)).unwrap(), None);
    assert_eq!(driver_id(&json!("0")).unwrap(), None);
    assert!(driver_id(&json!("seven")).is_err());
    assert!(driver_id(&json!(1.5)).is_err());
    assert!(driver_id(&json!([7])).is_err());
  }
}
