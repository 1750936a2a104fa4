//! Operational endpoints.

use axum::{Json, extract::State};
use chrono::Utc;
use ride_core::{
  engine::{self, PerformanceReport},
  store::RideStore,
};
use serde_json::{Value, json};

use crate::{AppState, auth::AdminCaller, error::ApiError};

/// `GET /health`: liveness only, no auth, no store access.
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

/// `GET /performance`
pub async fn performance<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
) -> Result<Json<PerformanceReport>, ApiError> {
  let report = engine::performance_report(&*state.store, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(report))
}
