//! Handlers for the read-only `/events` log.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/events` | Optional `?ride_id=`, newest first, paginated |
//! | `GET`  | `/events/:id` | 404 if not found |

use axum::{
  Json,
  extract::{Query, State},
};
use ride_core::{query::Page, store::RideStore, view::RideEventView};
use serde::Deserialize;

use crate::{ApiPath, AppState, PageParams, auth::AdminCaller, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub ride_id:   Option<String>,
  #[serde(flatten)]
  pub page:      PageParams,
}

impl ListParams {
  /// The ride filter, if one was given and parses. Anything else lists every
  /// event.
  fn ride_id(&self) -> Option<i64> {
    let raw = self.ride_id.as_deref()?.trim();
    if raw.is_empty() {
      return None;
    }
    match raw.parse() {
      Ok(id) => Some(id),
      Err(_) => {
        tracing::debug!(ride_id = raw, "ignoring unparseable ride filter");
        None
      }
    }
  }
}

/// `GET /events[?ride_id=<id>]`
pub async fn list<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<RideEventView>>, ApiError> {
  let ride_id = params.ride_id();
  let request = params.page.request();
  let count = state
    .store
    .count_events(ride_id)
    .await
    .map_err(ApiError::from_store)?;
  let rows = state
    .store
    .list_events(ride_id, request)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Page::new(request, count, rows).map(RideEventView::from)))
}

/// `GET /events/:id`
pub async fn get_one<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
  ApiPath(id): ApiPath<i64>,
) -> Result<Json<RideEventView>, ApiError> {
  let row = state
    .store
    .get_event(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(ride_core::Error::EventNotFound(id))?;
  Ok(Json(row.into()))
}
