//! Handlers for the read-only `/users` directory.

use axum::{
  Json,
  extract::{Query, State},
};
use ride_core::{query::Page, store::RideStore, view::UserSummary};

use crate::{ApiPath, AppState, PageParams, auth::AdminCaller, error::ApiError};

/// `GET /users[?page=&page_size=]`, ordered by id.
pub async fn list<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
  Query(params): Query<PageParams>,
) -> Result<Json<Page<UserSummary>>, ApiError> {
  let request = params.request();
  let count = state.store.count_users().await.map_err(ApiError::from_store)?;
  let users = state
    .store
    .list_users(request)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Page::new(request, count, users).map(UserSummary::from)))
}

/// `GET /users/:id`
pub async fn get_one<S: RideStore>(
  State(state): State<AppState<S>>,
  _admin: AdminCaller,
  ApiPath(id): ApiPath<i64>,
) -> Result<Json<UserSummary>, ApiError> {
  let user = state
    .store
    .get_user(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(ride_core::Error::UserNotFound(id))?;
  Ok(Json(user.into()))
}
