//! Token authentication and the admin-only extractor.
//!
//! Tokens are opaque strings presented as `Authorization: Token <key>` or
//! `Authorization: Bearer <key>`. The server only knows their SHA-256 digests,
//! each mapped to the id of the user it authenticates.

use std::collections::HashMap;

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use rand_core::{OsRng, RngCore as _};
use ride_core::{store::RideStore, user::User};
use sha2::{Digest as _, Sha256};

use crate::{AppState, error::ApiError};

/// Token digests accepted by this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  /// Lowercase hex SHA-256 digest → user id.
  tokens: HashMap<String, i64>,
}

impl AuthConfig {
  pub fn new(tokens: HashMap<String, i64>) -> Self {
    let tokens = tokens
      .into_iter()
      .map(|(digest, user_id)| (digest.trim().to_ascii_lowercase(), user_id))
      .collect();
    Self { tokens }
  }

  /// The user a raw token authenticates, if any.
  pub fn user_for(&self, token: &str) -> Option<i64> {
    self.tokens.get(&token_digest(token)).copied()
  }
}

/// Lowercase hex SHA-256 of `token`, the form stored in configuration.
pub fn token_digest(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

/// A fresh random 160-bit token, hex encoded.
pub fn generate_token() -> String {
  let mut bytes = [0u8; 20];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// The key from a `Token` or `Bearer` authorization header.
pub fn presented_token(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, key) = value.trim().split_once(' ')?;
  let key = key.trim();
  let known = scheme.eq_ignore_ascii_case("token")
    || scheme.eq_ignore_ascii_case("bearer");
  (known && !key.is_empty()).then_some(key)
}

/// An authenticated, active administrator. Handlers that take this only run
/// for admins.
#[derive(Debug, Clone)]
pub struct AdminCaller(pub User);

impl<S> FromRequestParts<AppState<S>> for AdminCaller
where
  S: RideStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = presented_token(&parts.headers).ok_or(ApiError::Unauthorized(
      "Authentication credentials were not provided.",
    ))?;

    let user_id = state
      .auth
      .user_for(token)
      .ok_or(ApiError::Unauthorized("Invalid token."))?;

    let user = state
      .store
      .get_user(user_id)
      .await
      .map_err(ApiError::from_store)?
      .filter(|u| u.is_active)
      .ok_or(ApiError::Unauthorized("User inactive or deleted."))?;

    if !user.is_admin() {
      tracing::debug!(user_id, "rejected non-admin caller");
      return Err(ApiError::Forbidden(
        "You do not have permission to perform this action.",
      ));
    }

    Ok(AdminCaller(user))
  }
}
