//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure is rendered as `{"error": {"kind": …, "message": …}}`.

use axum::{
  Json,
  extract::rejection::PathRejection,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use ride_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Domain(#[from] ride_core::Error),

  /// The request body was not the JSON we expected.
  #[error("malformed request body: {0}")]
  BadBody(String),

  /// A path parameter did not parse, e.g. `/rides/abc`.
  #[error("invalid path: {0}")]
  BadPath(#[from] PathRejection),

  #[error("{0}")]
  Unauthorized(&'static str),

  #[error("{0}")]
  Forbidden(&'static str),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store error: domain failures keep their kind, anything else
  /// is internal.
  pub fn from_store<E: StoreError>(err: E) -> Self {
    match err.domain() {
      Some(domain) => Self::Domain(domain.clone()),
      None => {
        tracing::error!(error = %err, "store failure");
        Self::Store(Box::new(err))
      }
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Domain(e) => e.kind(),
      Self::BadBody(_) | Self::BadPath(_) => "validation_error",
      Self::Unauthorized(_) | Self::Forbidden(_) => "authorization_error",
      Self::Store(_) => "internal_error",
    }
  }

  pub fn status(&self) -> StatusCode {
    use ride_core::Error as E;
    match self {
      Self::Domain(E::Validation(_) | E::InvalidTransition { .. }) => {
        StatusCode::BAD_REQUEST
      }
      Self::Domain(
        E::UserNotFound(_) | E::RideNotFound(_) | E::EventNotFound(_),
      ) => StatusCode::NOT_FOUND,
      Self::Domain(E::UnknownStatus(_) | E::UnknownRole(_)) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      Self::BadBody(_) | Self::BadPath(_) => StatusCode::BAD_REQUEST,
      Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      Self::Forbidden(_) => StatusCode::FORBIDDEN,
      Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = json!({
      "error": { "kind": self.kind(), "message": self.to_string() }
    });
    let mut res = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Token"));
    }
    res
  }
}
