//! JSON REST API for ride dispatch records.
//!
//! Exposes an axum [`Router`] backed by any [`RideStore`]. Every route except
//! `/health` is restricted to administrators via [`auth::AdminCaller`].

pub mod auth;
pub mod error;
pub mod events;
pub mod rides;
pub mod system;
pub mod users;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::FromRequestParts,
  routing::{get, post},
};
use bytes::Bytes;
use ride_core::{query::PageRequest, store::RideStore};
use serde::{Deserialize, de::DeserializeOwned};
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  /// Hex SHA-256 token digest → user id.
  #[serde(default)]
  pub api_tokens: HashMap<String, i64>,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8000 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/ride/rides.db") }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), auth: Arc::clone(&self.auth) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RideStore + 'static,
{
  Router::new()
    // Rides
    .route("/rides", get(rides::list::<S>).post(rides::create::<S>))
    .route("/rides/query-stats", get(rides::query_stats::<S>))
    .route("/rides/{id}", get(rides::get_one::<S>))
    .route("/rides/{id}/cancel", post(rides::cancel::<S>))
    .route("/rides/{id}/start", post(rides::start::<S>))
    .route("/rides/{id}/complete", post(rides::complete::<S>))
    .route("/rides/{id}/events", get(rides::history::<S>))
    // Directory
    .route("/users", get(users::list::<S>))
    .route("/users/{id}", get(users::get_one::<S>))
    .route("/events", get(events::list::<S>))
    .route("/events/{id}", get(events::get_one::<S>))
    // System
    .route("/performance", get(system::performance::<S>))
    .route("/health", get(system::health))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Shared extract helpers ───────────────────────────────────────────────────

/// `?page=&page_size=` as sent by the client.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page:      Option<String>,
  pub page_size: Option<String>,
}

impl PageParams {
  pub fn request(&self) -> PageRequest {
    PageRequest::parse(self.page.as_deref(), self.page_size.as_deref())
  }
}

/// `axum::extract::Path` with its rejection rendered as an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Decode a JSON body, treating an empty body as `{}`.
///
/// Parsing by hand keeps malformed bodies inside the API's error envelope.
pub(crate) fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
  let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
    b"{}"
  } else {
    body
  };
  serde_json::from_slice(raw).map_err(|e| ApiError::BadBody(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::{Duration, Utc};
  use ride_core::{
    event::NewRideEvent,
    ride::{NewRide, RideStatus},
    user::{NewUser, Role, User},
  };
  use ride_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  const ADMIN_TOKEN: &str = "admin-token";
  const RIDER_TOKEN: &str = "rider-token";

  struct Fixture {
    state:  AppState<SqliteStore>,
    rider:  User,
    driver: User,
  }

  async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let admin = store
      .add_user(NewUser::admin("root", "root@example.com"))
      .await
      .unwrap();
    let rider = store
      .add_user(NewUser::new("alice", "alice@example.com", Role::User))
      .await
      .unwrap();
    let driver = store
      .add_user(
        NewUser::new("bob", "bob@example.com", Role::Driver).named("Bob", "Smith"),
      )
      .await
      .unwrap();

    let tokens = HashMap::from([
      (auth::token_digest(ADMIN_TOKEN), admin.id),
      (auth::token_digest(RIDER_TOKEN), rider.id),
    ]);

    Fixture {
      state: AppState {
        store: Arc::new(store),
        auth:  Arc::new(AuthConfig::new(tokens)),
      },
      rider,
      driver,
    }
  }

  async fn ride(fx: &Fixture) -> i64 {
    let (ride, _) = fx
      .state
      .store
      .create_ride(NewRide {
        rider_id:          fx.rider.id,
        pickup_latitude:   1.0,
        pickup_longitude:  1.0,
        dropoff_latitude:  2.0,
        dropoff_longitude: 2.0,
        pickup_time:       chrono::Utc::now(),
      })
      .await
      .unwrap();
    ride.id
  }

  async fn send(
    fx:     &Fixture,
    method: &str,
    uri:    &str,
    token:  Option<&str>,
    body:   &str,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    let resp = router(fx.state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn get(fx: &Fixture, uri: &str) -> (StatusCode, Value) {
    send(fx, "GET", uri, Some(ADMIN_TOKEN), "").await
  }

  async fn post(fx: &Fixture, uri: &str, body: &str) -> (StatusCode, Value) {
    send(fx, "POST", uri, Some(ADMIN_TOKEN), body).await
  }

  // ── Auth ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_needs_no_token() {
    let fx = fixture().await;
    let (status, body) = send(&fx, "GET", "/health", None, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
  }

  #[tokio::test]
  async fn missing_token_is_401_with_challenge() {
    let fx = fixture().await;
    let req = Request::builder().uri("/rides").body(Body::empty()).unwrap();
    let resp = router(fx.state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Token");

    let (status, body) = send(&fx, "GET", "/rides", Some("nope"), "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "authorization_error");
  }

  #[tokio::test]
  async fn non_admin_is_403() {
    let fx = fixture().await;
    let (status, body) = send(&fx, "GET", "/rides", Some(RIDER_TOKEN), "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "authorization_error");
  }

  // ── Rides ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_then_list() {
    let fx = fixture().await;
    let body = json!({
      "rider_id": fx.rider.id,
      "pickup_latitude": 40.7,
      "pickup_longitude": -74.0,
      "pickup_time": "2026-03-01T12:00:00Z",
    });
    let (status, created) = post(&fx, "/rides", &body.to_string()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "REQUESTED");
    assert_eq!(created["rider"]["id"], fx.rider.id);
    assert_eq!(created["todays_ride_events"][0]["description"], "Ride requested");

    let (status, page) = get(&fx, "/rides").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["id"], created["id"]);
    assert_eq!(page["next"], Value::Null);
  }

  #[tokio::test]
  async fn malformed_body_is_a_validation_error() {
    let fx = fixture().await;
    let (status, body) = post(&fx, "/rides", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation_error");
  }

  #[tokio::test]
  async fn unknown_rider_is_404() {
    let fx = fixture().await;
    let body = json!({
      "rider_id": 9999,
      "pickup_latitude": 0.0,
      "pickup_longitude": 0.0,
      "pickup_time": "2026-03-01T12:00:00Z",
    });
    let (status, body) = post(&fx, "/rides", &body.to_string()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
  }

  #[tokio::test]
  async fn lifecycle_over_http() {
    let fx = fixture().await;
    let id = ride(&fx).await;

    let (status, body) = post(&fx, &format!("/rides/{id}/start"), "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation_error");
    assert_eq!(body["error"]["message"], "Driver ID is required");

    let driver = format!(r#"{{"driver_id": "{}"}}"#, fx.driver.id);
    let (status, body) = post(&fx, &format!("/rides/{id}/start"), &driver).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Ride started");
    assert_eq!(body["ride"]["status"], "IN_PROGRESS");
    assert_eq!(body["ride"]["driver"]["id"], fx.driver.id);
    assert_eq!(body["event"]["description"], "Ride started with driver Bob Smith");

    let (status, body) = post(&fx, &format!("/rides/{id}/complete"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Ride completed");

    let (status, body) = post(&fx, &format!("/rides/{id}/cancel"), "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_transition");

    let (status, history) = get(&fx, &format!("/rides/{id}/events")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 3);
    assert_eq!(history[0]["new_status"], "COMPLETED");
    assert_eq!(history[2]["new_status"], "REQUESTED");
  }

  #[tokio::test]
  async fn history_is_not_truncated() {
    let fx = fixture().await;
    let id = ride(&fx).await;
    let two_days_ago = Utc::now() - Duration::days(2);
    for n in 0..200 {
      fx.state
        .store
        .append_event(NewRideEvent {
          ride_id:     id,
          description: format!("Status check {n}"),
          old_status:  Some(RideStatus::Requested),
          new_status:  RideStatus::Requested,
          user_id:     None,
          created_at:  two_days_ago + Duration::seconds(n),
        })
        .await
        .unwrap();
    }

    let (status, history) = get(&fx, &format!("/rides/{id}/events")).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 201);
    assert_eq!(history[0]["description"], "Ride requested");
    assert_eq!(history[1]["description"], "Status check 199");
    assert_eq!(history[200]["description"], "Status check 0");

    let (status, detail) = get(&fx, &format!("/rides/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["todays_ride_events"].as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn unparseable_id_is_a_validation_error() {
    let fx = fixture().await;
    for uri in ["/rides/abc", "/rides/abc/events", "/users/x", "/events/1.5"] {
      let (status, body) = get(&fx, uri).await;
      assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
      assert_eq!(body["error"]["kind"], "validation_error", "{uri}");
    }
    let (status, body) = post(&fx, "/rides/abc/cancel", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation_error");
  }

  #[tokio::test]
  async fn zero_driver_counts_as_missing() {
    let fx = fixture().await;
    let id = ride(&fx).await;
    let (status, body) =
      post(&fx, &format!("/rides/{id}/start"), r#"{"driver_id": 0}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation_error");
  }

  #[tokio::test]
  async fn missing_ride_is_404() {
    let fx = fixture().await;
    let (status, body) = get(&fx, "/rides/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");

    let (status, _) = post(&fx, "/rides/404/cancel", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn bad_coordinates_degrade_to_default_order() {
    let fx = fixture().await;
    ride(&fx).await;
    let (status, page) =
      get(&fx, "/rides?lat=abc&lng=0&sort_by_distance=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["distance"], Value::Null);
  }

  #[tokio::test]
  async fn query_stats_counts_round_trips() {
    let fx = fixture().await;
    ride(&fx).await;
    ride(&fx).await;
    let (status, body) = get(&fx, "/rides/query-stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query_stats"]["total_queries"], 3);
    assert_eq!(body["count"], 2);
  }

  // ── Directory ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn users_and_events_are_browsable() {
    let fx = fixture().await;
    let id = ride(&fx).await;

    let (status, users) = get(&fx, "/users?page_size=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users["count"], 3);
    assert_eq!(users["next"], 2);

    let (status, user) = get(&fx, &format!("/users/{}", fx.driver.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "driver");

    let (status, events) = get(&fx, &format!("/events?ride_id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events["count"], 1);
    let event_id = events["results"][0]["id"].as_i64().unwrap();

    let (status, event) = get(&fx, &format!("/events/{event_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["user"]["id"], fx.rider.id);

    let (status, _) = get(&fx, "/users/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── System ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn performance_report_shape() {
    let fx = fixture().await;
    ride(&fx).await;
    let (status, body) = get(&fx, "/performance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database_stats"]["total_rides"], 1);
    assert_eq!(body["optimized_approach"]["query_count"], 2);
    assert!(body["improvement"]["data_reduction"].is_string());
  }

  #[test]
  fn empty_body_reads_as_empty_object() {
    let v: Value = json_body(&Bytes::from_static(b"  ")).unwrap();
    assert_eq!(v, json!({}));
    assert!(matches!(
      json_body::<Value>(&Bytes::from_static(b"[")),
      Err(ApiError::BadBody(_))
    ));
  }
}
