//! [`SqliteStore`]: the SQLite implementation of [`RideStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params_from_iter};

use ride_core::{
  event::{NewRideEvent, RideEvent},
  lifecycle::{REQUESTED_DESCRIPTION, Transition, TransitionOutcome},
  query::{PageRequest, RideQuery},
  ride::{NewRide, Ride, RideStatus},
  store::RideStore,
  user::{NewUser, User},
  view::{EventRow, RideRow},
};

use crate::{
  Result,
  encode::{
    RIDE_COLUMNS, RawEvent, RawRide, RawUser, decode_count, encode_dt,
    truncate_dt, user_columns,
  },
  schema::SCHEMA,
  sql::{self, ACTOR_AT, DISTANCE_AT, DRIVER_AT, RIDER_AT, Statement},
};

// ─── Row types ───────────────────────────────────────────────────────────────

/// A ride row joined with rider and driver, as produced by [`sql::select_rides`].
struct RawRideRow {
  ride:        RawRide,
  rider:       RawUser,
  driver:      Option<RawUser>,
  distance_sq: Option<f64>,
}

impl RawRideRow {
  fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ride:        RawRide::read(row, 0)?,
      rider:       RawUser::read(row, RIDER_AT)?,
      driver:      RawUser::read_optional(row, DRIVER_AT)?,
      distance_sq: row.get(DISTANCE_AT)?,
    })
  }

  fn into_row(self) -> Result<RideRow> {
    Ok(RideRow {
      ride:     self.ride.into_ride()?,
      rider:    self.rider.into_user()?,
      driver:   self.driver.map(RawUser::into_user).transpose()?,
      distance: self.distance_sq.map(f64::sqrt),
    })
  }
}

/// An event row joined with its acting user.
struct RawEventRow {
  event: RawEvent,
  actor: Option<RawUser>,
}

impl RawEventRow {
  fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event: RawEvent::read(row, 0)?,
      actor: RawUser::read_optional(row, ACTOR_AT)?,
    })
  }

  fn into_row(self) -> Result<EventRow> {
    Ok(EventRow {
      event: self.event.into_event()?,
      user:  self.actor.map(RawUser::into_user).transpose()?,
    })
  }
}

// ─── Transaction bodies ──────────────────────────────────────────────────────

fn load_user(conn: &Connection, id: i64) -> Result<Option<User>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM users u WHERE u.user_id = ?1", user_columns("u")),
      [id],
      |row| RawUser::read(row, 0),
    )
    .optional()?;
  raw.map(RawUser::into_user).transpose()
}

fn ride_exists(conn: &Connection, id: i64) -> Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM rides WHERE ride_id = ?1", [id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

/// Insert a `REQUESTED` ride and its initial event atomically.
fn insert_ride(
  conn: &mut Connection,
  input: &NewRide,
  at: DateTime<Utc>,
) -> Result<(Ride, RideEvent)> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  if load_user(&tx, input.rider_id)?.is_none() {
    return Err(ride_core::Error::UserNotFound(input.rider_id).into());
  }

  let pickup_time = truncate_dt(input.pickup_time)?;
  let at_str = encode_dt(at);
  tx.execute(
    "INSERT INTO rides (
       status, rider_id, driver_id,
       pickup_latitude, pickup_longitude, dropoff_latitude, dropoff_longitude,
       pickup_time, created_at, updated_at
     ) VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
    rusqlite::params![
      RideStatus::Requested.as_str(),
      input.rider_id,
      input.pickup_latitude,
      input.pickup_longitude,
      input.dropoff_latitude,
      input.dropoff_longitude,
      encode_dt(pickup_time),
      at_str,
    ],
  )?;
  let ride_id = tx.last_insert_rowid();

  tx.execute(
    "INSERT INTO ride_events (ride_id, description, old_status, new_status, user_id, created_at)
     VALUES (?1, ?2, NULL, ?3, ?4, ?5)",
    rusqlite::params![
      ride_id,
      REQUESTED_DESCRIPTION,
      RideStatus::Requested.as_str(),
      input.rider_id,
      at_str,
    ],
  )?;
  let event_id = tx.last_insert_rowid();
  tx.commit()?;

  let ride = Ride {
    id: ride_id,
    status: RideStatus::Requested,
    rider_id: input.rider_id,
    driver_id: None,
    pickup_latitude: input.pickup_latitude,
    pickup_longitude: input.pickup_longitude,
    dropoff_latitude: input.dropoff_latitude,
    dropoff_longitude: input.dropoff_longitude,
    pickup_time,
    created_at: at,
    updated_at: at,
  };
  let event = RideEvent {
    id:          event_id,
    ride_id,
    description: REQUESTED_DESCRIPTION.to_owned(),
    old_status:  None,
    new_status:  RideStatus::Requested,
    user_id:     Some(input.rider_id),
    created_at:  at,
  };
  Ok((ride, event))
}

/// Validate and apply a transition inside one `IMMEDIATE` transaction.
///
/// The write lock is held from the status read to the commit, and the update
/// is additionally conditional on the status that was read. Any error drops
/// the transaction, rolling back both writes.
fn apply_transition(
  conn: &mut Connection,
  ride_id: i64,
  transition: Transition,
  acting_user: Option<i64>,
  at: DateTime<Utc>,
) -> Result<TransitionOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let ride = tx
    .query_row(
      &format!("SELECT {RIDE_COLUMNS} FROM rides r WHERE r.ride_id = ?1"),
      [ride_id],
      |row| RawRide::read(row, 0),
    )
    .optional()?
    .ok_or(ride_core::Error::RideNotFound(ride_id))?
    .into_ride()?;

  let from = ride.status;
  let to = transition.validate(from)?;

  let driver = match transition {
    Transition::Start { driver_id: Some(id) } => {
      Some(load_user(&tx, id)?.ok_or(ride_core::Error::UserNotFound(id))?)
    }
    _ => None,
  };

  let actor = transition.actor(acting_user, &ride);
  let description = transition.describe(driver.as_ref());
  let driver_id = driver.as_ref().map(|d| d.id).or(ride.driver_id);
  let at_str = encode_dt(at);

  let changed = tx.execute(
    "UPDATE rides SET status = ?1, driver_id = ?2, updated_at = ?3
     WHERE ride_id = ?4 AND status = ?5",
    rusqlite::params![to.as_str(), driver_id, at_str, ride_id, from.as_str()],
  )?;
  if changed != 1 {
    return Err(
      ride_core::Error::InvalidTransition { action: transition.action(), from }
        .into(),
    );
  }

  tx.execute(
    "INSERT INTO ride_events (ride_id, description, old_status, new_status, user_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      ride_id,
      description,
      from.as_str(),
      to.as_str(),
      actor,
      at_str
    ],
  )?;
  let event_id = tx.last_insert_rowid();
  tx.commit()?;

  let event = RideEvent {
    id: event_id,
    ride_id,
    description,
    old_status: Some(from),
    new_status: to,
    user_id: actor,
    created_at: at,
  };
  let ride = Ride { status: to, driver_id, updated_at: at, ..ride };
  Ok(TransitionOutcome { ride, event })
}

fn insert_event(conn: &mut Connection, input: &NewRideEvent) -> Result<RideEvent> {
  let tx = conn.transaction()?;
  if !ride_exists(&tx, input.ride_id)? {
    return Err(ride_core::Error::RideNotFound(input.ride_id).into());
  }

  let created_at = truncate_dt(input.created_at)?;
  tx.execute(
    "INSERT INTO ride_events (ride_id, description, old_status, new_status, user_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      input.ride_id,
      input.description,
      input.old_status.map(RideStatus::as_str),
      input.new_status.as_str(),
      input.user_id,
      encode_dt(created_at),
    ],
  )?;
  let id = tx.last_insert_rowid();
  tx.commit()?;

  Ok(RideEvent {
    id,
    ride_id: input.ride_id,
    description: input.description.clone(),
    old_status: input.old_status,
    new_status: input.new_status,
    user_id: input.user_id,
    created_at,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A ride store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls are
/// executed in order on the connection's dedicated thread.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("sqlite schema ready");
    Ok(())
  }

  async fn query_rides(&self, stmt: Statement) -> Result<Vec<RideRow>> {
    let raws: Vec<RawRideRow> = self
      .conn
      .call(move |conn| {
        let mut prepared = conn.prepare(&stmt.sql)?;
        let rows = prepared
          .query_map(params_from_iter(stmt.params.iter()), RawRideRow::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRideRow::into_row).collect()
  }

  async fn query_events(&self, stmt: Statement) -> Result<Vec<EventRow>> {
    let raws: Vec<RawEventRow> = self
      .conn
      .call(move |conn| {
        let mut prepared = conn.prepare(&stmt.sql)?;
        let rows = prepared
          .query_map(params_from_iter(stmt.params.iter()), RawEventRow::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEventRow::into_row).collect()
  }

  async fn query_count(&self, stmt: Statement) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &stmt.sql,
          params_from_iter(stmt.params.iter()),
          |row| row.get(0),
        )?)
      })
      .await?;
    decode_count(n)
  }
}

// ─── RideStore impl ──────────────────────────────────────────────────────────

impl RideStore for SqliteStore {
  type Error = crate::Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let date_joined = truncate_dt(Utc::now())?;
    let joined_str = encode_dt(date_joined);
    let row = input.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (
             role, first_name, last_name, email, phone_number, username,
             is_active, is_staff, is_superuser, date_joined, last_login
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL)",
          rusqlite::params![
            row.role.as_str(),
            row.first_name,
            row.last_name,
            row.email,
            row.phone_number,
            row.username,
            row.is_active,
            row.is_staff,
            row.is_superuser,
            joined_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    tracing::debug!(user_id = id, username = %input.username, "user added");

    Ok(User {
      id,
      role: input.role,
      first_name: input.first_name,
      last_name: input.last_name,
      email: input.email,
      phone_number: input.phone_number,
      username: input.username,
      is_active: input.is_active,
      is_staff: input.is_staff,
      is_superuser: input.is_superuser,
      date_joined,
      last_login: None,
    })
  }

  async fn get_user(&self, id: i64) -> Result<Option<User>> {
    self
      .conn
      .call(move |conn| Ok(load_user(conn, id)))
      .await?
  }

  async fn list_users(&self, page: PageRequest) -> Result<Vec<User>> {
    let limit = i64::try_from(page.limit()).unwrap_or(i64::MAX);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM users u ORDER BY u.user_id LIMIT ?1 OFFSET ?2",
          user_columns("u"),
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit, offset], |row| RawUser::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn count_users(&self) -> Result<u64> {
    self
      .query_count(Statement {
        sql:    "SELECT COUNT(*) FROM users".to_owned(),
        params: Vec::new(),
      })
      .await
  }

  // ── Rides ─────────────────────────────────────────────────────────────────

  async fn create_ride(&self, input: NewRide) -> Result<(Ride, RideEvent)> {
    input.validate()?;
    let at = truncate_dt(Utc::now())?;

    let (ride, event) = self
      .conn
      .call(move |conn| Ok(insert_ride(conn, &input, at)))
      .await??;

    tracing::info!(ride_id = ride.id, rider_id = ride.rider_id, "ride requested");
    Ok((ride, event))
  }

  async fn get_ride(&self, id: i64) -> Result<Option<RideRow>> {
    Ok(self.query_rides(sql::select_ride(id)).await?.pop())
  }

  async fn find_rides(&self, query: RideQuery) -> Result<Vec<RideRow>> {
    self.query_rides(sql::select_rides(&query)).await
  }

  async fn count_rides(&self, query: RideQuery) -> Result<u64> {
    self.query_count(sql::count_rides(&query)).await
  }

  async fn transition(
    &self,
    ride_id: i64,
    transition: Transition,
    acting_user: Option<i64>,
    at: DateTime<Utc>,
  ) -> Result<TransitionOutcome> {
    let at = truncate_dt(at)?;

    let outcome = self
      .conn
      .call(move |conn| {
        Ok(apply_transition(conn, ride_id, transition, acting_user, at))
      })
      .await??;

    tracing::info!(
      ride_id,
      from = ?outcome.event.old_status,
      to = %outcome.event.new_status,
      actor = ?outcome.event.user_id,
      "ride transitioned"
    );
    Ok(outcome)
  }

  // ── Events ────────────────────────────────────────────────────────────────

  async fn append_event(&self, input: NewRideEvent) -> Result<RideEvent> {
    self
      .conn
      .call(move |conn| Ok(insert_event(conn, &input)))
      .await?
  }

  async fn events_for_rides(
    &self,
    ride_ids: Vec<i64>,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<EventRow>> {
    let stmt = sql::select_events_for_rides(&ride_ids, since.map(encode_dt));
    self.query_events(stmt).await
  }

  async fn list_events(
    &self,
    ride_id: Option<i64>,
    page: PageRequest,
  ) -> Result<Vec<EventRow>> {
    self.query_events(sql::select_events(ride_id, page)).await
  }

  async fn count_events(&self, ride_id: Option<i64>) -> Result<u64> {
    self.query_count(sql::count_events(ride_id)).await
  }

  async fn get_event(&self, id: i64) -> Result<Option<EventRow>> {
    Ok(self.query_events(sql::select_event(id)).await?.pop())
  }
}
