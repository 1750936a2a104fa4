//! SQL schema for the ride SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    role         TEXT    NOT NULL DEFAULT 'user',  -- 'admin' | 'driver' | 'user'
    first_name   TEXT    NOT NULL,
    last_name    TEXT    NOT NULL,
    email        TEXT    NOT NULL UNIQUE,
    phone_number TEXT    NOT NULL,
    username     TEXT    NOT NULL UNIQUE,
    is_active    INTEGER NOT NULL DEFAULT 1,
    is_staff     INTEGER NOT NULL DEFAULT 0,
    is_superuser INTEGER NOT NULL DEFAULT 0,
    date_joined  TEXT    NOT NULL,
    last_login   TEXT
);

-- Status only changes through lifecycle transitions.
CREATE TABLE IF NOT EXISTS rides (
    ride_id           INTEGER PRIMARY KEY AUTOINCREMENT,
    status            TEXT    NOT NULL,
    rider_id          INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    driver_id         INTEGER REFERENCES users(user_id) ON DELETE SET NULL,
    pickup_latitude   REAL    NOT NULL,
    pickup_longitude  REAL    NOT NULL,
    dropoff_latitude  REAL    NOT NULL DEFAULT 0.0,
    dropoff_longitude REAL    NOT NULL DEFAULT 0.0,
    pickup_time       TEXT    NOT NULL,
    created_at        TEXT    NOT NULL,
    updated_at        TEXT    NOT NULL,
    CHECK (status != 'REQUESTED' OR driver_id IS NULL)
);

-- Ride events are strictly append-only.
-- No UPDATE is ever issued against this table.
CREATE TABLE IF NOT EXISTS ride_events (
    event_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    ride_id     INTEGER NOT NULL REFERENCES rides(ride_id) ON DELETE CASCADE,
    description TEXT    NOT NULL DEFAULT 'Event recorded',
    old_status  TEXT,             -- NULL for the initial event
    new_status  TEXT    NOT NULL,
    user_id     INTEGER REFERENCES users(user_id) ON DELETE SET NULL,
    created_at  TEXT    NOT NULL  -- fixed-width RFC 3339 UTC
);

CREATE INDEX IF NOT EXISTS rides_status_idx      ON rides(status);
CREATE INDEX IF NOT EXISTS rides_pickup_lat_idx  ON rides(pickup_latitude);
CREATE INDEX IF NOT EXISTS rides_pickup_lng_idx  ON rides(pickup_longitude);
CREATE INDEX IF NOT EXISTS rides_pickup_time_idx ON rides(pickup_time);
CREATE INDEX IF NOT EXISTS rides_rider_idx       ON rides(rider_id);
CREATE INDEX IF NOT EXISTS events_ride_idx       ON ride_events(ride_id, created_at);
CREATE INDEX IF NOT EXISTS events_created_idx    ON ride_events(created_at);

PRAGMA user_version = 1;
";
