//! Error type for `ride-store-sqlite`.

use ride_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] ride_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("count out of range: {0}")]
  Count(i64),
}

impl StoreError for Error {
  fn domain(&self) -> Option<&ride_core::Error> {
    match self {
      Self::Core(
        ride_core::Error::UnknownStatus(_) | ride_core::Error::UnknownRole(_),
      ) => None,
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
