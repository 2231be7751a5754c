//! Error type for `eav-store-sqlite`.

use eav_core::attribute::AttributeType;
use eav_sql::Backend;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] eav_core::Error),

  #[error("query error: {0}")]
  Query(#[from] eav_sql::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decimal parse error: {0}")]
  Decimal(#[from] bigdecimal::ParseBigDecimalError),

  #[error("stored {value_type} value is malformed: {value:?}")]
  MalformedValue { value_type: AttributeType, value: String },

  /// A query rendered for another backend was handed to this store.
  #[error("query was built for {0:?}, not sqlite")]
  DialectMismatch(Backend),
}

impl Error {
  /// A consistency violation, logged where it is detected.
  pub(crate) fn consistency(message: impl Into<String>) -> Self {
    let message = message.into();
    tracing::warn!(%message, "consistency violation");
    Self::Core(eav_core::Error::Consistency(message))
  }

  /// True for violations of temporal or referential integrity.
  pub fn is_consistency(&self) -> bool {
    matches!(
      self,
      Self::Core(eav_core::Error::Consistency(_) | eav_core::Error::Chronology { .. })
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
