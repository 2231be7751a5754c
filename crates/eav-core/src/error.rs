//! Error types for `eav-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Stored data violates a temporal or referential invariant.
  #[error("consistency error: {0}")]
  Consistency(String),

  /// A new version would overlap the existing history of `key`.
  #[error("version of {key:?} at {at} would overlap its history (latest bound {latest})")]
  Chronology {
    key:    String,
    at:     DateTime<Utc>,
    latest: DateTime<Utc>,
  },

  #[error("unknown split strategy: {0:?}")]
  UnknownStrategy(String),

  #[error("object attribute {schema}.{attribute} has no object schema")]
  MissingObjectSchema { schema: String, attribute: String },

  #[error("schema {0:?} embeds itself")]
  SchemaCycle(String),

  /// Two distinct column paths render to the same output column name.
  #[error("column {name:?} is produced by both {first:?} and {second:?}")]
  ColumnCollision {
    name:   String,
    first:  Vec<String>,
    second: Vec<String>,
  },

  #[error("unknown {kind} variant: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
