//! Error type for `eav-sql`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("query has no column {0:?}")]
  UnknownColumn(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
