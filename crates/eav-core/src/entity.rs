//! Entity: one instance of a schema version.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Workflow state of an entity.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EntityState {
  #[default]
  PendingEntry,
  PendingReview,
  Completed,
  NotDone,
}

/// Body of an entity version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
  /// Row id of the schema version the entity conforms to.
  pub schema_id:    i64,
  pub state:        EntityState,
  /// When the information was physically collected.
  pub collect_date: Option<NaiveDate>,
}

impl Entity {
  pub fn new(schema_id: i64) -> Self {
    Self { schema_id, state: EntityState::default(), collect_date: None }
  }
}
