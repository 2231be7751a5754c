//! Schema: a versioned group of attributes (a "form").
//!
//! A schema's history is every row sharing its `name`. Only versions with a
//! `publish_date` take part in planning and materialisation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Circulation state of a schema version.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SchemaState {
  #[default]
  Draft,
  PendingReview,
  Published,
  Retired,
}

/// Where instances of the schema live.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Storage {
  /// The object exists in an external service.
  Resource,
  /// Values are stored in the type-sharded value tables.
  #[default]
  Eav,
  /// The object is stored in a conventional table.
  Table,
}

/// Body of a schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
  pub title:          String,
  pub description:    Option<String>,
  pub state:          SchemaState,
  pub storage:        Storage,
  pub publish_date:   Option<NaiveDate>,
  /// Row id of the schema version this one extends. Single parent only.
  pub base_schema_id: Option<i64>,
  pub is_association: bool,
  pub is_inline:      bool,
}

impl Schema {
  /// A draft EAV schema with every optional field unset.
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title:          title.into(),
      description:    None,
      state:          SchemaState::default(),
      storage:        Storage::default(),
      publish_date:   None,
      base_schema_id: None,
      is_association: false,
      is_inline:      false,
    }
  }

  /// Mark the schema published on `date`.
  pub fn published(mut self, date: NaiveDate) -> Self {
    self.state = SchemaState::Published;
    self.publish_date = Some(date);
    self
  }

  pub fn is_published(&self) -> bool { self.publish_date.is_some() }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn state_text_forms_are_kebab_case() {
    assert_eq!(SchemaState::PendingReview.as_ref(), "pending-review");
    assert_eq!(SchemaState::from_str("published").unwrap(), SchemaState::Published);
    assert!(SchemaState::from_str("archived").is_err());
  }

  #[test]
  fn published_sets_state_and_date() {
    let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let schema = Schema::new("Demographics").published(date);
    assert!(schema.is_published());
    assert_eq!(schema.state, SchemaState::Published);
    assert_eq!(Storage::from_str("eav").unwrap(), schema.storage);
  }
}
