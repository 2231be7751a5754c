//! Value: one assigned field value of an entity.
//!
//! Payloads are type-sharded: each [`ValuePayload`] variant is stored in the
//! value table of the matching [`AttributeType`].

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeType;

/// The typed payload of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ValuePayload {
  Boolean(bool),
  Decimal(BigDecimal),
  Integer(i64),
  Date(NaiveDate),
  Datetime(DateTime<Utc>),
  String(String),
  Text(String),
  /// Row id of the linked entity.
  Object(i64),
}

impl ValuePayload {
  /// The attribute type whose value table stores this payload.
  pub fn value_type(&self) -> AttributeType {
    match self {
      Self::Boolean(_) => AttributeType::Boolean,
      Self::Decimal(_) => AttributeType::Decimal,
      Self::Integer(_) => AttributeType::Integer,
      Self::Date(_) => AttributeType::Date,
      Self::Datetime(_) => AttributeType::Datetime,
      Self::String(_) => AttributeType::String,
      Self::Text(_) => AttributeType::Text,
      Self::Object(_) => AttributeType::Object,
    }
  }
}

/// Body of a value version.
///
/// A value's key is its own name. Scalar values are conventionally keyed by
/// their attribute's name; each member of a collection carries its own key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
  /// Row id of the owning entity version.
  pub entity_id:    i64,
  /// Row id of the attribute version; must be active when the value is
  /// created.
  pub attribute_id: i64,
  /// Name of the attribute choice the value was picked from, if any.
  pub choice:       Option<String>,
  pub payload:      ValuePayload,
}

impl Value {
  pub fn new(entity_id: i64, attribute_id: i64, payload: ValuePayload) -> Self {
    Self { entity_id, attribute_id, choice: None, payload }
  }

  pub fn from_choice(mut self, choice: impl Into<String>) -> Self {
    self.choice = Some(choice.into());
    self
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn payload_maps_to_storage_type() {
    assert_eq!(ValuePayload::Integer(3).value_type(), AttributeType::Integer);
    assert_eq!(
      ValuePayload::Decimal(BigDecimal::from_str("1.25").unwrap()).value_type(),
      AttributeType::Decimal
    );
    assert_eq!(ValuePayload::Object(9).value_type(), AttributeType::Object);
  }

  #[test]
  fn payload_serialises_with_type_tag() {
    let json = serde_json::to_value(ValuePayload::String("red".into())).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "string", "value": "red" }));
  }
}
