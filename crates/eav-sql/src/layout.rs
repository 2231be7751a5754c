//! Table names of the persisted layout.
//!
//! One table per record kind, plus one value table per attribute type. All
//! temporal tables carry `name`, `create_date`, `modify_date` and
//! `remove_date` columns.

use eav_core::attribute::AttributeType;

pub const SCHEMA_TABLE: &str = "schema";
pub const ATTRIBUTE_TABLE: &str = "attribute";
pub const CHOICE_TABLE: &str = "choice";
pub const ENTITY_TABLE: &str = "entity";

/// The value table that stores payloads of type `value_type`.
pub fn value_table(value_type: AttributeType) -> &'static str {
  match value_type {
    AttributeType::Boolean => "value_boolean",
    AttributeType::Decimal => "value_decimal",
    AttributeType::Integer => "value_integer",
    AttributeType::Date => "value_date",
    AttributeType::Datetime => "value_datetime",
    AttributeType::String => "value_string",
    AttributeType::Text => "value_text",
    AttributeType::Object => "value_object",
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn every_type_has_its_own_table() {
    let tables: HashSet<_> = AttributeType::iter().map(value_table).collect();
    assert_eq!(tables.len(), 8);
    assert!(tables.iter().all(|t| t.starts_with("value_")));
  }
}
