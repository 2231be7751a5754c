//! Attributes (the fields of a schema version) and their choices.
//!
//! Attributes are versioned per schema lineage: a new schema version carries
//! new attribute rows that share names with their predecessors. Choices are
//! not versioned on their own; changing a choice set means writing a new
//! attribute version.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::temporal::Versioned;

// ─── Type vocabulary ─────────────────────────────────────────────────────────

/// The fixed type vocabulary of attributes. Each variant owns one value
/// table; `Object` embeds another schema.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttributeType {
  Boolean,
  Decimal,
  Integer,
  Date,
  Datetime,
  String,
  Text,
  Object,
}

impl AttributeType {
  pub fn is_object(self) -> bool { matches!(self, Self::Object) }
}

// ─── Choice ──────────────────────────────────────────────────────────────────

/// An enumerated answer option of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
  pub name:  String,
  pub title: String,
  /// Coerced to the attribute's type when a value is stored from it.
  pub value: String,
  pub order: i64,
}

impl Choice {
  pub fn new(name: impl Into<String>, value: impl Into<String>, order: i64) -> Self {
    let name = name.into();
    Self { title: name.clone(), name, value: value.into(), order }
  }
}

// ─── Attribute ───────────────────────────────────────────────────────────────

/// Body of an attribute version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
  /// Row id of the owning schema version.
  pub schema_id:        i64,
  pub title:            String,
  pub description:      Option<String>,
  #[serde(rename = "type")]
  pub value_type:       AttributeType,
  /// Row id of the embedded schema version; only meaningful for `Object`.
  pub object_schema_id: Option<i64>,
  pub is_collection:    bool,
  pub is_required:      bool,
  /// Display position within the schema; may change between versions.
  pub order:            i64,
  /// Minimum length or value, depending on type.
  pub value_min:        Option<i64>,
  pub value_max:        Option<i64>,
  pub collection_min:   Option<i64>,
  pub collection_max:   Option<i64>,
  /// Regular expression the stored text must match.
  pub validator:        Option<String>,
  pub choices:          Vec<Choice>,
}

impl Attribute {
  /// A scalar, optional attribute with no constraints.
  pub fn new(
    schema_id: i64,
    title: impl Into<String>,
    value_type: AttributeType,
    order: i64,
  ) -> Self {
    Self {
      schema_id,
      title: title.into(),
      description: None,
      value_type,
      object_schema_id: None,
      is_collection: false,
      is_required: false,
      order,
      value_min: None,
      value_max: None,
      collection_min: None,
      collection_max: None,
      validator: None,
      choices: Vec::new(),
    }
  }

  /// An `Object` attribute embedding the schema version `object_schema_id`.
  pub fn object(
    schema_id: i64,
    title: impl Into<String>,
    object_schema_id: i64,
    order: i64,
  ) -> Self {
    Self {
      object_schema_id: Some(object_schema_id),
      ..Self::new(schema_id, title, AttributeType::Object, order)
    }
  }

  pub fn collection(mut self) -> Self {
    self.is_collection = true;
    self
  }
}

// ─── Checksum ────────────────────────────────────────────────────────────────

impl Versioned<Attribute> {
  /// SHA-256 hex digest of the attribute's structural shape.
  ///
  /// Two versions with equal checksums describe the same field. Display
  /// `order` and the owning schema are excluded, so moving an attribute or
  /// re-publishing its schema does not change the digest.
  pub fn checksum(&self) -> String {
    let a = &self.item;
    let mut hasher = Sha256::new();
    feed(&mut hasher, Some(self.name.as_bytes()));
    feed(&mut hasher, Some(a.title.as_bytes()));
    feed(&mut hasher, a.description.as_deref().map(str::as_bytes));
    feed(&mut hasher, Some(a.value_type.as_ref().as_bytes()));
    hasher.update([u8::from(a.is_collection), u8::from(a.is_required)]);
    for bound in [a.value_min, a.value_max, a.collection_min, a.collection_max] {
      feed(&mut hasher, bound.map(i64::to_le_bytes).as_ref().map(|b| &b[..]));
    }
    feed(&mut hasher, a.validator.as_deref().map(str::as_bytes));

    let mut choices: Vec<&Choice> = a.choices.iter().collect();
    choices.sort_by_key(|c| c.order);
    hasher.update((choices.len() as u64).to_le_bytes());
    for choice in choices {
      feed(&mut hasher, Some(choice.name.as_bytes()));
      feed(&mut hasher, Some(choice.title.as_bytes()));
      feed(&mut hasher, Some(choice.value.as_bytes()));
      hasher.update(choice.order.to_le_bytes());
    }
    hex::encode(hasher.finalize())
  }
}

/// Length-prefix each field so adjacent fields cannot run together.
fn feed(hasher: &mut Sha256, bytes: Option<&[u8]>) {
  match bytes {
    Some(b) => {
      hasher.update([1u8]);
      hasher.update((b.len() as u64).to_le_bytes());
      hasher.update(b);
    }
    None => hasher.update([0u8]),
  }
}
