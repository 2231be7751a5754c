//! Backend capability descriptors.
//!
//! A [`Dialect`] is decided once, when a session is set up, and consulted
//! by every query built for that session. It answers the two questions the
//! materialiser cares about: can the backend aggregate into native arrays,
//! and how should date/datetime text be normalised.

use eav_core::attribute::AttributeType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  Sqlite,
  Postgres,
}

/// How stored date and datetime values are converted for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateCastStrategy {
  /// `CAST(x AS DATE)` / `CAST(x AS TIMESTAMP)`.
  Cast,
  /// The backend's `date(x)` / `datetime(x)` text functions, for backends
  /// without native date types.
  StringFunctions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
  pub supports_native_arrays: bool,
  pub date_cast:              DateCastStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialect {
  pub backend:      Backend,
  pub capabilities: Capabilities,
}

/// Separator of aggregated collection members on backends without arrays.
pub const COLLECTION_DELIMITER: &str = ",";

impl Dialect {
  pub fn sqlite() -> Self {
    Self {
      backend:      Backend::Sqlite,
      capabilities: Capabilities {
        supports_native_arrays: false,
        date_cast:              DateCastStrategy::StringFunctions,
      },
    }
  }

  pub fn postgres() -> Self {
    Self {
      backend:      Backend::Postgres,
      capabilities: Capabilities {
        supports_native_arrays: true,
        date_cast:              DateCastStrategy::Cast,
      },
    }
  }

  pub fn for_backend(backend: Backend) -> Self {
    match backend {
      Backend::Sqlite => Self::sqlite(),
      Backend::Postgres => Self::postgres(),
    }
  }

  /// The `n`th (1-based) bind parameter.
  pub fn placeholder(&self, n: usize) -> String {
    match self.backend {
      Backend::Sqlite => format!("?{n}"),
      Backend::Postgres => format!("${n}"),
    }
  }

  pub fn quote_ident(&self, ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
  }

  pub fn quote_literal(&self, text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
  }

  /// SQL type name used by generic casts.
  pub fn cast_type(&self, value_type: AttributeType) -> &'static str {
    match value_type {
      AttributeType::Boolean => "BOOLEAN",
      AttributeType::Decimal => "NUMERIC",
      AttributeType::Integer | AttributeType::Object => "INTEGER",
      AttributeType::Date => "DATE",
      AttributeType::Datetime => "TIMESTAMP",
      AttributeType::String => "VARCHAR",
      AttributeType::Text => "TEXT",
    }
  }

  /// Convert the raw stored value `expr` to `value_type`.
  pub fn cast(&self, value_type: AttributeType, expr: &str) -> String {
    match (self.capabilities.date_cast, value_type) {
      (DateCastStrategy::StringFunctions, AttributeType::Date) => format!("date({expr})"),
      (DateCastStrategy::StringFunctions, AttributeType::Datetime) => {
        format!("datetime({expr})")
      }
      _ => format!("CAST({expr} AS {})", self.cast_type(value_type)),
    }
  }

  /// A scalar sub-query collecting `expr` over the rows of `source` matching
  /// `predicate`, ordered by `order_by`: an array where the backend has
  /// them, a delimited string otherwise.
  pub fn aggregate(&self, expr: &str, source: &str, predicate: &str, order_by: &str) -> String {
    if self.capabilities.supports_native_arrays {
      format!("ARRAY(SELECT {expr} FROM {source} WHERE {predicate} ORDER BY {order_by})")
    } else {
      let delimiter = self.quote_literal(COLLECTION_DELIMITER);
      format!(
        "(SELECT group_concat({expr}, {delimiter} ORDER BY {order_by}) FROM {source} WHERE {predicate})"
      )
    }
  }
}
