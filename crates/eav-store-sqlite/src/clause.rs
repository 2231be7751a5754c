//! `WHERE` fragments shared by manager, hierarchy and catalog queries.
//!
//! Fragments use anonymous `?` placeholders; their parameters are appended
//! to the caller's list in the order the fragment is spliced in.

use eav_core::temporal::Selector;
use rusqlite::types::Value as SqlValue;

use crate::encode::{encode_dt, truncate_dt};

/// Rows of `alias` matched by `selector`.
pub fn matching(alias: &str, selector: Selector, params: &mut Vec<SqlValue>) -> String {
  match selector {
    Selector::Current => format!("{alias}.remove_date IS NULL"),
    Selector::On(at) => {
      let at = encode_dt(truncate_dt(at));
      params.push(SqlValue::Text(at.clone()));
      params.push(SqlValue::Text(at));
      format!(
        "{alias}.create_date <= ? AND ({alias}.remove_date IS NULL OR {alias}.remove_date > ?)"
      )
    }
    Selector::Ever => "1 = 1".to_owned(),
  }
}

/// Restriction of a manager to a subset of rows, e.g. the attributes of one
/// schema lineage. `clause` holds exactly one `?`, bound to `param`.
#[derive(Debug, Clone)]
pub struct Scope {
  pub clause: &'static str,
  pub param:  SqlValue,
}

/// `WHERE` body matching rows of `key` (or every key) under `selector`,
/// within `scope`. Rows are aliased `r`.
pub fn lineage(
  key: Option<&str>,
  selector: Selector,
  scope: Option<&Scope>,
) -> (String, Vec<SqlValue>) {
  let mut params = Vec::new();
  let mut conditions = Vec::new();
  if let Some(key) = key {
    conditions.push("r.name = ?".to_owned());
    params.push(SqlValue::Text(key.to_owned()));
  }
  conditions.push(matching("r", selector, &mut params));
  if let Some(scope) = scope {
    conditions.push(scope.clause.to_owned());
    params.push(scope.param.clone());
  }
  (conditions.join(" AND "), params)
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;

  #[test]
  fn on_selector_binds_instant_twice() {
    let mut params = Vec::new();
    let at = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let sql = matching("a", Selector::On(at), &mut params);
    assert_eq!(sql.matches('?').count(), 2);
    assert_eq!(params.len(), 2);
  }

  #[test]
  fn lineage_orders_parameters_with_fragments() {
    let scope = Scope { clause: "r.entity_id = ?", param: SqlValue::Integer(7) };
    let (sql, params) = lineage(Some("age"), Selector::Current, Some(&scope));
    assert_eq!(sql, "r.name = ? AND r.remove_date IS NULL AND r.entity_id = ?");
    assert_eq!(params, vec![SqlValue::Text("age".into()), SqlValue::Integer(7)]);
  }
}
