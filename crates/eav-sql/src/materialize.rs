//! Query materialisation: one flat, typed row per entity.
//!
//! Each planned column becomes either an outer join (scalar attributes) or a
//! correlated aggregate sub-query (attributes that were ever a collection).
//! The sub-queries are embedded as column expressions, so an entity with
//! several values for one attribute still yields a single row.

use eav_core::header::HeaderPlan;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  dialect::{Backend, Dialect},
  layout::{ENTITY_TABLE, SCHEMA_TABLE, value_table},
};

/// Output column holding the entity's row id; always first.
pub const ENTITY_ID_COLUMN: &str = "entity_id";

// ─── Parameters ──────────────────────────────────────────────────────────────

/// A bind parameter, independent of any driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlParam {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
  Boolean(bool),
}

impl From<i64> for SqlParam {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<f64> for SqlParam {
  fn from(v: f64) -> Self { Self::Real(v) }
}

impl From<bool> for SqlParam {
  fn from(v: bool) -> Self { Self::Boolean(v) }
}

impl From<&str> for SqlParam {
  fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

impl From<String> for SqlParam {
  fn from(v: String) -> Self { Self::Text(v) }
}

/// Rendered SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
  pub sql:    String,
  pub params: Vec<SqlParam>,
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// A predicate over one output column of a [`MaterializedQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
  Eq(String, SqlParam),
  Ne(String, SqlParam),
  Lt(String, SqlParam),
  Le(String, SqlParam),
  Gt(String, SqlParam),
  Ge(String, SqlParam),
  IsNull(String),
  NotNull(String),
  In(String, Vec<SqlParam>),
}

impl Filter {
  fn column(&self) -> &str {
    match self {
      Self::Eq(c, _)
      | Self::Ne(c, _)
      | Self::Lt(c, _)
      | Self::Le(c, _)
      | Self::Gt(c, _)
      | Self::Ge(c, _)
      | Self::IsNull(c)
      | Self::NotNull(c)
      | Self::In(c, _) => c,
    }
  }

  fn render(&self, dialect: &Dialect, column: &str, params: &mut Vec<SqlParam>) -> String {
    let mut bind = |value: &SqlParam| {
      params.push(value.clone());
      dialect.placeholder(params.len())
    };
    match self {
      Self::Eq(_, v) => format!("{column} = {}", bind(v)),
      Self::Ne(_, v) => format!("{column} <> {}", bind(v)),
      Self::Lt(_, v) => format!("{column} < {}", bind(v)),
      Self::Le(_, v) => format!("{column} <= {}", bind(v)),
      Self::Gt(_, v) => format!("{column} > {}", bind(v)),
      Self::Ge(_, v) => format!("{column} >= {}", bind(v)),
      Self::IsNull(_) => format!("{column} IS NULL"),
      Self::NotNull(_) => format!("{column} IS NOT NULL"),
      // `IN ()` is not valid SQL; an empty list matches nothing.
      Self::In(_, values) if values.is_empty() => "1 = 0".to_owned(),
      Self::In(_, values) => {
        let list: Vec<String> = values.iter().map(&mut bind).collect();
        format!("{column} IN ({})", list.join(", "))
      }
    }
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// A composed, not yet executed query over the entities of one schema.
///
/// Filters, limits and offsets refine the query without touching the
/// materialised body; rendering wraps the body as a named sub-query.
#[derive(Debug, Clone)]
pub struct MaterializedQuery {
  dialect: Dialect,
  name:    String,
  columns: Vec<String>,
  body:    String,
  filters: Vec<Filter>,
  limit:   Option<u64>,
  offset:  Option<u64>,
}

impl MaterializedQuery {
  /// The alias of the query: the originating schema name.
  pub fn name(&self) -> &str { &self.name }

  pub fn dialect(&self) -> &Dialect { &self.dialect }

  /// Output column names: [`ENTITY_ID_COLUMN`], then plan order.
  pub fn columns(&self) -> &[String] { &self.columns }

  /// The materialised `SELECT`, without filters, ordering or paging.
  pub fn body(&self) -> &str { &self.body }

  /// Restrict the rows by a predicate over an output column.
  pub fn filter(mut self, filter: Filter) -> Result<Self> {
    if !self.columns.iter().any(|c| c == filter.column()) {
      return Err(Error::UnknownColumn(filter.column().to_owned()));
    }
    self.filters.push(filter);
    Ok(self)
  }

  pub fn limit(mut self, limit: u64) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn offset(mut self, offset: u64) -> Self {
    self.offset = Some(offset);
    self
  }

  /// Render the complete statement, ordered by entity id.
  pub fn statement(&self) -> Statement { self.render(Vec::new()) }

  /// Render as `(<statement>) AS "<name>"` for embedding in a larger query
  /// whose own parameters `preceding` come first.
  pub fn subquery(&self, preceding: Vec<SqlParam>) -> Statement {
    let Statement { sql, params } = self.render(preceding);
    Statement {
      sql: format!("({sql}) AS {}", self.dialect.quote_ident(&self.name)),
      params,
    }
  }

  fn render(&self, mut params: Vec<SqlParam>) -> Statement {
    let d = &self.dialect;
    let alias = d.quote_ident(&self.name);
    let mut sql = format!("SELECT * FROM (\n{}\n) AS {alias}", self.body);

    if !self.filters.is_empty() {
      let predicates: Vec<String> = self
        .filters
        .iter()
        .map(|f| {
          let column = format!("{alias}.{}", d.quote_ident(f.column()));
          f.render(d, &column, &mut params)
        })
        .collect();
      sql.push_str(&format!("\nWHERE {}", predicates.join("\n  AND ")));
    }

    sql.push_str(&format!("\nORDER BY {alias}.{}", d.quote_ident(ENTITY_ID_COLUMN)));
    match (self.limit, self.offset) {
      (Some(limit), Some(offset)) => sql.push_str(&format!("\nLIMIT {limit} OFFSET {offset}")),
      (Some(limit), None) => sql.push_str(&format!("\nLIMIT {limit}")),
      // SQLite has no OFFSET without LIMIT; -1 / ALL mean unbounded.
      (None, Some(offset)) => {
        let unbounded = match d.backend {
          Backend::Sqlite => "-1",
          Backend::Postgres => "ALL",
        };
        sql.push_str(&format!("\nLIMIT {unbounded} OFFSET {offset}"));
      }
      (None, None) => {}
    }

    Statement { sql, params }
  }
}

// ─── Materialisation ─────────────────────────────────────────────────────────

/// Build the flat query for the entities of `schema_name` laid out by
/// `plan`.
///
/// Only entities of published schema versions are included, and only active
/// entity and value rows contribute. The plan is trusted as-is: attribute
/// types and ids are not re-validated here.
pub fn materialize(dialect: &Dialect, schema_name: &str, plan: &HeaderPlan) -> MaterializedQuery {
  let d = dialect;
  let entity = d.quote_ident(ENTITY_TABLE);
  let schema = d.quote_ident(SCHEMA_TABLE);

  let mut columns = vec![ENTITY_ID_COLUMN.to_owned()];
  let mut select = vec![format!("{entity}.id AS {}", d.quote_ident(ENTITY_ID_COLUMN))];
  let mut joins = Vec::new();

  for (i, column) in plan.columns().iter().enumerate() {
    let name = column.name();
    let value_type = column.value_type();
    let table = value_table(value_type);
    let alias = d.quote_ident(&format!("v{i}_{value_type}"));

    let ids: Vec<String> = column.attribute_ids().iter().map(i64::to_string).collect();
    let predicate = format!(
      "{alias}.entity_id = {entity}.id AND {alias}.attribute_id IN ({}) AND {alias}.remove_date IS NULL",
      ids.join(", ")
    );
    let casted = d.cast(value_type, &format!("{alias}.value"));

    let expr = if column.is_ever_collection() {
      let source = format!("{table} AS {alias}");
      d.aggregate(&casted, &source, &predicate, &format!("{alias}.id"))
    } else {
      joins.push(format!("LEFT JOIN {table} AS {alias} ON {predicate}"));
      casted
    };

    select.push(format!("{expr} AS {}", d.quote_ident(&name)));
    columns.push(name);
  }

  let mut body = format!(
    "SELECT {}\nFROM {entity}\nJOIN {schema} ON {schema}.id = {entity}.schema_id",
    select.join(",\n  ")
  );
  for join in &joins {
    body.push('\n');
    body.push_str(join);
  }
  body.push_str(&format!(
    "\nWHERE {schema}.name = {} AND {schema}.publish_date IS NOT NULL AND {entity}.remove_date IS NULL",
    d.quote_literal(schema_name)
  ));

  tracing::debug!(
    schema = schema_name,
    columns = columns.len(),
    joins = joins.len(),
    "materialized query"
  );

  MaterializedQuery {
    dialect: *dialect,
    name: schema_name.to_owned(),
    columns,
    body,
    filters: Vec::new(),
    limit: None,
    offset: None,
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use eav_core::{
    attribute::{Attribute, AttributeType},
    header::{ColumnKey, HeaderPlan},
    temporal::Versioned,
  };

  use super::*;

  fn version(id: i64, name: &str, attribute: Attribute) -> Versioned<Attribute> {
    let at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    Versioned {
      id,
      name: name.to_owned(),
      create_date: at,
      modify_date: at,
      remove_date: None,
      item: attribute,
    }
  }

  fn key(path: &[&str]) -> ColumnKey {
    ColumnKey { path: path.iter().map(|s| s.to_string()).collect(), split: None }
  }

  /// `age` (two scalar versions), `tags` (collection), `visit_date` (date).
  fn plan() -> HeaderPlan {
    let mut plan = HeaderPlan::default();
    plan.push(key(&["age"]), version(1, "age", Attribute::new(1, "Age", AttributeType::Integer, 0))).unwrap();
    plan.push(key(&["age"]), version(4, "age", Attribute::new(2, "Age", AttributeType::Integer, 0))).unwrap();
    plan.push(
      key(&["tags"]),
      version(2, "tags", Attribute::new(1, "Tags", AttributeType::String, 1).collection()),
    ).unwrap();
    plan.push(key(&["visit_date"]), version(3, "visit_date", Attribute::new(1, "Date", AttributeType::Date, 2))).unwrap();
    plan
  }

  #[test]
  fn columns_follow_plan_order() {
    let query = materialize(&Dialect::sqlite(), "demographics", &plan());
    assert_eq!(query.columns(), ["entity_id", "age", "tags", "visit_date"]);
    assert_eq!(query.name(), "demographics");
  }

  #[test]
  fn scalars_join_and_collections_aggregate() {
    let query = materialize(&Dialect::sqlite(), "demographics", &plan());
    let body = query.body();

    assert!(body.contains(
      "LEFT JOIN value_integer AS \"v0_integer\" ON \"v0_integer\".entity_id = \"entity\".id \
       AND \"v0_integer\".attribute_id IN (1, 4)"
    ));
    assert!(body.contains("CAST(\"v0_integer\".value AS INTEGER) AS \"age\""));
    assert!(body.contains("group_concat(CAST(\"v1_string\".value AS VARCHAR), ','"));
    assert!(!body.contains("JOIN value_string"));
    assert!(body.contains("date(\"v2_date\".value) AS \"visit_date\""));
    assert!(body.contains("\"schema\".name = 'demographics'"));
    assert!(body.contains("\"schema\".publish_date IS NOT NULL"));
  }

  #[test]
  fn postgres_uses_arrays_and_native_casts() {
    let query = materialize(&Dialect::postgres(), "demographics", &plan());
    let body = query.body();
    assert!(body.contains("ARRAY(SELECT CAST(\"v1_string\".value AS VARCHAR) FROM value_string"));
    assert!(body.contains("CAST(\"v2_date\".value AS DATE) AS \"visit_date\""));
    assert!(!body.contains("group_concat"));
  }

  #[test]
  fn empty_plan_selects_entity_ids_only() {
    let query = materialize(&Dialect::sqlite(), "empty", &HeaderPlan::default());
    assert_eq!(query.columns(), ["entity_id"]);
    assert!(!query.body().contains("LEFT JOIN"));
  }

  #[test]
  fn filters_bind_dialect_placeholders() {
    let query = materialize(&Dialect::postgres(), "demographics", &plan())
      .filter(Filter::Ge("age".into(), 18_i64.into()))
      .unwrap()
      .filter(Filter::In("visit_date".into(), vec!["2020-01-01".into(), "2020-02-01".into()]))
      .unwrap()
      .limit(10)
      .offset(20);

    let statement = query.statement();
    assert!(statement.sql.contains("\"demographics\".\"age\" >= $1"));
    assert!(statement.sql.contains("\"demographics\".\"visit_date\" IN ($2, $3)"));
    assert!(statement.sql.ends_with("LIMIT 10 OFFSET 20"));
    assert_eq!(statement.params.len(), 3);
    assert_eq!(statement.params[0], SqlParam::Integer(18));
  }

  #[test]
  fn filter_on_unknown_column_is_rejected() {
    let err = materialize(&Dialect::sqlite(), "demographics", &plan())
      .filter(Filter::IsNull("weight".into()))
      .unwrap_err();
    assert!(matches!(err, Error::UnknownColumn(ref c) if c == "weight"));
  }

  #[test]
  fn subquery_numbers_after_preceding_params() {
    let query = materialize(&Dialect::sqlite(), "demographics", &plan())
      .filter(Filter::Eq("age".into(), 40_i64.into()))
      .unwrap();
    let statement = query.subquery(vec![SqlParam::Text("site".into())]);
    assert!(statement.sql.starts_with("(SELECT * FROM ("));
    assert!(statement.sql.ends_with(") AS \"demographics\""));
    assert!(statement.sql.contains("= ?2"));
    assert_eq!(statement.params.len(), 2);
  }

  #[test]
  fn offset_without_limit_stays_valid() {
    let sqlite = materialize(&Dialect::sqlite(), "d", &plan()).offset(5).statement();
    assert!(sqlite.sql.ends_with("LIMIT -1 OFFSET 5"));
    let postgres = materialize(&Dialect::postgres(), "d", &plan()).offset(5).statement();
    assert!(postgres.sql.ends_with("LIMIT ALL OFFSET 5"));
  }
}
