//! Planning and executing flat queries against the store.

use std::sync::Arc;

use eav_core::header::{HeaderPlan, SplitStrategy, plan_header};
use eav_sql::{Backend, MaterializedQuery, SqlParam, materialize};
use rusqlite::{params_from_iter, types::{Value as SqlValue, ValueRef}};
use serde_json::Value as Json;

use crate::{Error, Result, SqliteStore};

/// One output row of a [`MaterializedQuery`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
  columns: Arc<[String]>,
  cells:   Vec<Json>,
}

impl Row {
  /// The cell of `column`, or `None` if the query has no such column.
  pub fn get(&self, column: &str) -> Option<&Json> {
    let index = self.columns.iter().position(|c| c == column)?;
    self.cells.get(index)
  }

  pub fn entity_id(&self) -> Option<i64> {
    self.get(eav_sql::materialize::ENTITY_ID_COLUMN).and_then(Json::as_i64)
  }

  pub fn columns(&self) -> &[String] { &self.columns }

  pub fn cells(&self) -> &[Json] { &self.cells }
}

fn to_sql(param: &SqlParam) -> SqlValue {
  match param {
    SqlParam::Null => SqlValue::Null,
    SqlParam::Integer(i) => SqlValue::Integer(*i),
    SqlParam::Real(f) => SqlValue::Real(*f),
    SqlParam::Text(s) => SqlValue::Text(s.clone()),
    SqlParam::Boolean(b) => SqlValue::Integer(i64::from(*b)),
  }
}

fn to_json(cell: ValueRef<'_>) -> Json {
  match cell {
    ValueRef::Null => Json::Null,
    ValueRef::Integer(i) => Json::from(i),
    ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number),
    ValueRef::Text(bytes) => Json::String(String::from_utf8_lossy(bytes).into_owned()),
    ValueRef::Blob(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
  }
}

impl SqliteStore {
  /// Plan the header of `schema_name` and materialise its flat query.
  pub async fn plan_and_query(
    &self,
    schema_name: &str,
    strategy: SplitStrategy,
  ) -> Result<(HeaderPlan, MaterializedQuery)> {
    let plan = plan_header(self, schema_name, strategy, &[]).await?;
    let query = materialize(self.dialect(), schema_name, &plan);
    Ok((plan, query))
  }

  /// One column per attribute version.
  pub async fn query_by_id(&self, schema_name: &str) -> Result<MaterializedQuery> {
    Ok(self.plan_and_query(schema_name, SplitStrategy::Id).await?.1)
  }

  /// One column per attribute name.
  pub async fn query_by_name(&self, schema_name: &str) -> Result<MaterializedQuery> {
    Ok(self.plan_and_query(schema_name, SplitStrategy::Name).await?.1)
  }

  /// One column per distinct attribute shape.
  pub async fn query_by_checksum(&self, schema_name: &str) -> Result<MaterializedQuery> {
    Ok(self.plan_and_query(schema_name, SplitStrategy::Checksum).await?.1)
  }

  /// Run `query` and collect its rows, ordered by entity id.
  pub async fn fetch(&self, query: &MaterializedQuery) -> Result<Vec<Row>> {
    if query.dialect().backend != Backend::Sqlite {
      return Err(Error::DialectMismatch(query.dialect().backend));
    }
    let statement = query.statement();
    let columns: Arc<[String]> = query.columns().into();
    let params: Vec<SqlValue> = statement.params.iter().map(to_sql).collect();
    let sql = statement.sql;

    let cells = self
      .conn()
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let width = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
          let mut cells = Vec::with_capacity(width);
          for i in 0..width {
            cells.push(to_json(row.get_ref(i)?));
          }
          out.push(cells);
        }
        Ok(out)
      })
      .await?;

    tracing::debug!(query = query.name(), rows = cells.len(), "fetched rows");
    Ok(cells.into_iter().map(|cells| Row { columns: columns.clone(), cells }).collect())
  }
}
