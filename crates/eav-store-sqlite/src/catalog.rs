//! Attribute lineages for the header planner.

use eav_core::{
  attribute::Attribute,
  header::{AttributeCatalog, LineageAttribute},
};
use rusqlite::params;

use crate::{
  Error, Result, SqliteStore,
  encode::{decode_date, decode_dt},
  record::Record as _,
};

impl AttributeCatalog for SqliteStore {
  type Error = Error;

  async fn lineage_attributes(&self, schema_name: &str) -> Result<Vec<LineageAttribute>> {
    let name = schema_name.to_owned();
    let rows = self
      .conn()
      .call(move |conn| {
        let sql = format!(
          "SELECT {columns},
                  s.publish_date AS lineage_publish_date,
                  s.create_date  AS lineage_create_date,
                  o.name         AS lineage_object_schema
             FROM attribute AS r
             JOIN schema AS s ON s.id = r.schema_id
             LEFT JOIN schema AS o ON o.id = r.object_schema_id
            WHERE s.name = ?1 AND s.publish_date IS NOT NULL",
          columns = Attribute::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![name], |row| {
            Ok((
              Attribute::read(row)?,
              row.get::<_, String>("lineage_publish_date")?,
              row.get::<_, String>("lineage_create_date")?,
              row.get::<_, Option<String>>("lineage_object_schema")?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let lineage = rows
      .into_iter()
      .map(|(raw, publish_date, create_date, object_schema)| {
        Ok(LineageAttribute {
          attribute: Attribute::decode(raw)?,
          publish_date: decode_date(&publish_date)?,
          schema_create_date: decode_dt(&create_date)?,
          object_schema,
        })
      })
      .collect::<Result<Vec<_>>>()?;
    tracing::debug!(schema = schema_name, attributes = lineage.len(), "loaded lineage");
    Ok(lineage)
  }
}
