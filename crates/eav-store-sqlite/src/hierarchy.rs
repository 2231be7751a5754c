//! Schema containment resolved through `object` attributes.

use chrono::{DateTime, Utc};
use eav_core::{
  hierarchy::Hierarchy,
  schema::Schema,
  temporal::{Selector, Versioned},
};
use rusqlite::params_from_iter;

use crate::{Error, Result, SqliteStore, clause, record::Record as _};

impl Hierarchy for SqliteStore {
  type Error = Error;

  async fn children(
    &self,
    key: &str,
    on: Option<DateTime<Utc>>,
  ) -> Result<Vec<Versioned<Schema>>> {
    let parent_name = key.to_owned();
    let raws = self
      .conn()
      .call(move |conn| {
        let selector = Selector::on(on);
        let mut params = vec![rusqlite::types::Value::Text(parent_name)];
        let parent = clause::matching("p", selector, &mut params);
        let attribute = clause::matching("a", selector, &mut params);
        // Children are linked by row id; they are returned whatever their own
        // lifespan, as the exact version the parent embeds.
        let sql = format!(
          "SELECT {columns}
             FROM attribute AS a
             JOIN schema AS p ON p.id = a.schema_id
             JOIN schema AS r ON r.id = a.object_schema_id
            WHERE p.name = ? AND {parent} AND {attribute} AND a.type = 'object'
            ORDER BY a.\"order\", a.id",
          columns = Schema::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params), Schema::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut children: Vec<Versioned<Schema>> = Vec::new();
    for raw in raws {
      let child = Schema::decode(raw)?;
      if !children.iter().any(|c| c.id == child.id) {
        children.push(child);
      }
    }
    tracing::debug!(parent = key, count = children.len(), "resolved children");
    Ok(children)
  }
}
