//! SQL schema for the EAV SQLite store.
//!
//! Executed once at connection startup. Tables are created with
//! `CREATE ... IF NOT EXISTS`, so opening an existing file is a no-op.
//! Future migrations will be gated on `PRAGMA user_version`.

use eav_core::attribute::AttributeType;
use eav_sql::layout::value_table;
use strum::IntoEnumIterator as _;

/// Metadata tables. Every temporal table carries `name`, `create_date`,
/// `modify_date` and `remove_date`; partial unique indexes hold the
/// single-active-row invariant where the lineage key is a plain column.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS schema (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    name           TEXT NOT NULL,
    title          TEXT NOT NULL,
    description    TEXT,
    state          TEXT NOT NULL DEFAULT 'draft',
    storage        TEXT NOT NULL DEFAULT 'eav',
    publish_date   TEXT,            -- YYYY-MM-DD; NULL while unpublished
    base_schema_id INTEGER REFERENCES schema(id),
    is_association INTEGER NOT NULL DEFAULT 0,
    is_inline      INTEGER NOT NULL DEFAULT 0,
    create_date    TEXT NOT NULL,   -- RFC 3339 UTC, microseconds
    modify_date    TEXT NOT NULL,
    remove_date    TEXT,
    UNIQUE (name, create_date)
);

CREATE UNIQUE INDEX IF NOT EXISTS schema_active_idx
    ON schema(name) WHERE remove_date IS NULL;

-- One row per attribute version. The lineage key is (schema name, name), so
-- single-activeness is enforced by the store rather than an index.
CREATE TABLE IF NOT EXISTS attribute (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    schema_id        INTEGER NOT NULL REFERENCES schema(id),
    name             TEXT NOT NULL,
    title            TEXT NOT NULL,
    description      TEXT,
    type             TEXT NOT NULL,
    object_schema_id INTEGER REFERENCES schema(id),
    is_collection    INTEGER NOT NULL DEFAULT 0,
    is_required      INTEGER NOT NULL DEFAULT 0,
    \"order\"          INTEGER NOT NULL,
    value_min        INTEGER,
    value_max        INTEGER,
    collection_min   INTEGER,
    collection_max   INTEGER,
    validator        TEXT,
    create_date      TEXT NOT NULL,
    modify_date      TEXT NOT NULL,
    remove_date      TEXT,
    UNIQUE (schema_id, name, create_date)
);

CREATE INDEX IF NOT EXISTS attribute_schema_idx ON attribute(schema_id);
CREATE INDEX IF NOT EXISTS attribute_name_idx   ON attribute(name);

-- Choices belong to exactly one attribute version and are rewritten with it.
CREATE TABLE IF NOT EXISTS choice (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_id INTEGER NOT NULL REFERENCES attribute(id),
    name         TEXT NOT NULL,
    title        TEXT NOT NULL,
    value        TEXT NOT NULL,
    \"order\"      INTEGER NOT NULL,
    UNIQUE (attribute_id, name)
);

CREATE TABLE IF NOT EXISTS entity (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    schema_id    INTEGER NOT NULL REFERENCES schema(id),
    name         TEXT NOT NULL,
    state        TEXT NOT NULL DEFAULT 'pending-entry',
    collect_date TEXT,
    create_date  TEXT NOT NULL,
    modify_date  TEXT NOT NULL,
    remove_date  TEXT,
    UNIQUE (name, create_date)
);

CREATE UNIQUE INDEX IF NOT EXISTS entity_active_idx
    ON entity(name) WHERE remove_date IS NULL;
CREATE INDEX IF NOT EXISTS entity_schema_idx ON entity(schema_id);
";

/// Column type of the `value` column in each shard.
fn storage_type(value_type: AttributeType) -> &'static str {
  match value_type {
    AttributeType::Boolean | AttributeType::Integer => "INTEGER",
    AttributeType::Object => "INTEGER REFERENCES entity(id)",
    AttributeType::Decimal
    | AttributeType::Date
    | AttributeType::Datetime
    | AttributeType::String
    | AttributeType::Text => "TEXT",
  }
}

/// DDL for the type-sharded value tables and the `value_all` view that
/// unions them for lineage-level reads.
///
/// The view exposes the physical table of each row as `storage_table`, so a
/// row is identified by `(storage_table, id)`.
pub fn value_ddl() -> String {
  let mut ddl = String::new();
  let mut arms = Vec::new();

  for value_type in AttributeType::iter() {
    let table = value_table(value_type);
    ddl.push_str(&format!(
      "
CREATE TABLE IF NOT EXISTS {table} (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id    INTEGER NOT NULL REFERENCES entity(id),
    attribute_id INTEGER NOT NULL REFERENCES attribute(id),
    choice_id    INTEGER REFERENCES choice(id),
    name         TEXT NOT NULL,
    value        {storage},
    create_date  TEXT NOT NULL,
    modify_date  TEXT NOT NULL,
    remove_date  TEXT,
    UNIQUE (entity_id, name, create_date)
);
CREATE INDEX IF NOT EXISTS {table}_entity_idx ON {table}(entity_id, attribute_id);
",
      storage = storage_type(value_type),
    ));
    arms.push(format!(
      "SELECT v.id, v.name, v.create_date, v.modify_date, v.remove_date,
       '{table}' AS storage_table, '{value_type}' AS type,
       v.entity_id, v.attribute_id, c.name AS choice, CAST(v.value AS TEXT) AS value
  FROM {table} AS v LEFT JOIN choice AS c ON c.id = v.choice_id"
    ));
  }

  ddl.push_str(&format!(
    "\nCREATE VIEW IF NOT EXISTS value_all AS\n{};\n\nPRAGMA user_version = 1;\n",
    arms.join("\nUNION ALL\n")
  ));
  ddl
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn view_unions_every_shard() {
    let ddl = value_ddl();
    for value_type in AttributeType::iter() {
      assert!(ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {}", value_table(value_type))));
      assert!(ddl.contains(&format!("'{value_type}' AS type")));
    }
    assert_eq!(ddl.matches("UNION ALL").count(), AttributeType::iter().count() - 1);
  }
}
