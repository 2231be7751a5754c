//! [`SqliteStore`]: a session over one SQLite database.

use std::{path::Path, time::Duration};

use eav_core::{attribute::Attribute, entity::Entity, schema::Schema, value::Value};
use eav_sql::Dialect;
use rusqlite::types::Value as SqlValue;

use crate::{
  Result,
  clause::Scope,
  config::StoreConfig,
  manager::SqliteManager,
  schema::{SCHEMA, value_ddl},
};

pub type SchemaManager = SqliteManager<Schema>;
pub type AttributeManager = SqliteManager<Attribute>;
pub type EntityManager = SqliteManager<Entity>;
pub type ValueManager = SqliteManager<Value>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// An EAV record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Managers
/// handed out by the store share its connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  dialect: Dialect,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn, dialect: Dialect::sqlite() };
    store.init_schema(None).await?;
    tracing::info!(?path, "opened store");
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, dialect: Dialect::sqlite() };
    store.init_schema(None).await?;
    Ok(store)
  }

  /// Open the store described by `config`.
  pub async fn from_config(config: &StoreConfig) -> Result<Self> {
    let conn = if config.is_in_memory() {
      tokio_rusqlite::Connection::open_in_memory().await?
    } else {
      tokio_rusqlite::Connection::open(config.resolved_path()).await?
    };
    let store = Self { conn, dialect: Dialect::sqlite() };
    store.init_schema(config.busy_timeout_ms.map(Duration::from_millis)).await?;
    tracing::info!(path = ?config.resolved_path(), "opened store");
    Ok(store)
  }

  async fn init_schema(&self, busy_timeout: Option<Duration>) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        if let Some(timeout) = busy_timeout {
          conn.busy_timeout(timeout)?;
        }
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&value_ddl())?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The capabilities queries for this store are rendered with.
  pub fn dialect(&self) -> &Dialect { &self.dialect }

  pub(crate) fn conn(&self) -> &tokio_rusqlite::Connection { &self.conn }

  // ── Managers ──────────────────────────────────────────────────────────

  pub fn schemas(&self) -> SchemaManager { SqliteManager::new(self.conn.clone(), None) }

  /// Attributes of every version of the schema lineage `schema_name`,
  /// keyed by attribute name.
  pub fn attributes(&self, schema_name: &str) -> AttributeManager {
    SqliteManager::new(
      self.conn.clone(),
      Some(Scope {
        clause: "r.schema_id IN (SELECT id FROM schema WHERE name = ?)",
        param:  SqlValue::Text(schema_name.to_owned()),
      }),
    )
  }

  pub fn entities(&self) -> EntityManager { SqliteManager::new(self.conn.clone(), None) }

  /// Values of the entity row `entity_id`, keyed by value name.
  pub fn values(&self, entity_id: i64) -> ValueManager {
    SqliteManager::new(
      self.conn.clone(),
      Some(Scope { clause: "r.entity_id = ?", param: SqlValue::Integer(entity_id) }),
    )
  }
}
