//! [`SqliteManager`]: the SQLite implementation of [`Manager`].
//!
//! One generic manager serves every record kind; the kind-specific parts live
//! in [`Record`]. Writes run in `IMMEDIATE` transactions, so the check of the
//! single-active-row invariant and the write that relies on it cannot
//! interleave with another writer.

use std::marker::PhantomData;

use chrono::{DateTime, TimeDelta, Utc};
use eav_core::{
  manager::Manager,
  temporal::{Lifespan, Selector, Versioned},
};
use rusqlite::{Connection, TransactionBehavior, params, params_from_iter};

use crate::{
  Error, Result,
  clause::{self, Scope},
  encode::{decode_lifespan, encode_dt, truncate_dt},
  record::{Handle, Record},
};

/// Temporal CRUD over the records of kind `R`.
///
/// Cloning is cheap; the inner connection is reference-counted.
pub struct SqliteManager<R> {
  conn:  tokio_rusqlite::Connection,
  scope: Option<Scope>,
  kind:  PhantomData<fn() -> R>,
}

impl<R> Clone for SqliteManager<R> {
  fn clone(&self) -> Self {
    Self { conn: self.conn.clone(), scope: self.scope.clone(), kind: PhantomData }
  }
}

impl<R: Record> SqliteManager<R> {
  pub(crate) fn new(conn: tokio_rusqlite::Connection, scope: Option<Scope>) -> Self {
    Self { conn, scope, kind: PhantomData }
  }

  /// Run `f` on the connection thread.
  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection, Option<&Scope>) -> Result<T> + Send + 'static,
  {
    let scope = self.scope.clone();
    self.conn.call(move |conn| Ok(f(conn, scope.as_ref()))).await?
  }

  async fn put_version(
    &self,
    key: &str,
    item: R,
    at: Option<DateTime<Utc>>,
  ) -> Result<Versioned<R>> {
    let key = key.to_owned();
    let raw = self.call(move |conn, scope| put_tx::<R>(conn, &key, &item, at, scope)).await?;
    R::decode(raw)
  }
}

// ─── Blocking helpers ────────────────────────────────────────────────────────

/// Rows of `key` under `selector` and `scope`, oldest first.
fn handles<R: Record>(
  conn: &Connection,
  key: &str,
  selector: Selector,
  scope: Option<&Scope>,
) -> Result<Vec<Handle>> {
  let (filter, params) = clause::lineage(Some(key), selector, scope);
  let sql = format!(
    "SELECT r.id, {table}, r.create_date, r.remove_date FROM {source} AS r
      WHERE {filter} ORDER BY r.create_date, r.id",
    table = R::TABLE,
    source = R::SOURCE,
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params_from_iter(params), |row| {
      Ok((
        row.get::<_, i64>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, Option<String>>(3)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  rows
    .into_iter()
    .map(|(id, table, create_date, remove_date)| {
      Ok(Handle { table, id, lifespan: decode_lifespan(&create_date, remove_date.as_deref())? })
    })
    .collect()
}

/// The single active row of `key`, if any.
fn active<R: Record>(conn: &Connection, key: &str, scope: Option<&Scope>) -> Result<Option<Handle>> {
  let mut rows = handles::<R>(conn, key, Selector::Current, scope)?;
  if rows.len() > 1 {
    return Err(Error::consistency(format!(
      "{} {key:?} has {} active versions",
      R::KIND,
      rows.len()
    )));
  }
  Ok(rows.pop())
}

fn read_row<R: Record>(conn: &Connection, handle: (&str, i64)) -> Result<R::Raw> {
  let sql = format!(
    "SELECT {columns} FROM {source} AS r WHERE r.id = ?1 AND {table} = ?2",
    columns = R::COLUMNS,
    source = R::SOURCE,
    table = R::TABLE,
  );
  Ok(conn.query_row(&sql, params![handle.1, handle.0], R::read)?)
}

/// Fail unless `handle` is the one active row of `key` within `scope`.
fn ensure_visible<R: Record>(
  conn: &Connection,
  key: &str,
  handle: (&str, i64),
  scope: Option<&Scope>,
) -> Result<()> {
  match active::<R>(conn, key, scope)? {
    Some(found) if found.table == handle.0 && found.id == handle.1 => Ok(()),
    _ => Err(Error::consistency(format!(
      "{} {key:?} written outside the scope of its manager",
      R::KIND
    ))),
  }
}

fn put_tx<R: Record>(
  conn: &mut Connection,
  key: &str,
  item: &R,
  at: Option<DateTime<Utc>>,
  scope: Option<&Scope>,
) -> Result<R::Raw> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let history = handles::<R>(&tx, key, Selector::Ever, scope)?;
  let current: Vec<&Handle> = history.iter().filter(|h| h.lifespan.is_active()).collect();
  if current.len() > 1 {
    return Err(Error::consistency(format!(
      "{} {key:?} has {} active versions",
      R::KIND,
      current.len()
    )));
  }

  // The newest row bounds the new one: it must start after that row was
  // created and no earlier than it was retired. An implicit "now" is nudged
  // past the bound instead of failing on clock resolution.
  let latest = history.iter().max_by_key(|h| h.lifespan.latest_bound());
  let at = match (at, latest) {
    (Some(at), _) => truncate_dt(at),
    (None, None) => truncate_dt(Utc::now()),
    (None, Some(latest)) => truncate_dt(Utc::now())
      .max(latest.lifespan.latest_bound())
      .max(latest.lifespan.create_date + TimeDelta::microseconds(1)),
  };
  if let Some(latest) = latest {
    let bound = latest.lifespan.latest_bound();
    if at <= latest.lifespan.create_date || at < bound {
      return Err(
        eav_core::Error::Chronology { key: key.to_owned(), at, latest: bound }.into(),
      );
    }
  }

  let stamp = encode_dt(at);
  for handle in &current {
    tx.execute(
      &format!("UPDATE {} SET remove_date = ?1 WHERE id = ?2", handle.table),
      params![stamp, handle.id],
    )?;
  }

  let (table, id) = R::insert(&tx, key, &stamp, item)?;
  ensure_visible::<R>(&tx, key, (table.as_str(), id), scope)?;
  let mut carried = 0;
  for handle in &current {
    carried += R::carry_forward(&tx, handle, id, &stamp)?;
  }
  let raw = read_row::<R>(&tx, (table.as_str(), id))?;
  tx.commit()?;

  tracing::debug!(
    kind = R::KIND,
    key,
    id,
    at = %stamp,
    retired = current.len(),
    carried,
    "put version"
  );
  Ok(raw)
}

fn amend_tx<R: Record>(
  conn: &mut Connection,
  key: &str,
  item: &R,
  scope: Option<&Scope>,
) -> Result<Option<R::Raw>> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let Some(handle) = active::<R>(&tx, key, scope)? else { return Ok(None) };

  R::update(&tx, &handle, item)?;
  let now = encode_dt(truncate_dt(Utc::now()).max(handle.lifespan.create_date));
  tx.execute(
    &format!("UPDATE {} SET modify_date = ?1 WHERE id = ?2", handle.table),
    params![now, handle.id],
  )?;
  ensure_visible::<R>(&tx, key, (handle.table.as_str(), handle.id), scope)?;
  let raw = read_row::<R>(&tx, (handle.table.as_str(), handle.id))?;
  tx.commit()?;

  tracing::debug!(kind = R::KIND, key, id = handle.id, "amended version");
  Ok(Some(raw))
}

fn retire_tx<R: Record>(conn: &mut Connection, key: &str, scope: Option<&Scope>) -> Result<bool> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let Some(handle) = active::<R>(&tx, key, scope)? else { return Ok(false) };

  // Never retire before creation; a future-dated row is closed at its start.
  let now = encode_dt(truncate_dt(Utc::now()).max(handle.lifespan.create_date));
  tx.execute(
    &format!("UPDATE {} SET remove_date = ?1 WHERE id = ?2", handle.table),
    params![now, handle.id],
  )?;
  tx.commit()?;

  tracing::debug!(kind = R::KIND, key, id = handle.id, "retired version");
  Ok(true)
}

fn restore_tx<R: Record>(
  conn: &mut Connection,
  key: &str,
  scope: Option<&Scope>,
) -> Result<Option<R::Raw>> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  if let Some(handle) = active::<R>(&tx, key, scope)? {
    return Ok(Some(read_row::<R>(&tx, (handle.table.as_str(), handle.id))?));
  }

  let history = handles::<R>(&tx, key, Selector::Ever, scope)?;
  let Some(latest) = history.last() else { return Ok(None) };
  tx.execute(
    &format!("UPDATE {} SET remove_date = NULL WHERE id = ?1", latest.table),
    params![latest.id],
  )?;
  let raw = read_row::<R>(&tx, (latest.table.as_str(), latest.id))?;
  tx.commit()?;

  tracing::debug!(kind = R::KIND, key, id = latest.id, "restored version");
  Ok(Some(raw))
}

fn purge_tx<R: Record>(
  conn: &mut Connection,
  key: &str,
  selector: Selector,
  scope: Option<&Scope>,
) -> Result<usize> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let doomed = handles::<R>(&tx, key, selector, scope)?;
  let mut count = 0;
  for handle in &doomed {
    R::purge_owned(&tx, handle)?;
    count += tx.execute(&format!("DELETE FROM {} WHERE id = ?1", handle.table), params![handle.id])?;
  }
  tx.commit()?;

  tracing::debug!(kind = R::KIND, key, ?selector, count, "purged versions");
  Ok(count)
}

// ─── Manager impl ────────────────────────────────────────────────────────────

impl<R: Record> Manager for SqliteManager<R> {
  type Item = R;
  type Error = Error;

  async fn keys(&self, selector: Selector) -> Result<Vec<String>> {
    self
      .call(move |conn, scope| {
        let (filter, params) = clause::lineage(None, selector, scope);
        let sql = format!(
          "SELECT DISTINCT r.name FROM {} AS r WHERE {filter} ORDER BY r.name",
          R::SOURCE
        );
        let mut stmt = conn.prepare(&sql)?;
        let keys = stmt
          .query_map(params_from_iter(params), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
      })
      .await
  }

  async fn has(&self, key: &str, selector: Selector) -> Result<bool> {
    let key = key.to_owned();
    self
      .call(move |conn, scope| {
        let (filter, params) = clause::lineage(Some(&key), selector, scope);
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} AS r WHERE {filter})", R::SOURCE);
        Ok(conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?)
      })
      .await
  }

  async fn lifecycles(&self, key: &str) -> Result<Vec<Lifespan>> {
    let key = key.to_owned();
    self
      .call(move |conn, scope| {
        Ok(
          handles::<R>(conn, &key, Selector::Ever, scope)?
            .into_iter()
            .map(|h| h.lifespan)
            .collect(),
        )
      })
      .await
  }

  async fn get(&self, key: &str, on: Option<DateTime<Utc>>) -> Result<Option<Versioned<R>>> {
    let key = key.to_owned();
    let raw = self
      .call(move |conn, scope| {
        let (filter, params) = clause::lineage(Some(&key), Selector::on(on), scope);
        let sql = format!(
          "SELECT {} FROM {} AS r WHERE {filter} ORDER BY r.create_date DESC",
          R::COLUMNS,
          R::SOURCE
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
          .query_map(params_from_iter(params), R::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        if rows.len() > 1 {
          return Err(Error::consistency(format!(
            "{} {key:?} has {} versions active at once",
            R::KIND,
            rows.len()
          )));
        }
        Ok(rows.pop())
      })
      .await?;
    raw.map(R::decode).transpose()
  }

  async fn put(&self, key: &str, item: R) -> Result<Versioned<R>> {
    self.put_version(key, item, None).await
  }

  async fn put_at(&self, key: &str, item: R, at: DateTime<Utc>) -> Result<Versioned<R>> {
    self.put_version(key, item, Some(at)).await
  }

  async fn amend(&self, key: &str, item: R) -> Result<Option<Versioned<R>>> {
    let key = key.to_owned();
    let raw = self.call(move |conn, scope| amend_tx::<R>(conn, &key, &item, scope)).await?;
    raw.map(R::decode).transpose()
  }

  async fn retire(&self, key: &str) -> Result<bool> {
    let key = key.to_owned();
    self.call(move |conn, scope| retire_tx::<R>(conn, &key, scope)).await
  }

  async fn restore(&self, key: &str) -> Result<Option<Versioned<R>>> {
    let key = key.to_owned();
    let raw = self.call(move |conn, scope| restore_tx::<R>(conn, &key, scope)).await?;
    raw.map(R::decode).transpose()
  }

  async fn purge(&self, key: &str, selector: Selector) -> Result<usize> {
    let key = key.to_owned();
    self.call(move |conn, scope| purge_tx::<R>(conn, &key, selector, scope)).await
  }
}
