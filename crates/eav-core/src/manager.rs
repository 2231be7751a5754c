//! The `Manager` trait: generic temporal CRUD over one record kind.
//!
//! The trait is implemented by storage backends (e.g. `eav-store-sqlite`),
//! once per record kind and bound to one connection. Higher layers depend
//! on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::temporal::{Lifespan, Selector, Versioned};

/// Temporal CRUD over the lineages of one record kind.
///
/// Every write keeps the single-active-version invariant: for any key, at
/// most one row has no `remove_date`. Not-found and no-op outcomes are
/// reported through `Option` and `bool`, never as errors.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait Manager: Send + Sync {
  /// The kind-specific body stored in each [`Versioned`] row.
  type Item: Send + 'static;
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Names of the lineages matched by `selector`, sorted and distinct.
  fn keys(
    &self,
    selector: Selector,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Whether any row of `key` is matched by `selector`.
  fn has<'a>(
    &'a self,
    key: &'a str,
    selector: Selector,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// The full history of `key`, oldest first.
  fn lifecycles<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Vec<Lifespan>, Self::Error>> + Send + 'a;

  /// The version of `key` active at `on` (default: now). Returns `None`
  /// when no version is active then.
  fn get<'a>(
    &'a self,
    key: &'a str,
    on: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Option<Versioned<Self::Item>>, Self::Error>>
  + Send
  + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Store `item` as the new active version of `key`, created now.
  /// Any currently active version is retired at the same instant.
  fn put<'a>(
    &'a self,
    key: &'a str,
    item: Self::Item,
  ) -> impl Future<Output = Result<Versioned<Self::Item>, Self::Error>> + Send + 'a;

  /// Like [`put`](Self::put), with an explicit creation instant.
  ///
  /// `at` must follow the newest existing version of `key`: later than its
  /// `create_date` and no earlier than its `remove_date`.
  fn put_at<'a>(
    &'a self,
    key: &'a str,
    item: Self::Item,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Versioned<Self::Item>, Self::Error>> + Send + 'a;

  /// Overwrite the body of the active version of `key` in place and bump its
  /// `modify_date`. Returns `None` if no version is active.
  fn amend<'a>(
    &'a self,
    key: &'a str,
    item: Self::Item,
  ) -> impl Future<Output = Result<Option<Versioned<Self::Item>>, Self::Error>>
  + Send
  + 'a;

  /// Retire the active version of `key`. Returns `false` if none is active.
  fn retire<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Re-activate the most recently retired version of `key`.
  ///
  /// Returns the active version unmodified if one exists, and `None` if
  /// there is nothing to restore.
  fn restore<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Versioned<Self::Item>>, Self::Error>>
  + Send
  + 'a;

  /// Permanently delete the rows of `key` matched by `selector`.
  ///
  /// Dependent records (an attribute's values, a schema's entities) are left
  /// in place; the returned count covers only rows of this kind.
  fn purge<'a>(
    &'a self,
    key: &'a str,
    selector: Selector,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;
}
