//! The `Hierarchy` trait: one level of schema containment.
//!
//! A parent schema embeds a child through an `object` attribute whose
//! `object_schema_id` names the child version. There is no separate
//! containment table.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{schema::Schema, temporal::Versioned};

pub trait Hierarchy: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Child schema versions of the version of `key` active at `on`.
  ///
  /// Does not recurse; walk the tree by calling again on each child. An
  /// unknown or inactive `key` yields an empty list.
  fn children<'a>(
    &'a self,
    key: &'a str,
    on: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Versioned<Schema>>, Self::Error>> + Send + 'a;

  /// Names of [`children`](Self::children), in the same order.
  fn children_names<'a>(
    &'a self,
    key: &'a str,
    on: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a {
    async move {
      Ok(self.children(key, on).await?.into_iter().map(|s| s.name).collect())
    }
  }
}
