//! Temporal primitives shared by every versioned record.
//!
//! A record's `name` is its lineage. Each row in a lineage covers the
//! half-open interval `[create_date, remove_date)`; a `remove_date` of
//! `None` marks the currently active row. Retiring a row only sets its
//! `remove_date`, so history is append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Selector ────────────────────────────────────────────────────────────────

/// Which rows of a lineage an operation considers.
///
/// Replaces the mutually exclusive `on` / `ever` argument pair: exactly one
/// of the three cases can be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selector {
  /// Rows active now (`remove_date IS NULL`).
  #[default]
  Current,
  /// Rows whose interval contains the given instant.
  On(DateTime<Utc>),
  /// Every row that ever existed, retired ones included.
  Ever,
}

impl Selector {
  /// `Some(at)` becomes [`Selector::On`], `None` becomes
  /// [`Selector::Current`].
  pub fn on(at: Option<DateTime<Utc>>) -> Self {
    at.map_or(Self::Current, Self::On)
  }

  pub fn matches(&self, lifespan: &Lifespan) -> bool {
    match self {
      Self::Current => lifespan.is_active(),
      Self::On(at) => lifespan.contains(*at),
      Self::Ever => true,
    }
  }
}

// ─── Lifespan ────────────────────────────────────────────────────────────────

/// One entry of a lineage's history, as returned by
/// [`Manager::lifecycles`](crate::manager::Manager::lifecycles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifespan {
  pub create_date: DateTime<Utc>,
  pub remove_date: Option<DateTime<Utc>>,
}

impl Lifespan {
  pub fn is_active(&self) -> bool { self.remove_date.is_none() }

  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    self.create_date <= at && self.remove_date.is_none_or(|removed| at < removed)
  }

  /// The earliest instant at which a successor version may start.
  pub fn latest_bound(&self) -> DateTime<Utc> {
    self.remove_date.unwrap_or(self.create_date)
  }
}

// ─── Versioned ───────────────────────────────────────────────────────────────

/// A stored row of any temporal record kind: the shared bookkeeping columns
/// plus the kind-specific body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
  /// Row id assigned by the store. Unique per row, not per lineage.
  pub id:          i64,
  pub name:        String,
  pub create_date: DateTime<Utc>,
  /// Bumped by in-place amendments; equals `create_date` otherwise.
  pub modify_date: DateTime<Utc>,
  pub remove_date: Option<DateTime<Utc>>,
  pub item:        T,
}

impl<T> Versioned<T> {
  pub fn lifespan(&self) -> Lifespan {
    Lifespan { create_date: self.create_date, remove_date: self.remove_date }
  }

  pub fn is_active(&self) -> bool { self.remove_date.is_none() }

  pub fn is_active_on(&self, at: DateTime<Utc>) -> bool {
    self.lifespan().contains(at)
  }
}

/// Check that `lifecycles` is strictly increasing and non-overlapping, with
/// at most one open interval, which must be the last.
pub fn is_well_ordered(lifecycles: &[Lifespan]) -> bool {
  lifecycles.windows(2).all(|pair| match pair[0].remove_date {
    Some(removed) => {
      pair[0].create_date < pair[1].create_date && removed <= pair[1].create_date
    }
    None => false,
  })
}
