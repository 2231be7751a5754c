//! SQLite backend for the EAV record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Implements the
//! [`Manager`](eav_core::manager::Manager) trait for every record kind,
//! [`Hierarchy`](eav_core::hierarchy::Hierarchy) and
//! [`AttributeCatalog`](eav_core::header::AttributeCatalog), and executes
//! materialised queries.

mod catalog;
mod clause;
mod encode;
mod hierarchy;
mod query;
mod schema;
mod store;

pub mod config;
pub mod error;
pub mod manager;
pub mod record;

pub use crate::config::StoreConfig;
pub use error::{Error, Result};
pub use manager::SqliteManager;
pub use query::Row;
pub use store::{AttributeManager, EntityManager, SchemaManager, SqliteStore, ValueManager};

#[cfg(test)]
mod tests;
