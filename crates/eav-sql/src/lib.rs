//! SQL layer for the EAV record store.
//!
//! Names the persisted layout, describes what each relational backend can
//! do, and materialises a [`HeaderPlan`](eav_core::header::HeaderPlan) into
//! one flat query: one row per entity, one column per planned attribute.
//! Rendering is pure text; executing the result is the backend's job.

pub mod dialect;
pub mod error;
pub mod layout;
pub mod materialize;

pub use dialect::{Backend, Capabilities, DateCastStrategy, Dialect};
pub use error::{Error, Result};
pub use materialize::{Filter, MaterializedQuery, SqlParam, Statement, materialize};
