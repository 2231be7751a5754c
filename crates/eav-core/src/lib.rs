//! Core types and trait definitions for the EAV record store.
//!
//! This crate has no database dependencies. It defines the
//! temporal record model (schemas, attributes, entities, values), the
//! contracts storage backends implement, and the backend-independent header
//! planner that flattens a schema lineage into columns.

// Traits declare `Send` futures explicitly; the advisory lint does not apply.
#![allow(async_fn_in_trait)]

pub mod attribute;
pub mod entity;
pub mod error;
pub mod header;
pub mod hierarchy;
pub mod manager;
pub mod schema;
pub mod temporal;
pub mod value;

pub use error::{Error, Result};
