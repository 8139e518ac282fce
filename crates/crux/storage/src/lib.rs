//! Crux storage abstractions.
//!
//! This crate defines the persistence contract the workflow-instance
//! service depends on:
//! - rule-set rows with their active/internal flags (`brwf` = B or W)
//! - class schemas keyed by (slice, app, class)
//! - append-only workflow instance history keyed by
//!   (slice, app, workflow, entityid)
//!
//! [`memory::InMemoryCruxStorage`] backs tests and the default daemon
//! config. The `postgres` feature adds `postgres::PostgresCruxStorage`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryCruxStorage;
pub use model::{RuleSetRow, RuleSetRowKey, SchemaRow, SchemaRowKey};
pub use traits::WorkflowStore;
