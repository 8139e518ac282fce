//! Crux service layer
//!
//! Puts the verified registry to work:
//!
//! - [`match_rule_set`] evaluates a rule set against an entity
//! - [`WorkflowInstanceService`] starts workflow instances over a
//!   [`crux_storage::WorkflowStore`], one exclusive start per entity
//! - [`SchemaService`] keeps verified class schemas in the store
//! - [`CruxConfig`] and [`load_registry`] back the `cruxd` binary

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod bundle;
pub mod config;
pub mod error;
pub mod instance;
pub mod locks;
pub mod matcher;
pub mod schemas;

pub use bundle::{load_bundle, load_registry, parse_bundle, BundleFormat};
pub use config::{CruxConfig, LoggingConfig, RulesConfig, StorageConfig};
pub use error::{ServiceError, ServiceResult};
pub use instance::{StartInstanceRequest, StartOutcome, StartedRow, WorkflowInstanceService};
pub use locks::InstanceLocks;
pub use matcher::{match_rule_set, ActionSet};
pub use schemas::SchemaService;
