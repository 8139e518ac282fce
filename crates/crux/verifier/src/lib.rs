//! Static verification for Crux rules
//!
//! Rule schemas, rule sets and entities are checked here before anything
//! is allowed to run against them. Each verifier is a pure function that
//! stops at the first violation and returns a [`VerifyError`].
//!
//! # Architecture
//!
//! - [`verify_rule_schema`]: structural checks on a class schema, plus the
//!   reserved step/stepfailed/nextstep/done shape for workflow classes
//! - [`verify_rule_set`]: a rule set against its bound schema
//!   ([`verify_rule_patterns`] then [`verify_rule_actions`])
//! - [`do_referential_checks`]: every `thenCall`/`elseCall` resolves
//! - [`verify_entity`]: a fact against its class schema
//! - [`Registry`]: the admission pipeline tying these together, with
//!   [`SharedRegistry`] for swapping in a reloaded registry
//!
//! # Example
//!
//! ```rust
//! use crux_types::*;
//! use crux_verifier::{verify_rule_schema, verify_rule_set};
//!
//! let schema = RuleSchema::new("order")
//!     .with_attr(AttrSchema::enumeration(STEP, [START, "approve"]))
//!     .with_attr(AttrSchema::new(STEP_FAILED, ValueType::Bool))
//!     .with_tasks(["approve"])
//!     .with_properties([NEXT_STEP, DONE]);
//! verify_rule_schema(&schema, true).unwrap();
//!
//! let rules = RuleSet::workflow("order_wf", "order").with_rule(
//!     Rule::new()
//!         .when(Term::equals(STEP, START))
//!         .task("approve")
//!         .property(NEXT_STEP, "approve"),
//! );
//! verify_rule_set(&rules, &vec![schema], true).unwrap();
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod entity;
pub mod error;
pub mod lookup;
pub mod referential;
pub mod registry;
pub mod rule_set;
pub mod schema;
pub mod shared;

pub use entity::{typed_attrs, verify_entity};
pub use error::{ErrorKind, VerifyError, VerifyResult};
pub use lookup::SchemaLookup;
pub use referential::do_referential_checks;
pub use registry::{Bundle, Registry, RegistryBuilder, SchemaEntry};
pub use rule_set::{verify_rule_actions, verify_rule_patterns, verify_rule_set};
pub use schema::verify_rule_schema;
pub use shared::SharedRegistry;
