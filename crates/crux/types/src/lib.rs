//! Crux domain types
//!
//! Everything the verifiers, the rule matcher and the workflow store agree
//! on lives here:
//!
//! - [`RuleSchema`]: the declared shape of facts of one class
//!   (pattern-schema + action-schema)
//! - [`RuleSet`]: an ordered list of pattern→action [`Rule`]s bound to a class
//! - [`Entity`]: a concrete fact checked against its class schema
//! - [`WfInstance`]: one append-only row of a workflow instance history
//!
//! Values are a closed tagged variant ([`Value`]) over the six declared
//! value types ([`ValueType`]); operators are the six comparison tokens
//! ([`Operator`]).
//!
//! # Example
//!
//! ```rust
//! use crux_types::*;
//!
//! let schema = RuleSchema::new("order")
//!     .with_attr(AttrSchema::enumeration("step", ["START", "approve", "reject"]))
//!     .with_attr(AttrSchema::new("stepfailed", ValueType::Bool))
//!     .with_tasks(["approve", "reject"])
//!     .with_properties([NEXT_STEP, DONE]);
//!
//! assert_eq!(schema.attr_type("stepfailed"), Some(ValueType::Bool));
//! assert!(schema.action_schema.tasks.contains("approve"));
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod entity;
pub mod ident;
pub mod instance;
pub mod rule_set;
pub mod schema;
pub mod value;
pub mod value_set;

pub use entity::Entity;
pub use ident::{is_crux_id, CRUX_ID_PATTERN, DONE, NEXT_STEP, START, STEP, STEP_FAILED, TRUE_STR};
pub use instance::{InstanceKey, NewWfInstance, WfInstance};
pub use rule_set::{Actions, Rule, RuleSet, RuleSetKind, Term};
pub use schema::{ActionSchema, AttrSchema, RuleSchema};
pub use value::{
    is_valid_operator, parse_timestamp, validate_literal, Operator, Value, ValueType,
    TIMESTAMP_FORMAT,
};
pub use value_set::ValueSet;
