//! Schema lookup seam shared by the rule-set and entity verifiers

use crate::{VerifyError, VerifyResult};
use crux_types::RuleSchema;
use std::collections::{BTreeMap, HashMap};

/// Anything that can resolve a class name to its verified schema
pub trait SchemaLookup {
    fn schema(&self, class: &str) -> Option<&RuleSchema>;

    /// Resolve `class`, failing with [`VerifyError::SchemaNotFound`]
    fn require_schema(&self, class: &str) -> VerifyResult<&RuleSchema> {
        self.schema(class)
            .ok_or_else(|| VerifyError::SchemaNotFound(class.to_string()))
    }
}

impl SchemaLookup for BTreeMap<String, RuleSchema> {
    fn schema(&self, class: &str) -> Option<&RuleSchema> {
        self.get(class)
    }
}

impl SchemaLookup for HashMap<String, RuleSchema> {
    fn schema(&self, class: &str) -> Option<&RuleSchema> {
        self.get(class)
    }
}

impl SchemaLookup for [RuleSchema] {
    fn schema(&self, class: &str) -> Option<&RuleSchema> {
        self.iter().find(|s| s.class == class)
    }
}

impl SchemaLookup for Vec<RuleSchema> {
    fn schema(&self, class: &str) -> Option<&RuleSchema> {
        self.as_slice().schema(class)
    }
}
