//! Registry of admitted schemas and rule sets
//!
//! A [`Registry`] only ever holds artifacts that passed verification:
//! schemas are verified as they are added, rule sets are verified against
//! the schemas already added, and [`RegistryBuilder::build`] runs the
//! referential checks over the complete set. A registry is immutable once
//! built; to change it, build a new one and swap it in through
//! [`crate::SharedRegistry`].

use crate::{
    do_referential_checks, verify_rule_schema, verify_rule_set, SchemaLookup, VerifyError,
    VerifyResult,
};
use crux_types::{is_crux_id, RuleSchema, RuleSet, RuleSetKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A schema together with the kind of class it describes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    #[serde(default)]
    pub kind: RuleSetKind,
    #[serde(flatten)]
    pub schema: RuleSchema,
}

impl SchemaEntry {
    pub fn business(schema: RuleSchema) -> Self {
        Self {
            kind: RuleSetKind::Business,
            schema,
        }
    }

    pub fn workflow(schema: RuleSchema) -> Self {
        Self {
            kind: RuleSetKind::Workflow,
            schema,
        }
    }
}

/// Everything loaded in one go: schemas first, then rule sets
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default)]
    pub schemas: Vec<SchemaEntry>,
    #[serde(default)]
    pub rule_sets: Vec<RuleSet>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, entry: SchemaEntry) -> Self {
        self.schemas.push(entry);
        self
    }

    pub fn with_rule_set(mut self, rule_set: RuleSet) -> Self {
        self.rule_sets.push(rule_set);
        self
    }
}

// ── Registry ─────────────────────────────────────────────────────────

/// Verified, read-only schemas and rule sets
#[derive(Clone, Debug, Default)]
pub struct Registry {
    /// Schemas keyed by class
    schemas: BTreeMap<String, SchemaEntry>,
    /// Rule sets keyed by set name
    rule_sets: BTreeMap<String, RuleSet>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Verify a whole bundle and build a registry from it
    pub fn admit(bundle: Bundle) -> VerifyResult<Registry> {
        let mut builder = RegistryBuilder::new();
        for entry in bundle.schemas {
            builder.add_schema(entry.schema, entry.kind)?;
        }
        for rule_set in bundle.rule_sets {
            builder.add_rule_set(rule_set)?;
        }
        builder.build()
    }

    pub fn schema_entry(&self, class: &str) -> Option<&SchemaEntry> {
        self.schemas.get(class)
    }

    pub fn rule_set(&self, set_name: &str) -> Option<&RuleSet> {
        self.rule_sets.get(set_name)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.schemas.values()
    }

    pub fn rule_sets(&self) -> &BTreeMap<String, RuleSet> {
        &self.rule_sets
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    pub fn rule_set_count(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.rule_sets.is_empty()
    }

    pub fn is_workflow_class(&self, class: &str) -> bool {
        self.schemas
            .get(class)
            .is_some_and(|entry| entry.kind.is_workflow())
    }

    /// Everything in this registry as a bundle
    pub fn to_bundle(&self) -> Bundle {
        Bundle {
            schemas: self.schemas.values().cloned().collect(),
            rule_sets: self.rule_sets.values().cloned().collect(),
        }
    }

    /// A new registry without `set_name`
    ///
    /// Fails if another rule set still transfers control to it.
    pub fn without_rule_set(&self, set_name: &str) -> VerifyResult<Registry> {
        if !self.rule_sets.contains_key(set_name) {
            return Err(VerifyError::RuleSetNotFound(set_name.to_string()));
        }
        let mut rule_sets = self.rule_sets.clone();
        rule_sets.remove(set_name);
        do_referential_checks(&rule_sets)?;
        Ok(Registry {
            schemas: self.schemas.clone(),
            rule_sets,
        })
    }
}

impl SchemaLookup for Registry {
    fn schema(&self, class: &str) -> Option<&RuleSchema> {
        self.schemas.get(class).map(|entry| &entry.schema)
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Accumulates verified artifacts until the referential check
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    schemas: BTreeMap<String, SchemaEntry>,
    rule_sets: BTreeMap<String, RuleSet>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify and add a schema
    pub fn add_schema(&mut self, schema: RuleSchema, kind: RuleSetKind) -> VerifyResult<()> {
        if let Err(err) = verify_rule_schema(&schema, kind.is_workflow()) {
            tracing::warn!(class = %schema.class, error = %err, "Rule schema rejected");
            return Err(err);
        }
        if self.schemas.contains_key(&schema.class) {
            return Err(VerifyError::DuplicateSchema(schema.class));
        }

        tracing::debug!(class = %schema.class, kind = %kind, "Rule schema verified");
        self.schemas
            .insert(schema.class.clone(), SchemaEntry { kind, schema });
        Ok(())
    }

    /// Verify a rule set against the schemas added so far and add it
    pub fn add_rule_set(&mut self, rule_set: RuleSet) -> VerifyResult<()> {
        if !is_crux_id(&rule_set.set_name) {
            return Err(VerifyError::InvalidRuleSetName(rule_set.set_name));
        }
        if self.rule_sets.contains_key(&rule_set.set_name) {
            return Err(VerifyError::DuplicateRuleSet(rule_set.set_name));
        }

        let entry = self
            .schemas
            .get(&rule_set.class)
            .ok_or_else(|| VerifyError::SchemaNotFound(rule_set.class.clone()))?;
        if rule_set.is_workflow() && !entry.kind.is_workflow() {
            return Err(VerifyError::KindMismatch {
                rule_set: rule_set.set_name.clone(),
                class: rule_set.class.clone(),
                expected: entry.kind.to_string(),
                actual: rule_set.kind.to_string(),
            });
        }

        if let Err(err) = verify_rule_set(&rule_set, self, rule_set.is_workflow()) {
            tracing::warn!(rule_set = %rule_set.set_name, error = %err, "Rule set rejected");
            return Err(err);
        }

        tracing::debug!(rule_set = %rule_set.set_name, class = %rule_set.class, "Rule set verified");
        self.rule_sets.insert(rule_set.set_name.clone(), rule_set);
        Ok(())
    }

    /// Run the referential checks and freeze the registry
    pub fn build(self) -> VerifyResult<Registry> {
        if let Err(err) = do_referential_checks(&self.rule_sets) {
            tracing::warn!(error = %err, "Referential check failed");
            return Err(err);
        }

        tracing::info!(
            schemas = self.schemas.len(),
            rule_sets = self.rule_sets.len(),
            "Rule registry admitted"
        );
        Ok(Registry {
            schemas: self.schemas,
            rule_sets: self.rule_sets,
        })
    }
}

impl SchemaLookup for RegistryBuilder {
    fn schema(&self, class: &str) -> Option<&RuleSchema> {
        self.schemas.get(class).map(|entry| &entry.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crux_types::{
        AttrSchema, Operator, Rule, Term, ValueType, DONE, NEXT_STEP, START, STEP, STEP_FAILED,
    };

    fn order_schema() -> RuleSchema {
        RuleSchema::new("order")
            .with_attr(AttrSchema::enumeration(STEP, [START, "approve", "reject"]))
            .with_attr(AttrSchema::new(STEP_FAILED, ValueType::Bool))
            .with_tasks(["approve", "reject"])
            .with_properties([NEXT_STEP, DONE])
    }

    fn pricing_schema() -> RuleSchema {
        RuleSchema::new("cart")
            .with_attr(AttrSchema::new("total", ValueType::Float))
            .with_tasks(["discount", "free_shipping"])
            .with_properties(["pct"])
    }

    fn order_wf() -> RuleSet {
        RuleSet::workflow("order_wf", "order")
            .with_rule(
                Rule::new()
                    .when(Term::equals(STEP, START))
                    .task("approve")
                    .property(NEXT_STEP, "approve"),
            )
            .with_rule(
                Rule::new()
                    .when(Term::equals(STEP, "approve"))
                    .property(DONE, "true"),
            )
    }

    fn cart_rules() -> Vec<RuleSet> {
        vec![
            RuleSet::new("cart_main", "cart").with_rule(
                Rule::new()
                    .when(Term::new("total", Operator::Gt, 100.0))
                    .task("discount")
                    .property("pct", "10")
                    .then_call("cart_extra"),
            ),
            RuleSet::new("cart_extra", "cart").with_rule(
                Rule::new()
                    .when(Term::equals("discount", true))
                    .task("free_shipping"),
            ),
        ]
    }

    fn bundle() -> Bundle {
        cart_rules().into_iter().fold(
            Bundle::new()
                .with_schema(SchemaEntry::workflow(order_schema()))
                .with_schema(SchemaEntry::business(pricing_schema()))
                .with_rule_set(order_wf()),
            Bundle::with_rule_set,
        )
    }

    #[test]
    fn test_admit_bundle() {
        let registry = Registry::admit(bundle()).unwrap();
        assert_eq!(registry.schema_count(), 2);
        assert_eq!(registry.rule_set_count(), 3);
        assert!(registry.is_workflow_class("order"));
        assert!(!registry.is_workflow_class("cart"));
        assert!(registry.rule_set("cart_extra").is_some());
        assert!(registry.schema("order").is_some());
    }

    #[test]
    fn test_rule_set_before_schema_is_rejected() {
        let mut builder = Registry::builder();
        assert_eq!(
            builder.add_rule_set(order_wf()),
            Err(VerifyError::SchemaNotFound("order".into()))
        );
    }

    #[test]
    fn test_invalid_schema_not_added() {
        let mut builder = Registry::builder();
        let mut bad = order_schema();
        bad.pattern_schema.retain(|a| a.name != STEP_FAILED);
        assert!(builder.add_schema(bad, RuleSetKind::Workflow).is_err());
        assert!(builder.schema("order").is_none());
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut builder = Registry::builder();
        builder
            .add_schema(order_schema(), RuleSetKind::Workflow)
            .unwrap();
        assert_eq!(
            builder.add_schema(order_schema(), RuleSetKind::Workflow),
            Err(VerifyError::DuplicateSchema("order".into()))
        );
        builder.add_rule_set(order_wf()).unwrap();
        assert_eq!(
            builder.add_rule_set(order_wf()),
            Err(VerifyError::DuplicateRuleSet("order_wf".into()))
        );
    }

    #[test]
    fn test_rule_set_name_must_be_identifier() {
        let mut builder = Registry::builder();
        builder
            .add_schema(pricing_schema(), RuleSetKind::Business)
            .unwrap();
        let err = builder
            .add_rule_set(RuleSet::new("Cart-Main", "cart"))
            .unwrap_err();
        assert_eq!(err, VerifyError::InvalidRuleSetName("Cart-Main".into()));
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_workflow_rule_set_needs_workflow_schema() {
        let mut builder = Registry::builder();
        builder
            .add_schema(order_schema(), RuleSetKind::Business)
            .unwrap();
        assert!(matches!(
            builder.add_rule_set(order_wf()),
            Err(VerifyError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_dangling_reference_fails_build() {
        let mut bundle = bundle();
        bundle.rule_sets.retain(|s| s.set_name != "cart_extra");
        let err = Registry::admit(bundle).unwrap_err();
        assert_eq!(err, VerifyError::RuleSetNotFound("cart_extra".into()));
        assert_eq!(err.kind(), ErrorKind::Referential);
    }

    #[test]
    fn test_without_rule_set() {
        let registry = Registry::admit(bundle()).unwrap();

        let smaller = registry.without_rule_set("order_wf").unwrap();
        assert_eq!(smaller.rule_set_count(), 2);
        assert_eq!(registry.rule_set_count(), 3);

        assert_eq!(
            registry.without_rule_set("cart_extra").unwrap_err(),
            VerifyError::RuleSetNotFound("cart_extra".into())
        );
        assert!(registry.without_rule_set("nope").is_err());
    }

    #[test]
    fn test_bundle_round_trips_through_registry() {
        let registry = Registry::admit(bundle()).unwrap();
        let again = Registry::admit(registry.to_bundle()).unwrap();
        assert_eq!(again.schema_count(), registry.schema_count());
        assert_eq!(again.rule_sets(), registry.rule_sets());
    }

    #[test]
    fn test_bundle_json_shape() {
        let json = r#"{
            "schemas": [{
                "kind": "W",
                "class": "order",
                "patternSchema": [
                    {"name": "step", "valType": "enum", "vals": ["START", "approve"]},
                    {"name": "stepfailed", "valType": "bool"}
                ],
                "actionSchema": {"tasks": ["approve"], "properties": ["nextstep", "done"]}
            }],
            "ruleSets": [{
                "setName": "order_wf",
                "class": "order",
                "kind": "W",
                "rules": [{
                    "rulePattern": [{"attrName": "step", "op": "eq", "attrVal": "START"}],
                    "ruleActions": {"tasks": ["approve"], "properties": {"nextstep": "approve"}}
                }]
            }]
        }"#;
        let bundle: Bundle = serde_json::from_str(json).unwrap();
        let registry = Registry::admit(bundle).unwrap();
        assert!(registry.is_workflow_class("order"));
        assert!(registry.rule_set("order_wf").unwrap().is_workflow());
    }
}
