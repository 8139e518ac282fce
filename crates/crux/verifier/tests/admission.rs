//! End-to-end admission tests: schemas, workflow rule sets, references and
//! entities for a small order-approval workflow.

use crux_types::*;
use crux_verifier::*;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn order_schema() -> RuleSchema {
    RuleSchema::new("order")
        .with_attr(AttrSchema::enumeration(STEP, [START, "approve", "reject"]))
        .with_attr(AttrSchema::new(STEP_FAILED, ValueType::Bool))
        .with_tasks(["approve", "reject"])
        .with_properties([NEXT_STEP, DONE])
}

fn order_workflow() -> RuleSet {
    RuleSet::workflow("order_wf", "order")
        .with_rule(
            Rule::new()
                .when(Term::equals(STEP, START))
                .when(Term::equals(STEP_FAILED, false))
                .task("approve")
                .property(NEXT_STEP, "approve"),
        )
        .with_rule(
            Rule::new()
                .when(Term::equals(STEP, START))
                .when(Term::equals(STEP_FAILED, true))
                .task("reject")
                .property(NEXT_STEP, "reject"),
        )
        .with_rule(
            Rule::new()
                .when(Term::equals(STEP, "approve"))
                .property(DONE, TRUE_STR),
        )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn workflow_schema_is_accepted() {
    assert_eq!(verify_rule_schema(&order_schema(), true), Ok(()));
}

#[test]
fn workflow_schema_without_stepfailed_is_rejected() {
    let mut schema = order_schema();
    schema.pattern_schema.retain(|a| a.name != STEP_FAILED);

    let err = verify_rule_schema(&schema, true).unwrap_err();
    assert_eq!(err, VerifyError::MissingWorkflowAttributes("order".into()));
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

#[test]
fn return_and_exit_conflict_is_rejected() {
    let mut rules = order_workflow();
    rules.rules[0].rule_actions.will_return = true;
    rules.rules[0].rule_actions.will_exit = true;

    let err = verify_rule_actions(&rules, &order_schema(), true).unwrap_err();
    assert!(err.to_string().contains("RETURN and EXIT"));
}

#[test]
fn workflow_rule_without_step_term_is_rejected() {
    let rules = RuleSet::workflow("order_wf", "order").with_rule(
        Rule::new()
            .when(Term::equals(STEP_FAILED, false))
            .task("approve")
            .property(NEXT_STEP, "approve"),
    );
    let err = verify_rule_patterns(&rules, &order_schema(), true).unwrap_err();
    assert!(err.to_string().contains("no 'step' attribute found"));
}

#[test]
fn missing_call_target_fails_referential_check() {
    let rules: std::collections::BTreeMap<_, _> = [RuleSet::new("R1", "order")
        .with_rule(Rule::new().then_call("R2"))]
    .into_iter()
    .map(|s| (s.set_name.clone(), s))
    .collect();

    let err = do_referential_checks(&rules).unwrap_err();
    assert_eq!(err.to_string(), "ruleset R2 does not exist");
}

#[test]
fn partial_entity_is_rejected() {
    let entity = Entity::new("order").with_attr(STEP, "approve");
    let err = verify_entity(&entity, &vec![order_schema()]).unwrap_err();
    assert!(matches!(err, VerifyError::EntityAttributeCount { .. }));
    assert_eq!(err.kind(), ErrorKind::Entity);
}

// ---------------------------------------------------------------------------
// Registry admission
// ---------------------------------------------------------------------------

#[test]
fn registry_admits_workflow_and_checks_entities() {
    let registry = Registry::admit(
        Bundle::new()
            .with_schema(SchemaEntry::workflow(order_schema()))
            .with_rule_set(order_workflow()),
    )
    .unwrap();

    let entity = Entity::new("order")
        .with_attr(STEP, START)
        .with_attr(STEP_FAILED, false);
    assert_eq!(verify_entity(&entity, &registry), Ok(()));
    assert!(registry.is_workflow_class("order"));
}

#[test]
fn bundle_is_all_or_nothing() {
    let mut bad = order_workflow();
    bad.rules[2].rule_actions.properties.clear();

    let shared = SharedRegistry::default();
    let bundle = Bundle::new()
        .with_schema(SchemaEntry::workflow(order_schema()))
        .with_rule_set(bad);
    assert_eq!(
        shared.reload(bundle).unwrap_err(),
        VerifyError::NoNextStepOrDone("order_wf".into())
    );
    assert!(shared.load().is_empty());
}

#[test]
fn yaml_bundle_is_admitted() {
    let yaml = r#"
schemas:
  - kind: W
    class: order
    patternSchema:
      - { name: step, valType: enum, vals: [START, approve, reject] }
      - { name: stepfailed, valType: bool }
    actionSchema:
      tasks: [approve, reject]
      properties: [nextstep, done]
ruleSets:
  - setName: order_wf
    class: order
    kind: W
    rules:
      - rulePattern:
          - { attrName: step, op: eq, attrVal: START }
        ruleActions:
          tasks: [approve]
          properties: { nextstep: approve }
"#;
    let bundle: Bundle = serde_yaml::from_str(yaml).unwrap();
    let registry = Registry::admit(bundle).unwrap();
    assert_eq!(registry.rule_set_count(), 1);
}
