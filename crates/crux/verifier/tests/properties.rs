//! Property tests: verification is a pure function of its input, admitted
//! workflow schemas keep the step/task correspondence, and registries stay
//! referentially closed.

use crux_types::*;
use crux_verifier::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Distinct task names for a workflow class.
fn arb_tasks() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z][a-z0-9_]{0,8}", 1..6)
        .prop_map(|set| set.into_iter().filter(|t| t != STEP).collect::<Vec<_>>())
        .prop_filter("at least one task", |tasks| !tasks.is_empty())
}

/// A workflow schema whose step enum is `tasks ∪ {START}`.
fn workflow_schema(tasks: &[String]) -> RuleSchema {
    RuleSchema::new("flow")
        .with_attr(AttrSchema::enumeration(
            STEP,
            tasks.iter().map(String::as_str).chain([START]),
        ))
        .with_attr(AttrSchema::new(STEP_FAILED, ValueType::Bool))
        .with_tasks(tasks.iter().map(String::as_str))
        .with_properties([NEXT_STEP, DONE])
}

/// Rule sets named `s0..sN`, each calling a random set in `0..N + dangling`.
fn arb_call_graph() -> impl Strategy<Value = (usize, Vec<Option<usize>>)> {
    (1usize..8).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec(prop::option::of(0..n + 2), n),
        )
    })
}

fn call_graph(n: usize, calls: &[Option<usize>]) -> BTreeMap<String, RuleSet> {
    (0..n)
        .map(|i| {
            let mut rule = Rule::new();
            if let Some(target) = calls[i] {
                rule = rule.then_call(format!("s{target}"));
            }
            let set = RuleSet::new(format!("s{i}"), "flow").with_rule(rule);
            (set.set_name.clone(), set)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// A schema whose step enum matches its tasks is always admitted, and
    /// verifying it again gives the same answer.
    #[test]
    fn matching_step_enum_is_admitted(tasks in arb_tasks()) {
        let schema = workflow_schema(&tasks);
        let first = verify_rule_schema(&schema, true);
        prop_assert_eq!(&first, &Ok(()));
        prop_assert_eq!(verify_rule_schema(&schema, true), first);
    }

    /// Dropping any task from the action-schema breaks the correspondence.
    #[test]
    fn missing_task_is_rejected(tasks in arb_tasks(), pick in any::<prop::sample::Index>()) {
        let mut schema = workflow_schema(&tasks);
        let dropped = pick.get(&tasks).clone();
        schema.action_schema.tasks = tasks
            .iter()
            .filter(|t| **t != dropped)
            .map(String::as_str)
            .collect();

        let result = verify_rule_schema(&schema, true);
        prop_assert!(result.is_err());
        prop_assert_eq!(verify_rule_schema(&schema, true), result);
    }

    /// The referential check passes exactly when no call leaves the graph.
    #[test]
    fn referential_check_matches_closure((n, calls) in arb_call_graph()) {
        let sets = call_graph(n, &calls);
        let closed = calls.iter().flatten().all(|target| *target < n);
        prop_assert_eq!(do_referential_checks(&sets).is_ok(), closed);
    }

    /// Removing a rule set another set calls breaks a previously closed graph.
    #[test]
    fn removing_called_set_breaks_closure((n, calls) in arb_call_graph()) {
        let mut sets = call_graph(n, &calls);
        prop_assume!(do_referential_checks(&sets).is_ok());

        let external = calls
            .iter()
            .enumerate()
            .find_map(|(caller, target)| target.filter(|t| *t != caller));
        if let Some(target) = external {
            sets.remove(&format!("s{target}"));
            prop_assert!(do_referential_checks(&sets).is_err());
        }
    }

    /// Entity verification is idempotent for any step value.
    #[test]
    fn entity_verification_is_idempotent(tasks in arb_tasks(), failed in any::<bool>()) {
        let schemas = vec![workflow_schema(&tasks)];
        let entity = Entity::new("flow")
            .with_attr(STEP, tasks[0].as_str())
            .with_attr(STEP_FAILED, failed);
        let first = verify_entity(&entity, &schemas);
        prop_assert_eq!(&first, &Ok(()));
        prop_assert_eq!(verify_entity(&entity, &schemas), first);
    }
}
