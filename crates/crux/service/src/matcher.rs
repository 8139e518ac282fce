//! Forward evaluation of a rule set against one entity
//!
//! Rules are visited in declaration order. A rule matches when every term
//! holds; its tasks and properties are merged into the [`ActionSet`], then
//! control follows `thenCall`. A rule that does not match follows
//! `elseCall`. `willReturn` ends the current rule set and `willExit` ends
//! the whole evaluation.

use crate::{ServiceError, ServiceResult};
use crux_types::{Actions, Entity, RuleSchema, Term, Value};
use crux_verifier::{Registry, SchemaLookup, VerifyError};
use serde::Serialize;
use std::collections::BTreeMap;

/// Tasks and properties collected by a rule-set evaluation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ActionSet {
    /// In first-seen order, without duplicates
    pub tasks: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

impl ActionSet {
    pub fn has_task(&self, task: &str) -> bool {
        self.tasks.iter().any(|t| t == task)
    }

    pub fn next_step(&self) -> Option<&str> {
        self.properties
            .get(crux_types::NEXT_STEP)
            .map(String::as_str)
    }

    pub fn is_done(&self) -> bool {
        self.properties.get(crux_types::DONE).map(String::as_str) == Some(crux_types::TRUE_STR)
    }

    fn merge(&mut self, actions: &Actions) {
        for task in &actions.tasks {
            if !self.has_task(task) {
                self.tasks.push(task.clone());
            }
        }
        for (name, value) in &actions.properties {
            self.properties.insert(name.clone(), value.clone());
        }
    }
}

/// Evaluate `set_name` and everything it calls against `entity`
pub fn match_rule_set(
    registry: &Registry,
    entity: &Entity,
    set_name: &str,
) -> ServiceResult<ActionSet> {
    let mut matcher = Matcher {
        registry,
        entity,
        actions: ActionSet::default(),
        stack: Vec::new(),
    };
    matcher.run(set_name)?;
    Ok(matcher.actions)
}

enum Flow {
    Continue,
    Exit,
}

struct Matcher<'a> {
    registry: &'a Registry,
    entity: &'a Entity,
    actions: ActionSet,
    /// Rule sets currently being evaluated
    stack: Vec<String>,
}

impl Matcher<'_> {
    fn run(&mut self, set_name: &str) -> ServiceResult<Flow> {
        if self.stack.iter().any(|s| s == set_name) {
            return Err(ServiceError::CallCycle(set_name.to_string()));
        }
        let registry = self.registry;
        let rule_set = registry
            .rule_set(set_name)
            .ok_or_else(|| VerifyError::RuleSetNotFound(set_name.to_string()))?;
        let schema = registry.require_schema(&rule_set.class)?;

        self.stack.push(set_name.to_string());
        let flow = self.run_rules(set_name, schema, &rule_set.rules);
        self.stack.pop();
        flow
    }

    fn run_rules(
        &mut self,
        set_name: &str,
        schema: &RuleSchema,
        rules: &[crux_types::Rule],
    ) -> ServiceResult<Flow> {
        for (idx, rule) in rules.iter().enumerate() {
            let matched = rule
                .rule_pattern
                .iter()
                .all(|term| self.term_holds(schema, term));
            tracing::debug!(rule_set = %set_name, rule = idx, matched, "Rule evaluated");

            let actions = &rule.rule_actions;
            if matched {
                self.actions.merge(actions);
                if !actions.then_call.is_empty() {
                    if let Flow::Exit = self.run(&actions.then_call)? {
                        return Ok(Flow::Exit);
                    }
                }
                if actions.will_exit {
                    return Ok(Flow::Exit);
                }
                if actions.will_return {
                    break;
                }
            } else if !actions.else_call.is_empty() {
                if let Flow::Exit = self.run(&actions.else_call)? {
                    return Ok(Flow::Exit);
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn term_holds(&self, schema: &RuleSchema, term: &Term) -> bool {
        match schema.attr_type(&term.attr_name) {
            Some(val_type) => {
                let Some(actual) = self
                    .entity
                    .get(&term.attr_name)
                    .and_then(|v| v.convert_to(&val_type))
                else {
                    return false;
                };
                term.attr_val
                    .convert_to(&val_type)
                    .and_then(|expected| actual.compare(&term.op, &expected))
                    .unwrap_or(false)
            }
            // Tag test on a task collected earlier in this evaluation
            None => Value::Bool(self.actions.has_task(&term.attr_name))
                .compare(&term.op, &term.attr_val)
                .unwrap_or(false),
        }
    }
}
