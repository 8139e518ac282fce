//! Rule-set verifier
//!
//! A rule set is checked against the schema of the class it is bound to,
//! in two passes over the rules in declaration order: patterns first,
//! then actions. The first failing rule determines the error.

use crate::{SchemaLookup, VerifyError, VerifyResult};
use crux_types::{is_valid_operator, validate_literal, RuleSchema, RuleSet, STEP};

/// Verify a rule set against its bound schema
pub fn verify_rule_set<L>(rule_set: &RuleSet, schemas: &L, is_workflow: bool) -> VerifyResult<()>
where
    L: SchemaLookup + ?Sized,
{
    let schema = schemas.require_schema(&rule_set.class)?;
    verify_rule_patterns(rule_set, schema, is_workflow)?;
    verify_rule_actions(rule_set, schema, is_workflow)
}

/// Check every pattern term's name, literal type and operator
///
/// A term on a name missing from the pattern-schema is accepted only if
/// the name is a declared task; it is then a bool tag test. Workflow rules
/// must test `step` exactly once.
pub fn verify_rule_patterns(
    rule_set: &RuleSet,
    schema: &RuleSchema,
    is_workflow: bool,
) -> VerifyResult<()> {
    for rule in &rule_set.rules {
        for term in &rule.rule_pattern {
            let val_type =
                schema
                    .term_type(&term.attr_name)
                    .ok_or_else(|| VerifyError::UnknownAttribute {
                        rule_set: rule_set.set_name.clone(),
                        attr: term.attr_name.clone(),
                    })?;
            if !validate_literal(&term.attr_val, &val_type) {
                return Err(VerifyError::TermTypeMismatch {
                    rule_set: rule_set.set_name.clone(),
                    attr: term.attr_name.clone(),
                });
            }
            if !is_valid_operator(&term.op) {
                return Err(VerifyError::InvalidOperator {
                    rule_set: rule_set.set_name.clone(),
                    op: term.op.to_string(),
                });
            }
        }

        if is_workflow {
            match rule.rule_pattern.iter().filter(|t| t.attr_name == STEP).count() {
                0 => return Err(VerifyError::MissingStepTerm(rule_set.set_name.clone())),
                1 => {}
                _ => return Err(VerifyError::DuplicateStepTerm(rule_set.set_name.clone())),
            }
        }
    }
    Ok(())
}

/// Check every rule's tasks, properties and control flags
///
/// Workflow rules must set `nextstep` or `done=true`, must have a task
/// unless done, and may only move to a step among their own tasks.
pub fn verify_rule_actions(
    rule_set: &RuleSet,
    schema: &RuleSchema,
    is_workflow: bool,
) -> VerifyResult<()> {
    let declared = &schema.action_schema;
    for rule in &rule_set.rules {
        let actions = &rule.rule_actions;

        if let Some(task) = actions.tasks.iter().find(|t| !declared.tasks.contains(t)) {
            return Err(VerifyError::UnknownTask {
                rule_set: rule_set.set_name.clone(),
                task: task.clone(),
            });
        }
        if let Some(property) = actions
            .properties
            .keys()
            .find(|p| !declared.properties.contains(p))
        {
            return Err(VerifyError::UnknownProperty {
                rule_set: rule_set.set_name.clone(),
                property: property.clone(),
            });
        }
        if actions.will_return && actions.will_exit {
            return Err(VerifyError::ReturnAndExit(rule_set.set_name.clone()));
        }

        if is_workflow {
            let next_step = actions.next_step();
            let done = actions.is_done();
            if next_step.is_none() && !done {
                return Err(VerifyError::NoNextStepOrDone(rule_set.set_name.clone()));
            }
            if !done && actions.tasks.is_empty() {
                return Err(VerifyError::NoTasksNotDone(rule_set.set_name.clone()));
            }
            if let Some(next_step) = next_step.filter(|ns| !ns.is_empty()) {
                if !actions.tasks.iter().any(|t| t == next_step) {
                    return Err(VerifyError::NextStepNotInTasks {
                        rule_set: rule_set.set_name.clone(),
                        next_step: next_step.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}
