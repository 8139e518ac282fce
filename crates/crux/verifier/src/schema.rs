//! Schema verifier
//!
//! Checks a [`RuleSchema`] in three stages, stopping at the first
//! violation: the class name, the pattern-schema, the action-schema.
//! Workflow schemas additionally need a `step` enum that allows `START`,
//! a `stepfailed` bool, exactly the properties `nextstep` and `done`, and
//! a task vocabulary equal to the `step` values minus `START`.

use crate::{VerifyError, VerifyResult};
use crux_types::{
    is_crux_id, RuleSchema, ValueSet, ValueType, DONE, NEXT_STEP, START, STEP, STEP_FAILED,
};
use std::collections::HashSet;

/// Verify a rule schema
///
/// `is_workflow` selects the additional workflow invariants.
pub fn verify_rule_schema(schema: &RuleSchema, is_workflow: bool) -> VerifyResult<()> {
    if schema.class.is_empty() {
        return Err(VerifyError::EmptyClass);
    }
    if !is_crux_id(&schema.class) {
        return Err(VerifyError::InvalidClassName(schema.class.clone()));
    }
    verify_pattern_schema(schema, is_workflow)?;
    verify_action_schema(schema, is_workflow)
}

fn verify_pattern_schema(schema: &RuleSchema, is_workflow: bool) -> VerifyResult<()> {
    if schema.pattern_schema.is_empty() {
        return Err(VerifyError::EmptyPatternSchema(schema.class.clone()));
    }

    let mut step_found = false;
    let mut step_failed_found = false;
    let mut seen = HashSet::new();

    for attr in &schema.pattern_schema {
        if !is_crux_id(&attr.name) {
            return Err(VerifyError::InvalidAttrName(attr.name.clone()));
        }
        if !seen.insert(attr.name.as_str()) {
            return Err(VerifyError::DuplicateAttribute {
                class: schema.class.clone(),
                attr: attr.name.clone(),
            });
        }
        if !attr.val_type.is_valid() {
            return Err(VerifyError::InvalidValueType {
                attr: attr.name.clone(),
                val_type: attr.val_type.to_string(),
            });
        }
        if attr.val_type == ValueType::Enum && attr.vals.is_empty() {
            return Err(VerifyError::EmptyEnum(attr.name.clone()));
        }
        if let Some(bad) = attr.vals.iter().find(|v| !is_crux_id(v) && *v != START) {
            return Err(VerifyError::InvalidEnumValue(bad.to_string()));
        }

        if attr.name == STEP && attr.val_type == ValueType::Enum {
            step_found = true;
            if is_workflow && !attr.vals.contains(START) {
                return Err(VerifyError::StepWithoutStart(schema.class.clone()));
            }
        }
        if attr.name == STEP_FAILED && attr.val_type == ValueType::Bool {
            step_failed_found = true;
        }
    }

    if is_workflow && !(step_found && step_failed_found) {
        return Err(VerifyError::MissingWorkflowAttributes(schema.class.clone()));
    }
    Ok(())
}

fn verify_action_schema(schema: &RuleSchema, is_workflow: bool) -> VerifyResult<()> {
    let actions = &schema.action_schema;
    if actions.is_empty() {
        return Err(VerifyError::EmptyActionSchema(schema.class.clone()));
    }
    if let Some(bad) = actions.tasks.iter().find(|t| !is_crux_id(t)) {
        return Err(VerifyError::InvalidTaskName(bad.to_string()));
    }
    if is_workflow && actions.properties.len() != 2 {
        return Err(VerifyError::WorkflowPropertyCount(schema.class.clone()));
    }
    if let Some(bad) = actions.properties.iter().find(|p| !is_crux_id(p)) {
        return Err(VerifyError::InvalidPropertyName(bad.to_string()));
    }

    if is_workflow {
        if !(actions.properties.contains(NEXT_STEP) && actions.properties.contains(DONE)) {
            return Err(VerifyError::MissingWorkflowProperties(schema.class.clone()));
        }
        let reachable = actions.tasks.with(START);
        let step_values = schema.step_values().cloned().unwrap_or_else(ValueSet::new);
        if !reachable.set_eq(&step_values) {
            return Err(VerifyError::TaskStepMismatch(schema.class.clone()));
        }
    }
    Ok(())
}
