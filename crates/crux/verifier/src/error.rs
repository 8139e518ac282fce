//! Verification errors
//!
//! Every verifier stops at the first violation and returns one of these,
//! naming the offending class, attribute, rule set or entity.

use thiserror::Error;

/// Result type for verification
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Category of a verification failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed names, unknown types, empty or missing declarations
    Structural,
    /// Workflow step/task/nextstep/done mismatches, RETURN+EXIT conflicts
    Consistency,
    /// A `thenCall`/`elseCall` target that does not exist
    Referential,
    /// An entity that does not fit its schema
    Entity,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum VerifyError {
    // ── Structural ──
    #[error("schema class is empty string")]
    EmptyClass,

    #[error("class name {0} is not a valid CruxID")]
    InvalidClassName(String),

    #[error("pattern-schema for {0} is empty")]
    EmptyPatternSchema(String),

    #[error("attribute name {0} is not a valid CruxID")]
    InvalidAttrName(String),

    #[error("attribute {attr} appears more than once in pattern-schema for {class}")]
    DuplicateAttribute { class: String, attr: String },

    #[error("{val_type} is not a valid value-type (attribute {attr})")]
    InvalidValueType { attr: String, val_type: String },

    #[error("no valid values for enum {0}")]
    EmptyEnum(String),

    #[error("enum value {0} is not a valid CruxID")]
    InvalidEnumValue(String),

    #[error("both tasks and properties are empty in schema for class {0}")]
    EmptyActionSchema(String),

    #[error("task {0} is not a valid CruxID")]
    InvalidTaskName(String),

    #[error("property name {0} is not a valid CruxID")]
    InvalidPropertyName(String),

    #[error("ruleset name {0} is not a valid CruxID")]
    InvalidRuleSetName(String),

    #[error("no schema found for class {0}")]
    SchemaNotFound(String),

    #[error("attribute does not exist in schema: {attr} (ruleset {rule_set})")]
    UnknownAttribute { rule_set: String, attr: String },

    #[error("value of this attribute does not match schema type: {attr} (ruleset {rule_set})")]
    TermTypeMismatch { rule_set: String, attr: String },

    #[error("invalid operation in rule: {op} (ruleset {rule_set})")]
    InvalidOperator { rule_set: String, op: String },

    #[error("task {task} not found in action-schema (ruleset {rule_set})")]
    UnknownTask { rule_set: String, task: String },

    #[error("property name {property} not found in action-schema (ruleset {rule_set})")]
    UnknownProperty { rule_set: String, property: String },

    #[error("schema for class {0} is already registered")]
    DuplicateSchema(String),

    #[error("ruleset {0} is already registered")]
    DuplicateRuleSet(String),

    // ── Consistency ──
    #[error("workflow schema for {0} doesn't allow step=START")]
    StepWithoutStart(String),

    #[error("necessary workflow attributes absent in schema for class {0}")]
    MissingWorkflowAttributes(String),

    #[error("action-schema for {0} does not contain exactly two properties")]
    WorkflowPropertyCount(String),

    #[error("action-schema for {0} does not contain both the properties 'nextstep' and 'done'")]
    MissingWorkflowProperties(String),

    #[error("action-schema tasks for {0} are not the same as valid values for 'step' in pattern-schema")]
    TaskStepMismatch(String),

    #[error("no 'step' attribute found in a rule in workflow {0}")]
    MissingStepTerm(String),

    #[error("more than one 'step' attribute found in a rule in workflow {0}")]
    DuplicateStepTerm(String),

    #[error("there is a rule with both the RETURN and EXIT instructions in ruleset {0}")]
    ReturnAndExit(String),

    #[error("rule found with neither 'nextstep' nor 'done' in ruleset {0}")]
    NoNextStepOrDone(String),

    #[error("no tasks and no 'done=true' in a rule in ruleset {0}")]
    NoTasksNotDone(String),

    #[error("`nextstep` value {next_step} not found in `tasks` in a rule in ruleset {rule_set}")]
    NextStepNotInTasks { rule_set: String, next_step: String },

    #[error("ruleset {rule_set} is {actual} but its schema for class {class} is {expected}")]
    KindMismatch {
        rule_set: String,
        class: String,
        expected: String,
        actual: String,
    },

    // ── Referential ──
    #[error("ruleset {0} does not exist")]
    RuleSetNotFound(String),

    // ── Entity ──
    #[error("schema does not contain attribute {0}")]
    EntityUnknownAttribute(String),

    #[error("attribute {0} in entity has value of wrong type")]
    EntityTypeMismatch(String),

    #[error("entity does not contain all the attributes in its pattern-schema (class {class}: expected {expected}, found {found})")]
    EntityAttributeCount {
        class: String,
        expected: usize,
        found: usize,
    },
}

impl VerifyError {
    pub fn kind(&self) -> ErrorKind {
        use VerifyError::*;
        match self {
            EmptyClass
            | InvalidClassName(_)
            | EmptyPatternSchema(_)
            | InvalidAttrName(_)
            | DuplicateAttribute { .. }
            | InvalidValueType { .. }
            | EmptyEnum(_)
            | InvalidEnumValue(_)
            | EmptyActionSchema(_)
            | InvalidTaskName(_)
            | InvalidPropertyName(_)
            | InvalidRuleSetName(_)
            | SchemaNotFound(_)
            | UnknownAttribute { .. }
            | TermTypeMismatch { .. }
            | InvalidOperator { .. }
            | UnknownTask { .. }
            | UnknownProperty { .. }
            | DuplicateSchema(_)
            | DuplicateRuleSet(_) => ErrorKind::Structural,

            StepWithoutStart(_)
            | MissingWorkflowAttributes(_)
            | WorkflowPropertyCount(_)
            | MissingWorkflowProperties(_)
            | TaskStepMismatch(_)
            | MissingStepTerm(_)
            | DuplicateStepTerm(_)
            | ReturnAndExit(_)
            | NoNextStepOrDone(_)
            | NoTasksNotDone(_)
            | NextStepNotInTasks { .. }
            | KindMismatch { .. } => ErrorKind::Consistency,

            RuleSetNotFound(_) => ErrorKind::Referential,

            EntityUnknownAttribute(_) | EntityTypeMismatch(_) | EntityAttributeCount { .. } => {
                ErrorKind::Entity
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        assert_eq!(
            VerifyError::RuleSetNotFound("r2".into()).to_string(),
            "ruleset r2 does not exist"
        );
        assert_eq!(
            VerifyError::MissingStepTerm("order_wf".into()).to_string(),
            "no 'step' attribute found in a rule in workflow order_wf"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(VerifyError::EmptyClass.kind(), ErrorKind::Structural);
        assert_eq!(
            VerifyError::ReturnAndExit("r".into()).kind(),
            ErrorKind::Consistency
        );
        assert_eq!(
            VerifyError::RuleSetNotFound("r".into()).kind(),
            ErrorKind::Referential
        );
        assert_eq!(
            VerifyError::EntityTypeMismatch("a".into()).kind(),
            ErrorKind::Entity
        );
    }
}
