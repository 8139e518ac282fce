use crux_types::{InstanceKey, NewWfInstance, RuleSchema, RuleSet, RuleSetKind};
use serde::{Deserialize, Serialize};

/// One row of the rule-set table
///
/// Keyed by (slice, app, class, brwf, setname). The service consults these
/// rows for the active/internal flags before starting a workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSetRow {
    pub slice: i32,
    pub app: String,
    pub class: String,
    #[serde(rename = "brwf")]
    pub kind: RuleSetKind,
    #[serde(rename = "setname")]
    pub set_name: String,
    pub is_active: bool,
    pub is_internal: bool,
}

impl RuleSetRow {
    pub fn key(&self) -> RuleSetRowKey {
        RuleSetRowKey {
            slice: self.slice,
            app: self.app.clone(),
            class: self.class.clone(),
            kind: self.kind,
            set_name: self.set_name.clone(),
        }
    }
}

impl From<&RuleSet> for RuleSetRow {
    fn from(rule_set: &RuleSet) -> Self {
        Self {
            slice: rule_set.slice,
            app: rule_set.app.clone(),
            class: rule_set.class.clone(),
            kind: rule_set.kind,
            set_name: rule_set.set_name.clone(),
            is_active: rule_set.is_active,
            is_internal: rule_set.is_internal,
        }
    }
}

/// Primary key of [`RuleSetRow`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleSetRowKey {
    pub slice: i32,
    pub app: String,
    pub class: String,
    pub kind: RuleSetKind,
    pub set_name: String,
}

/// One row of the schema table, keyed by (slice, app, class)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRow {
    pub slice: i32,
    pub app: String,
    #[serde(rename = "brwf")]
    pub kind: RuleSetKind,
    #[serde(flatten)]
    pub schema: RuleSchema,
}

impl SchemaRow {
    pub fn new(slice: i32, app: impl Into<String>, kind: RuleSetKind, schema: RuleSchema) -> Self {
        Self {
            slice,
            app: app.into(),
            kind,
            schema,
        }
    }

    pub fn class(&self) -> &str {
        &self.schema.class
    }

    pub fn key(&self) -> SchemaRowKey {
        SchemaRowKey {
            slice: self.slice,
            app: self.app.clone(),
            class: self.schema.class.clone(),
        }
    }
}

/// Primary key of [`SchemaRow`]; orders listings by slice, app, class
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaRowKey {
    pub slice: i32,
    pub app: String,
    pub class: String,
}

impl SchemaRowKey {
    pub fn new(slice: i32, app: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            slice,
            app: app.into(),
            class: class.into(),
        }
    }
}

/// Checks on the opening rows of an instance, returning their shared key
pub(crate) fn check_start_rows(rows: &[NewWfInstance]) -> crate::StorageResult<InstanceKey> {
    let Some(first) = rows.first() else {
        return Err(crate::StorageError::InvalidInput(
            "an instance start needs at least one row".to_string(),
        ));
    };
    let key = first.key();
    for row in rows {
        check_new_instance(row)?;
        if row.key() != key {
            return Err(crate::StorageError::InvalidInput(format!(
                "start rows mix instances {key} and {}",
                row.key()
            )));
        }
    }
    Ok(key)
}

/// Field checks shared by every store before appending an instance row
pub(crate) fn check_new_instance(row: &NewWfInstance) -> crate::StorageResult<()> {
    let missing = [
        ("entityid", &row.entity_id),
        ("app", &row.app),
        ("class", &row.class),
        ("workflow", &row.workflow),
        ("step", &row.step),
    ]
    .into_iter()
    .find(|(_, value)| value.is_empty());

    match missing {
        Some((field, _)) => Err(crate::StorageError::InvalidInput(format!(
            "workflow instance row has empty {field}"
        ))),
        None => Ok(()),
    }
}
