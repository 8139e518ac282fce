//! Rule schemas: the declared shape of facts of one class
//!
//! A schema has two halves:
//! - the pattern-schema, listing the attributes a fact carries and
//!   their types
//! - the action-schema, listing the tasks a rule may perform and the
//!   properties a rule may set

use crate::{ValueSet, ValueType, STEP};
use serde::{Deserialize, Serialize};

/// One attribute declaration in a pattern-schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttrSchema {
    pub name: String,
    pub val_type: ValueType,
    /// Legal values of an `enum` attribute
    #[serde(default, skip_serializing_if = "ValueSet::is_empty")]
    pub vals: ValueSet,
}

impl AttrSchema {
    pub fn new(name: impl Into<String>, val_type: ValueType) -> Self {
        Self {
            name: name.into(),
            val_type,
            vals: ValueSet::new(),
        }
    }

    /// An `enum` attribute with its legal values
    pub fn enumeration<I, S>(name: impl Into<String>, vals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            val_type: ValueType::Enum,
            vals: vals.into_iter().collect(),
        }
    }
}

/// Tasks and properties a rule of this class may act upon
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    #[serde(default)]
    pub tasks: ValueSet,
    #[serde(default)]
    pub properties: ValueSet,
}

impl ActionSchema {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.properties.is_empty()
    }
}

/// The schema of one class
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSchema {
    pub class: String,
    pub pattern_schema: Vec<AttrSchema>,
    #[serde(default)]
    pub action_schema: ActionSchema,
}

impl RuleSchema {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            pattern_schema: Vec::new(),
            action_schema: ActionSchema::default(),
        }
    }

    pub fn with_attr(mut self, attr: AttrSchema) -> Self {
        self.pattern_schema.push(attr);
        self
    }

    pub fn with_tasks<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for task in tasks {
            self.action_schema.tasks.insert(task);
        }
        self
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for property in properties {
            self.action_schema.properties.insert(property);
        }
        self
    }

    /// Find an attribute declaration by name
    pub fn attr(&self, name: &str) -> Option<&AttrSchema> {
        self.pattern_schema.iter().find(|a| a.name == name)
    }

    /// Declared type of an attribute, if the pattern-schema has it
    pub fn attr_type(&self, name: &str) -> Option<ValueType> {
        self.attr(name).map(|a| a.val_type.clone())
    }

    /// Type a rule term on `name` is checked against
    ///
    /// A declared attribute yields its type. A name that is instead a
    /// declared task is a tag and yields `bool`.
    pub fn term_type(&self, name: &str) -> Option<ValueType> {
        self.attr_type(name).or_else(|| {
            self.action_schema
                .tasks
                .contains(name)
                .then_some(ValueType::Bool)
        })
    }

    /// Legal values of the `step` attribute
    pub fn step_values(&self) -> Option<&ValueSet> {
        self.attr(STEP).map(|a| &a.vals)
    }
}
