//! Entities: concrete facts of a class

use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A concrete fact, checked against its class schema before use
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub class: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Set `name` unless the entity already carries it
    pub fn set_default(&mut self, name: &str, value: impl Into<Value>) {
        self.attrs
            .entry(name.to_string())
            .or_insert_with(|| value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_from_string_map() {
        let json = r#"{"class": "order", "attrs": {"step": "START", "amount": "10.5"}}"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.get("step"), Some(&Value::str("START")));
        assert_eq!(entity.get("amount"), Some(&Value::str("10.5")));
    }

    #[test]
    fn test_set_default_keeps_existing() {
        let mut entity = Entity::new("order").with_attr("stepfailed", true);
        entity.set_default("stepfailed", false);
        entity.set_default("step", "START");
        assert_eq!(entity.get("stepfailed"), Some(&Value::Bool(true)));
        assert_eq!(entity.get("step"), Some(&Value::str("START")));
    }
}
