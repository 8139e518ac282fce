//! Rule sets: ordered pattern→action rules bound to one class

use crate::{Operator, Value, DONE, NEXT_STEP, TRUE_STR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Rule Set Kind ────────────────────────────────────────────────────

/// Business rules or workflow (the `brwf` storage flag)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleSetKind {
    #[default]
    #[serde(rename = "B", alias = "business")]
    Business,
    #[serde(rename = "W", alias = "workflow")]
    Workflow,
}

impl RuleSetKind {
    pub fn is_workflow(self) -> bool {
        self == RuleSetKind::Workflow
    }

    /// Single-character storage flag
    pub fn as_flag(self) -> &'static str {
        match self {
            RuleSetKind::Business => "B",
            RuleSetKind::Workflow => "W",
        }
    }

    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "B" => Some(RuleSetKind::Business),
            "W" => Some(RuleSetKind::Workflow),
            _ => None,
        }
    }
}

impl fmt::Display for RuleSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}

// ── Term ─────────────────────────────────────────────────────────────

/// One condition of a rule pattern: `attr_name op attr_val`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub attr_name: String,
    pub op: Operator,
    pub attr_val: Value,
}

impl Term {
    pub fn new(attr_name: impl Into<String>, op: Operator, attr_val: impl Into<Value>) -> Self {
        Self {
            attr_name: attr_name.into(),
            op,
            attr_val: attr_val.into(),
        }
    }

    pub fn equals(attr_name: impl Into<String>, attr_val: impl Into<Value>) -> Self {
        Self::new(attr_name, Operator::Eq, attr_val)
    }
}

// ── Actions ──────────────────────────────────────────────────────────

/// The effect of a rule when its pattern matches
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actions {
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub will_return: bool,
    #[serde(default)]
    pub will_exit: bool,
    /// Rule set to run next when the pattern matches
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub then_call: String,
    /// Rule set to run next when the pattern does not match
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub else_call: String,
}

impl Actions {
    /// The `nextstep` property, if set
    pub fn next_step(&self) -> Option<&str> {
        self.properties.get(NEXT_STEP).map(String::as_str)
    }

    /// Whether the `done` property is set to `"true"`
    pub fn is_done(&self) -> bool {
        self.properties.get(DONE).map(String::as_str) == Some(TRUE_STR)
    }
}

// ── Rule ─────────────────────────────────────────────────────────────

/// A single pattern→action rule
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub rule_pattern: Vec<Term>,
    #[serde(default)]
    pub rule_actions: Actions,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(mut self, term: Term) -> Self {
        self.rule_pattern.push(term);
        self
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.rule_actions.tasks.push(task.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.rule_actions
            .properties
            .insert(name.into(), value.into());
        self
    }

    pub fn then_call(mut self, set_name: impl Into<String>) -> Self {
        self.rule_actions.then_call = set_name.into();
        self
    }

    pub fn else_call(mut self, set_name: impl Into<String>) -> Self {
        self.rule_actions.else_call = set_name.into();
        self
    }

    pub fn will_return(mut self) -> Self {
        self.rule_actions.will_return = true;
        self
    }

    pub fn will_exit(mut self) -> Self {
        self.rule_actions.will_exit = true;
        self
    }
}

// ── Rule Set ─────────────────────────────────────────────────────────

/// A named, ordered list of rules bound to a class schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default)]
    pub slice: i32,
    #[serde(default)]
    pub app: String,
    pub class: String,
    pub set_name: String,
    #[serde(default)]
    pub kind: RuleSetKind,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_true() -> bool {
    true
}

impl RuleSet {
    pub fn new(set_name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            slice: 0,
            app: String::new(),
            class: class.into(),
            set_name: set_name.into(),
            kind: RuleSetKind::Business,
            is_active: true,
            is_internal: false,
            rules: Vec::new(),
        }
    }

    /// A workflow rule set
    pub fn workflow(set_name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            kind: RuleSetKind::Workflow,
            ..Self::new(set_name, class)
        }
    }

    pub fn with_scope(mut self, slice: i32, app: impl Into<String>) -> Self {
        self.slice = slice;
        self.app = app.into();
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn internal(mut self) -> Self {
        self.is_internal = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn is_workflow(&self) -> bool {
        self.kind.is_workflow()
    }

    /// Names of every rule set this one may transfer control to
    pub fn called_sets(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().flat_map(|r| {
            [
                r.rule_actions.then_call.as_str(),
                r.rule_actions.else_call.as_str(),
            ]
            .into_iter()
            .filter(|name| !name.is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_builder() {
        let rule = Rule::new()
            .when(Term::equals("step", "START"))
            .task("approve")
            .property(NEXT_STEP, "approve");
        assert_eq!(rule.rule_pattern.len(), 1);
        assert_eq!(rule.rule_actions.next_step(), Some("approve"));
        assert!(!rule.rule_actions.is_done());

        let done = Rule::new().property(DONE, "true");
        assert!(done.rule_actions.is_done());
        let not_done = Rule::new().property(DONE, "false");
        assert!(!not_done.rule_actions.is_done());
    }

    #[test]
    fn test_called_sets_skips_empty() {
        let set = RuleSet::new("main", "order")
            .with_rule(Rule::new().then_call("extra"))
            .with_rule(Rule::new())
            .with_rule(Rule::new().else_call("fallback"));
        assert_eq!(set.called_sets().collect::<Vec<_>>(), vec!["extra", "fallback"]);
    }

    #[test]
    fn test_rule_set_yaml_shape() {
        let yaml = r#"
setName: order_wf
class: order
kind: W
rules:
  - rulePattern:
      - {attrName: step, op: eq, attrVal: START}
    ruleActions:
      tasks: [approve]
      properties: {nextstep: approve}
"#;
        let set: RuleSet = serde_yaml::from_str(yaml).unwrap();
        assert!(set.is_workflow());
        assert!(set.is_active);
        assert!(!set.is_internal);
        assert_eq!(set.rules[0].rule_pattern[0].op, Operator::Eq);
        assert_eq!(set.rules[0].rule_actions.tasks, vec!["approve"]);
    }

    #[test]
    fn test_kind_flags() {
        assert_eq!(RuleSetKind::from_flag("W"), Some(RuleSetKind::Workflow));
        assert_eq!(RuleSetKind::Business.as_flag(), "B");
        assert_eq!(RuleSetKind::from_flag("X"), None);
    }
}
