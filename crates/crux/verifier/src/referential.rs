//! Referential integrity of `thenCall` / `elseCall` targets

use crate::{VerifyError, VerifyResult};
use crux_types::RuleSet;
use std::collections::BTreeMap;

/// Check that every non-empty `thenCall`/`elseCall` names a rule set in
/// `rule_sets`
///
/// Rule sets are visited in name order and rules in declaration order;
/// the first unresolved target aborts the check. Run this only after each
/// rule set has passed [`crate::verify_rule_set`].
pub fn do_referential_checks(rule_sets: &BTreeMap<String, RuleSet>) -> VerifyResult<()> {
    for rule_set in rule_sets.values() {
        for rule in &rule_set.rules {
            rule_set_exists(rule_sets, &rule.rule_actions.then_call)?;
            rule_set_exists(rule_sets, &rule.rule_actions.else_call)?;
        }
    }
    Ok(())
}

fn rule_set_exists(rule_sets: &BTreeMap<String, RuleSet>, name: &str) -> VerifyResult<()> {
    // An empty target means no transfer of control
    if name.is_empty() || rule_sets.contains_key(name) {
        Ok(())
    } else {
        Err(VerifyError::RuleSetNotFound(name.to_string()))
    }
}
