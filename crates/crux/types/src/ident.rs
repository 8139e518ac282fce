//! Identifier grammar and reserved workflow names

use regex::Regex;
use std::sync::LazyLock;

/// Grammar every declared name must follow (except [`START`])
pub const CRUX_ID_PATTERN: &str = r"^[a-z][a-z0-9_]*$";

/// Workflow attribute holding the current step
pub const STEP: &str = "step";
/// Workflow attribute flagging a failed step
pub const STEP_FAILED: &str = "stepfailed";
/// Sentinel step every workflow instance begins in
pub const START: &str = "START";
/// Workflow property naming the step to move to
pub const NEXT_STEP: &str = "nextstep";
/// Workflow property marking the instance as finished
pub const DONE: &str = "done";
/// String form of a true `done` property
pub const TRUE_STR: &str = "true";

static CRUX_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CRUX_ID_PATTERN).expect("identifier pattern compiles"));

/// Whether `name` matches `^[a-z][a-z0-9_]*$`
pub fn is_crux_id(name: &str) -> bool {
    CRUX_ID.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_identifiers() {
        for name in ["a", "order", "step_2", "x9_y"] {
            assert!(is_crux_id(name), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        for name in ["", "START", "Order", "9lives", "_tmp", "with-dash", "sp ace"] {
            assert!(!is_crux_id(name), "{name} should be invalid");
        }
    }

    proptest! {
        #[test]
        fn generated_identifiers_are_accepted(name in "[a-z][a-z0-9_]{0,20}") {
            prop_assert!(is_crux_id(&name));
        }

        #[test]
        fn leading_non_lowercase_is_rejected(name in "[A-Z0-9_][a-z0-9_]{0,20}") {
            prop_assert!(!is_crux_id(&name));
        }
    }
}
