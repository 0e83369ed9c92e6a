//! Feedback visibility.

use qti_core::model::{FeedbackElement, VisibilityMode};
use qti_core::{SingleValue, Value};

/// Whether `element` is shown given the current value of its outcome
/// variable. The element matches when the outcome is, or contains, the
/// element's identifier; `hide` inverts the result.
pub fn is_visible(element: &FeedbackElement, outcome: &Value) -> bool {
    let matches = outcome.contains_single(&SingleValue::Identifier(element.identifier.clone()));
    match element.show_hide {
        VisibilityMode::ShowIfMatch => matches,
        VisibilityMode::HideIfMatch => !matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::{BaseType, Identifier};

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn element(show_hide: VisibilityMode) -> FeedbackElement {
        FeedbackElement {
            outcome_identifier: id("FEEDBACK"),
            identifier: id("fb1"),
            show_hide,
            content: String::new(),
        }
    }

    #[test]
    fn show_and_hide() {
        let hit = Value::identifier(id("fb1"));
        let miss = Value::identifier(id("fb2"));
        assert!(is_visible(&element(VisibilityMode::ShowIfMatch), &hit));
        assert!(!is_visible(&element(VisibilityMode::ShowIfMatch), &miss));
        assert!(!is_visible(&element(VisibilityMode::HideIfMatch), &hit));
        assert!(is_visible(&element(VisibilityMode::HideIfMatch), &miss));
    }

    #[test]
    fn null_outcome_never_matches() {
        assert!(!is_visible(&element(VisibilityMode::ShowIfMatch), &Value::Null));
        assert!(is_visible(&element(VisibilityMode::HideIfMatch), &Value::Null));
    }

    #[test]
    fn container_outcome_matches_on_membership() {
        let outcome = Value::multiple(
            BaseType::Identifier,
            vec![
                SingleValue::Identifier(id("fb0")),
                SingleValue::Identifier(id("fb1")),
            ],
        );
        assert!(is_visible(&element(VisibilityMode::ShowIfMatch), &outcome));
    }
}
