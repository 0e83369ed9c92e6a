//! Item session lifecycle: template processing, binding, response
//! processing, attempts, suspension and feedback.

use std::collections::BTreeMap;
use std::sync::Arc;

use qti_core::{AssessmentItem, Identifier, NotificationLevel, Value};
use qti_eval::{
    BindOutcome, ItemSessionController, ItemSessionState, ResponseData, SessionConfig,
    SessionError, SessionStatus,
};
use serde_json::json;
use time::macros::datetime;
use time::OffsetDateTime;

const T0: OffsetDateTime = datetime!(2024-05-01 09:00:00 UTC);

fn at(seconds: i64) -> OffsetDateTime {
    T0 + time::Duration::seconds(seconds)
}

fn load(doc: serde_json::Value) -> Arc<AssessmentItem> {
    Arc::new(serde_json::from_value(doc).unwrap())
}

fn id(s: &str) -> Identifier {
    Identifier::new(s).unwrap()
}

fn responses(pairs: &[(&str, ResponseData)]) -> BTreeMap<Identifier, ResponseData> {
    pairs
        .iter()
        .map(|(k, v)| (id(k), v.clone()))
        .collect()
}

fn choice_item() -> serde_json::Value {
    json!({
        "identifier": "choice",
        "responseDeclarations": [{
            "identifier": "RESPONSE",
            "cardinality": "single",
            "baseType": "identifier",
            "correctResponse": ["B"]
        }],
        "outcomeDeclarations": [
            {"identifier": "SCORE", "cardinality": "single", "baseType": "float", "defaultValue": ["0"]},
            {"identifier": "FEEDBACK", "cardinality": "single", "baseType": "identifier"}
        ],
        "responseProcessing": [{
            "type": "responseCondition",
            "if": {
                "condition": {"type": "match", "children": [
                    {"type": "variable", "identifier": "RESPONSE"},
                    {"type": "correct", "identifier": "RESPONSE"}
                ]},
                "rules": [
                    {"type": "setOutcomeValue", "identifier": "SCORE",
                     "expression": {"type": "baseValue", "baseType": "float", "value": "1"}},
                    {"type": "setOutcomeValue", "identifier": "FEEDBACK",
                     "expression": {"type": "baseValue", "baseType": "identifier", "value": "right"}}
                ]
            },
            "else": [
                {"type": "setOutcomeValue", "identifier": "FEEDBACK",
                 "expression": {"type": "baseValue", "baseType": "identifier", "value": "wrong"}}
            ]
        }],
        "feedback": [
            {"outcomeIdentifier": "FEEDBACK", "identifier": "right", "content": "Well done"},
            {"outcomeIdentifier": "FEEDBACK", "identifier": "right", "showHide": "hideIfMatch",
             "content": "Have another look"}
        ]
    })
}

fn started(doc: serde_json::Value, config: SessionConfig) -> ItemSessionController {
    let mut session = ItemSessionController::new(load(doc), config);
    session.initialize().unwrap();
    session.perform_template_processing().unwrap();
    session.enter_item(T0).unwrap();
    session
}

fn answer(session: &mut ItemSessionController, response: &str, now: OffsetDateTime) {
    let outcome = session
        .bind_responses(&responses(&[("RESPONSE", response.into())]), now)
        .unwrap();
    assert_eq!(outcome, BindOutcome::Bound(Default::default()));
    session.perform_response_processing(now).unwrap();
}

// ──────────────────────────────────────────────
// Lifecycle
// ──────────────────────────────────────────────

#[test]
fn full_lifecycle_of_a_correct_answer() {
    let mut session = ItemSessionController::new(load(choice_item()), SessionConfig::default());
    assert_eq!(session.validate(), 0);

    session.initialize().unwrap();
    assert_eq!(session.status(), SessionStatus::Initialized);
    assert_eq!(session.state().completion_status(), Some("not_attempted"));
    assert_eq!(session.state().num_attempts(), 0);

    session.perform_template_processing().unwrap();
    assert!(!session.is_presented());
    session.enter_item(T0).unwrap();
    assert!(session.is_presented());
    assert_eq!(session.state().completion_status(), Some("unknown"));

    session
        .bind_responses(&responses(&[("RESPONSE", "B".into())]), at(10))
        .unwrap();
    assert_eq!(session.status(), SessionStatus::ResponseBound);
    assert!(session.validate_responses().unwrap().is_empty());

    session.perform_response_processing(at(10)).unwrap();
    assert_eq!(session.status(), SessionStatus::Attempted);
    assert_eq!(session.state().outcome_value("SCORE"), Some(&Value::float(1.0)));
    assert_eq!(session.state().num_attempts(), 1);
    assert_eq!(session.state().completion_status(), Some("completed"));
    assert_eq!(session.state().duration(), 10.0);
    assert_eq!(session.is_correct(), Some(true));
    assert!(session.is_responded());

    session.end_item(at(25)).unwrap();
    assert_eq!(session.status(), SessionStatus::Closed);
    assert_eq!(session.state().duration(), 25.0);
}

#[test]
fn operations_out_of_order_are_rejected() {
    let mut session = ItemSessionController::new(load(choice_item()), SessionConfig::default());
    let err = session.enter_item(T0).unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState {
            state: SessionStatus::NotInitialized,
            ..
        }
    ));
    session.initialize().unwrap();
    assert_eq!(session.initialize().unwrap_err(), SessionError::AlreadyInitialized);

    session.perform_template_processing().unwrap();
    session.enter_item(T0).unwrap();
    session.end_item(at(1)).unwrap();
    assert!(session
        .bind_responses(&responses(&[("RESPONSE", "B".into())]), at(2))
        .is_err());
}

#[test]
fn outcomes_reset_before_each_attempt() {
    let mut session = started(choice_item(), SessionConfig::default());
    answer(&mut session, "B", at(5));
    assert_eq!(session.state().outcome_value("SCORE"), Some(&Value::float(1.0)));
    answer(&mut session, "A", at(9));
    assert_eq!(session.state().outcome_value("SCORE"), Some(&Value::float(0.0)));
    assert_eq!(session.state().num_attempts(), 2);
    assert_eq!(session.is_correct(), Some(false));
}

// ──────────────────────────────────────────────
// Binding
// ──────────────────────────────────────────────

#[test]
fn unreadable_response_is_reported_not_bound() {
    let doc = json!({
        "identifier": "numeric",
        "responseDeclarations": [
            {"identifier": "RESPONSE", "cardinality": "single", "baseType": "integer"}
        ]
    });
    let mut session = started(doc, SessionConfig::default());
    let outcome = session
        .bind_responses(&responses(&[("RESPONSE", "twelve".into())]), at(3))
        .unwrap();
    assert_eq!(outcome, BindOutcome::Bound([id("RESPONSE")].into()));
    assert_eq!(session.state().response_value("RESPONSE"), Some(&Value::Null));
    assert!(session.validate_responses().unwrap().contains("RESPONSE"));
    assert_eq!(
        session.notifier().count_at_least(NotificationLevel::Warning),
        1
    );
}

#[test]
fn unknown_response_aborts_binding() {
    let mut session = started(choice_item(), SessionConfig::default());
    let err = session
        .bind_responses(
            &responses(&[("RESPONSE", "B".into()), ("OTHER", "x".into())]),
            at(1),
        )
        .unwrap_err();
    assert_eq!(err, SessionError::UnknownResponse("OTHER".into()));
    assert_eq!(session.status(), SessionStatus::Entered);
}

#[test]
fn blank_answers_bind_as_null() {
    let mut session = started(choice_item(), SessionConfig::default());
    session
        .bind_responses(&responses(&[("RESPONSE", "  ".into())]), at(1))
        .unwrap();
    assert_eq!(session.state().response_value("RESPONSE"), Some(&Value::Null));
}

#[test]
fn response_constraints_flag_invalid_responses() {
    let doc = json!({
        "identifier": "pick-two",
        "responseDeclarations": [
            {"identifier": "RESPONSE", "cardinality": "multiple", "baseType": "identifier"}
        ],
        "responseConstraints": [
            {"responseIdentifier": "RESPONSE", "minChoices": 2, "maxChoices": 2}
        ]
    });
    let mut session = started(doc, SessionConfig::default());
    session
        .bind_responses(&responses(&[("RESPONSE", vec!["A"].into())]), at(1))
        .unwrap();
    assert!(session.validate_responses().unwrap().contains("RESPONSE"));

    session
        .bind_responses(&responses(&[("RESPONSE", vec!["A", "C"].into())]), at(2))
        .unwrap();
    assert!(session.validate_responses().unwrap().is_empty());
    assert!(session.state().invalid_responses().is_empty());
}

// ──────────────────────────────────────────────
// Attempts
// ──────────────────────────────────────────────

#[test]
fn attempts_are_limited_for_non_adaptive_items() {
    let config = SessionConfig {
        max_attempts: 1,
        ..SessionConfig::default()
    };
    let mut session = started(choice_item(), config);
    assert!(session.is_attempt_allowed());
    answer(&mut session, "A", at(4));
    assert!(!session.is_attempt_allowed());

    let outcome = session
        .bind_responses(&responses(&[("RESPONSE", "B".into())]), at(8))
        .unwrap();
    assert_eq!(outcome, BindOutcome::NoMoreAttempts);
    assert_eq!(
        session.state().response_value("RESPONSE"),
        Some(&Value::identifier(id("A")))
    );
}

#[test]
fn adaptive_item_decides_its_own_completion() {
    let mut doc = choice_item();
    doc["adaptive"] = json!(true);
    doc["responseProcessing"] = json!([{
        "type": "responseCondition",
        "if": {
            "condition": {"type": "match", "children": [
                {"type": "variable", "identifier": "RESPONSE"},
                {"type": "correct", "identifier": "RESPONSE"}
            ]},
            "rules": [{"type": "setOutcomeValue", "identifier": "completionStatus",
                       "expression": {"type": "baseValue", "baseType": "identifier", "value": "completed"}}]
        }
    }]);
    let config = SessionConfig {
        max_attempts: 1,
        ..SessionConfig::default()
    };
    let mut session = started(doc, config);
    answer(&mut session, "A", at(1));
    assert_eq!(session.state().completion_status(), Some("unknown"));
    assert!(session.is_attempt_allowed());

    answer(&mut session, "B", at(2));
    assert_eq!(session.state().completion_status(), Some("completed"));
    assert!(!session.is_attempt_allowed());
}

// ──────────────────────────────────────────────
// Template processing
// ──────────────────────────────────────────────

#[test]
fn template_constraint_reruns_until_satisfied() {
    let doc = json!({
        "identifier": "counter",
        "templateDeclarations": [
            {"identifier": "PASSES", "cardinality": "single", "baseType": "integer", "defaultValue": ["0"]}
        ],
        "templateProcessing": [
            {"type": "setTemplateValue", "identifier": "PASSES",
             "expression": {"type": "sum", "children": [
                 {"type": "variable", "identifier": "PASSES"},
                 {"type": "baseValue", "baseType": "integer", "value": "1"}
             ]}},
            {"type": "templateConstraint",
             "expression": {"type": "gte", "children": [
                 {"type": "variable", "identifier": "PASSES"},
                 {"type": "baseValue", "baseType": "integer", "value": "3"}
             ]}}
        ]
    });
    let session = started(doc, SessionConfig::default());
    assert_eq!(session.state().template_value("PASSES"), Some(&Value::integer(3)));
    assert_eq!(
        session.notifier().count_at_least(NotificationLevel::Warning),
        0
    );
}

#[test]
fn unsatisfiable_constraint_gives_up_with_a_warning() {
    let doc = json!({
        "identifier": "stuck",
        "templateDeclarations": [
            {"identifier": "T", "cardinality": "single", "baseType": "integer", "defaultValue": ["5"]}
        ],
        "templateProcessing": [
            {"type": "setTemplateValue", "identifier": "T",
             "expression": {"type": "baseValue", "baseType": "integer", "value": "9"}},
            {"type": "templateConstraint",
             "expression": {"type": "baseValue", "baseType": "boolean", "value": "false"}}
        ]
    });
    let config = SessionConfig {
        max_template_processing_tries: 4,
        ..SessionConfig::default()
    };
    let session = started(doc, config);
    assert_eq!(session.state().template_value("T"), Some(&Value::integer(5)));
    let warnings: Vec<_> = session
        .notifier()
        .notifications()
        .iter()
        .filter(|n| n.level == NotificationLevel::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("4 passes"), "{}", warnings[0].message);
}

#[test]
fn seeded_sessions_draw_the_same_template_values() {
    let doc = json!({
        "identifier": "random",
        "templateDeclarations": [
            {"identifier": "A", "cardinality": "single", "baseType": "integer"}
        ],
        "templateProcessing": [
            {"type": "setTemplateValue", "identifier": "A",
             "expression": {"type": "randomInteger", "min": 1, "max": 1000}}
        ]
    });
    let config = SessionConfig {
        seed: 42,
        ..SessionConfig::default()
    };
    let first = started(doc.clone(), config.clone());
    let second = started(doc, config);
    let drawn = first.state().template_value("A").cloned().unwrap();
    let picked = drawn.as_integer().unwrap();
    assert!((1..=1000).contains(&picked));
    assert_eq!(second.state().template_value("A"), Some(&drawn));
}

#[test]
fn set_correct_response_overrides_declaration() {
    let doc = json!({
        "identifier": "templated",
        "templateDeclarations": [
            {"identifier": "ANSWER", "cardinality": "single", "baseType": "integer", "defaultValue": ["7"]}
        ],
        "responseDeclarations": [
            {"identifier": "RESPONSE", "cardinality": "single", "baseType": "integer", "correctResponse": ["1"]}
        ],
        "templateProcessing": [
            {"type": "setCorrectResponse", "identifier": "RESPONSE",
             "expression": {"type": "variable", "identifier": "ANSWER"}}
        ]
    });
    let mut session = started(doc, SessionConfig::default());
    assert_eq!(
        session.state().overridden_correct_response("RESPONSE"),
        Some(&Value::integer(7))
    );
    session
        .bind_responses(&responses(&[("RESPONSE", "7".into())]), at(1))
        .unwrap();
    assert_eq!(session.is_correct(), Some(true));
}

// ──────────────────────────────────────────────
// Suspension, timing and persistence
// ──────────────────────────────────────────────

#[test]
fn suspension_pauses_the_clock() {
    let mut session = started(choice_item(), SessionConfig::default());
    session
        .bind_responses(&responses(&[("RESPONSE", "C".into())]), at(10))
        .unwrap();
    session.suspend(at(30)).unwrap();
    assert_eq!(session.status(), SessionStatus::Suspended);
    assert_eq!(session.state().duration(), 30.0);
    assert!(session.perform_response_processing(at(40)).is_err());

    session.resume(at(3600)).unwrap();
    assert_eq!(session.status(), SessionStatus::ResponseBound);
    session.perform_response_processing(at(3615)).unwrap();
    assert_eq!(session.state().duration(), 45.0);
}

#[test]
fn restored_session_continues_where_it_stopped() {
    let item = load(choice_item());
    let mut session = ItemSessionController::new(Arc::clone(&item), SessionConfig::default());
    session.initialize().unwrap();
    session.perform_template_processing().unwrap();
    session.enter_item(T0).unwrap();
    session
        .bind_responses(&responses(&[("RESPONSE", "B".into())]), at(5))
        .unwrap();

    let saved = serde_json::to_string(session.state()).unwrap();
    let state: ItemSessionState = serde_json::from_str(&saved).unwrap();
    assert_eq!(&state, session.state());

    let mut restored = ItemSessionController::restore(item, SessionConfig::default(), state);
    restored.perform_response_processing(at(12)).unwrap();
    assert_eq!(restored.state().outcome_value("SCORE"), Some(&Value::float(1.0)));
    assert_eq!(restored.state().duration(), 12.0);
}

// ──────────────────────────────────────────────
// Feedback
// ──────────────────────────────────────────────

#[test]
fn feedback_follows_outcome() {
    let mut session = started(choice_item(), SessionConfig::default());
    answer(&mut session, "B", at(1));
    let shown: Vec<&str> = session
        .visible_feedback()
        .iter()
        .map(|f| f.content.as_str())
        .collect();
    assert_eq!(shown, vec!["Well done"]);

    answer(&mut session, "D", at(2));
    let shown: Vec<&str> = session
        .visible_feedback()
        .iter()
        .map(|f| f.content.as_str())
        .collect();
    assert_eq!(shown, vec!["Have another look"]);
}
