use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use qti_core::{AssessmentItem, Identifier, Value, VariableType};
use qti_eval::{BindOutcome, ItemSessionController, ResponseData, SessionConfig};
use serde_json::json;
use time::OffsetDateTime;

use super::{print_json, print_notifications, read_json};
use crate::error::CliError;
use crate::OutputFormat;

/// Run one attempt of an item: template processing, then, when responses
/// are given, binding, constraint checks and response processing.
pub(crate) fn cmd_run(
    item_path: &Path,
    responses_path: Option<&Path>,
    config: SessionConfig,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let item: AssessmentItem = read_json(item_path)?;
    let mut session = ItemSessionController::new(Arc::new(item), config);

    let errors = session.validate();
    if errors > 0 {
        print_notifications(&session.take_notifications(), OutputFormat::Text, quiet);
        return Err(CliError::Invalid {
            path: item_path.to_path_buf(),
            count: errors,
        });
    }

    let now = OffsetDateTime::now_utc();
    session.initialize()?;
    session.perform_template_processing()?;
    session.enter_item(now)?;

    let mut invalid = BTreeSet::new();
    let mut attempted = false;
    if let Some(path) = responses_path {
        let responses: BTreeMap<Identifier, ResponseData> = read_json(path)?;
        match session.bind_responses(&responses, now)? {
            BindOutcome::Bound(_) => {
                invalid = session.validate_responses()?;
                session.perform_response_processing(now)?;
                attempted = true;
            }
            BindOutcome::NoMoreAttempts => {}
        }
    }
    session.end_item(now)?;
    tracing::info!(
        item = %session.item().identifier,
        attempted,
        invalid = invalid.len(),
        "item run finished"
    );

    let notifications = session.take_notifications();
    if !quiet {
        match output {
            OutputFormat::Text => print_text(&session, &invalid),
            OutputFormat::Json => {
                let state = session.state();
                let feedback: Vec<_> = session
                    .visible_feedback()
                    .into_iter()
                    .map(|f| json!({"identifier": f.identifier, "content": f.content}))
                    .collect();
                print_json(&json!({
                    "identifier": session.item().identifier,
                    "status": session.status(),
                    "templateValues": state.values(VariableType::Template),
                    "responses": state.values(VariableType::Response),
                    "outcomes": state.values(VariableType::Outcome),
                    "invalidResponses": invalid,
                    "correct": session.is_correct(),
                    "feedback": feedback,
                    "notifications": notifications,
                }));
            }
        }
    }
    print_notifications(&notifications, output, quiet);
    Ok(())
}

fn print_text(session: &ItemSessionController, invalid: &BTreeSet<Identifier>) {
    let state = session.state();
    println!("item: {} ({})", session.item().identifier, session.status());
    for (label, namespace) in [
        ("template", VariableType::Template),
        ("responses", VariableType::Response),
        ("outcomes", VariableType::Outcome),
    ] {
        let values = state.values(namespace);
        if values.is_empty() {
            continue;
        }
        println!("{}:", label);
        print_values(values);
    }
    if !invalid.is_empty() {
        let names: Vec<&str> = invalid.iter().map(Identifier::as_str).collect();
        println!("invalid responses: {}", names.join(", "));
    }
    if let Some(correct) = session.is_correct() {
        println!("correct: {}", correct);
    }
    for feedback in session.visible_feedback() {
        if feedback.content.is_empty() {
            println!("feedback: {}", feedback.identifier);
        } else {
            println!("feedback: {}: {}", feedback.identifier, feedback.content);
        }
    }
}

fn print_values(values: &BTreeMap<Identifier, Value>) {
    for (identifier, value) in values {
        println!("  {} = {}", identifier, value);
    }
}
