use std::path::Path;

use qti_core::{AssessmentItem, AssessmentTest, Notifier};
use qti_eval::{validate_item, validate_test};
use serde_json::json;

use super::{print_json, print_notifications, read_json};
use crate::error::CliError;
use crate::OutputFormat;

/// Statically validate an item, or with `test` set an assessment test.
pub(crate) fn cmd_validate(
    path: &Path,
    test: bool,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let mut notifier = Notifier::new();
    let (identifier, errors) = if test {
        let doc: AssessmentTest = read_json(path)?;
        let errors = validate_test(&doc, &mut notifier);
        (doc.identifier, errors)
    } else {
        let doc: AssessmentItem = read_json(path)?;
        let errors = validate_item(&doc, &mut notifier);
        (doc.identifier, errors)
    };
    let notifications = notifier.take_notifications();

    if !quiet {
        match output {
            OutputFormat::Text => {
                if errors == 0 {
                    println!("valid: {} ({} notification(s))", identifier, notifications.len());
                } else {
                    println!("invalid: {}", identifier);
                }
            }
            OutputFormat::Json => print_json(&json!({
                "identifier": identifier,
                "valid": errors == 0,
                "errors": errors,
                "notifications": notifications,
            })),
        }
    }
    print_notifications(&notifications, output, quiet);

    if errors > 0 {
        return Err(CliError::Invalid {
            path: path.to_path_buf(),
            count: errors,
        });
    }
    Ok(())
}
