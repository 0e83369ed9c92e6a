use std::path::Path;
use std::sync::Arc;

use qti_core::AssessmentTest;
use qti_eval::{TestItemState, TestOutcomeProcessor};
use serde_json::json;

use super::{print_json, print_notifications, read_json};
use crate::error::CliError;
use crate::OutputFormat;

/// Run a test's outcome processing over item states read from JSON.
pub(crate) fn cmd_outcome(
    test_path: &Path,
    items_path: &Path,
    seed: u64,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let test: AssessmentTest = read_json(test_path)?;
    let items: Vec<TestItemState> = read_json(items_path)?;
    let mut processor = TestOutcomeProcessor::new(Arc::new(test), seed);

    let errors = processor.validate();
    if errors > 0 {
        print_notifications(&processor.take_notifications(), OutputFormat::Text, quiet);
        return Err(CliError::Invalid {
            path: test_path.to_path_buf(),
            count: errors,
        });
    }
    processor.process(&items)?;

    let notifications = processor.take_notifications();
    if !quiet {
        match output {
            OutputFormat::Text => {
                println!("test: {} ({} item(s))", processor.test().identifier, items.len());
                for (identifier, value) in processor.outcomes() {
                    println!("  {} = {}", identifier, value);
                }
            }
            OutputFormat::Json => print_json(&json!({
                "identifier": processor.test().identifier,
                "outcomes": processor.outcomes(),
                "notifications": notifications,
            })),
        }
    }
    print_notifications(&notifications, output, quiet);
    Ok(())
}
