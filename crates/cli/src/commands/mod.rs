pub(crate) mod outcome;
pub(crate) mod run;
pub(crate) mod validate;

use std::path::Path;

use qti_core::Notification;
use serde::de::DeserializeOwned;

use crate::error::CliError;
use crate::OutputFormat;

/// Read and deserialize a JSON document.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Print notifications to stderr in text mode. JSON output embeds them in
/// the command's result instead.
pub(crate) fn print_notifications(notifications: &[Notification], output: OutputFormat, quiet: bool) {
    if quiet || output == OutputFormat::Json {
        return;
    }
    for notification in notifications {
        eprintln!("  {}", notification);
    }
}

pub(crate) fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("error serializing output: {}", e),
    }
}
