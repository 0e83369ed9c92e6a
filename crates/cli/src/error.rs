use std::path::PathBuf;

use qti_eval::{EvalError, SessionError};

/// Anything that stops a command. Reported once by `main` before exiting.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("error reading file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error parsing JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("error parsing config '{}': {source}", path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("'{}' has {count} validation error(s)", path.display())]
    Invalid { path: PathBuf, count: usize },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
