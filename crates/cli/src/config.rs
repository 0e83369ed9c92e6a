//! Session configuration from an optional TOML file plus flag overrides.
//!
//! ```toml
//! max_attempts = 2
//! max_template_processing_tries = 50
//! seed = 1234
//! ```

use std::path::Path;

use qti_eval::SessionConfig;

use crate::error::CliError;

/// Flag values that take precedence over the file.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Overrides {
    pub seed: Option<u64>,
    pub max_attempts: Option<u32>,
}

pub(crate) fn load(path: Option<&Path>, overrides: Overrides) -> Result<SessionConfig, CliError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            parse(&text).map_err(|source| CliError::Config {
                path: path.to_path_buf(),
                source,
            })?
        }
        None => SessionConfig::default(),
    };
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if let Some(max) = overrides.max_attempts {
        config.max_attempts = max;
    }
    tracing::debug!(?config, "session config");
    Ok(config)
}

fn parse(text: &str) -> Result<SessionConfig, toml::de::Error> {
    toml::from_str(text)
}
