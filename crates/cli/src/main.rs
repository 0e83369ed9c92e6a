mod commands;
mod config;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// QTI item runtime.
#[derive(Parser)]
#[command(name = "qti", version, about = "QTI assessment item runtime")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log filter for stderr, e.g. `debug` or `qti_eval=trace`. Defaults to
    /// RUST_LOG, then `warn`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Statically validate an item (or, with --test, an assessment test)
    Validate {
        /// Path to the item or test JSON file
        file: PathBuf,
        /// Treat the file as an assessment test
        #[arg(long)]
        test: bool,
    },

    /// Run template and response processing for one attempt of an item
    Run {
        /// Path to the item JSON file
        item: PathBuf,
        /// JSON object mapping response identifiers to submitted strings
        #[arg(long)]
        responses: Option<PathBuf>,
        /// TOML session configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Seed for the session's random source (overrides the config)
        #[arg(long)]
        seed: Option<u64>,
        /// Maximum attempts, 0 for unlimited (overrides the config)
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Run test-level outcome processing over item session states
    Outcome {
        /// Path to the assessment test JSON file
        test: PathBuf,
        /// JSON array of item states
        #[arg(long)]
        items: PathBuf,
        /// Seed for random expressions in outcome processing
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let result = match &cli.command {
        Commands::Validate { file, test } => {
            commands::validate::cmd_validate(file, *test, cli.output, cli.quiet)
        }
        Commands::Run {
            item,
            responses,
            config,
            seed,
            max_attempts,
        } => config::load(
            config.as_deref(),
            config::Overrides {
                seed: *seed,
                max_attempts: *max_attempts,
            },
        )
        .and_then(|session_config| {
            commands::run::cmd_run(
                item,
                responses.as_deref(),
                session_config,
                cli.output,
                cli.quiet,
            )
        }),
        Commands::Outcome { test, items, seed } => {
            commands::outcome::cmd_outcome(test, items, *seed, cli.output, cli.quiet)
        }
    };

    if let Err(err) = result {
        report_error(&err, cli.output, cli.quiet);
        process::exit(1);
    }
}

/// Log to stderr. `--log-level` wins over RUST_LOG.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn report_error(err: &CliError, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", err),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": err.to_string() }));
        }
    }
}
