//! Command-line interface for featgroup.
//!
//! The `featgroup` binary loads a feature table from a YAML document and either
//! reports its structure or evaluates it against a request built from the
//! command line.
//!
//! # Commands
//!
//! - `check` - Load a table and print the evaluation order with dependencies
//! - `eval` - Load a table and resolve keys for one request
//!
//! # Logging
//!
//! Log output goes to stderr. `FEATGROUP_LOG` takes an `EnvFilter` directive
//! (e.g. `featgroup=trace`); without it, `--verbose` enables debug output and
//! `--quiet` turns logging off.
//!
//! ```bash
//! featgroup check features.yaml --key upstream.proxy -d url:required
//! featgroup eval features.yaml --key upstream.proxy --var host=example.com
//! FEATGROUP_LOG=featgroup=trace featgroup eval features.yaml
//! ```

mod check;
pub mod common;
mod eval;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "FEATGROUP_LOG";

/// Runtime configuration derived from global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter directive, `None` disables logging
    pub log_level: Option<String>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global tracing subscriber.
    ///
    /// `FEATGROUP_LOG` wins over the level chosen by flags.
    pub fn init_logging(&self) {
        let filter = match (EnvFilter::try_from_env(LOG_ENV), &self.log_level) {
            (Ok(filter), _) => filter,
            (Err(_), Some(level)) => EnvFilter::new(level),
            (Err(_), None) => return,
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Main CLI structure.
#[derive(Parser)]
#[command(
    name = "featgroup",
    about = "Load and evaluate feature tables from YAML configuration",
    version,
    long_about = "featgroup compiles configured format expressions into a dependency-ordered \
                  feature table and evaluates it against request state."
)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a feature table and show its evaluation order
    Check(check::CheckCommand),

    /// Load a feature table and resolve keys for one request
    Eval(eval::EvalCommand),
}

impl Cli {
    /// Execute the selected command.
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        match self.command {
            Commands::Check(cmd) => cmd.execute(),
            Commands::Eval(cmd) => cmd.execute(),
        }
    }

    /// Build the runtime configuration from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("featgroup=debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("featgroup=warn".to_string())
        };

        CliConfig {
            log_level,
        }
    }
}
