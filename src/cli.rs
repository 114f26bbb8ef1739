//! Command-line interface definition using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Conductor - run subagent task plans in parallel, staged or pipelined form
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to state directory
    #[arg(short, long, env = "CONDUCTOR_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a request read from a JSON file. Exits with status 2 when the
    /// run is partial.
    Run {
        /// Request file, or '-' for stdin
        #[arg(default_value = "-")]
        file: String,

        /// Print the full report as JSON instead of the digest
        #[arg(long)]
        json: bool,

        /// Do not save the report to the run history
        #[arg(long)]
        no_save: bool,

        /// Working directory for subagent sessions (default: current dir)
        #[arg(short, long)]
        workdir: Option<PathBuf>,
    },

    /// List past runs, newest first
    History {
        /// Maximum number of runs to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the digest of a past run
    Show {
        /// Run ID
        #[arg(required = true)]
        run_id: String,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a past run from the history
    Delete {
        /// Run ID
        #[arg(required = true)]
        run_id: String,
    },

    /// Print the JSON Schema for a tool's parameters
    Schema {
        /// task, parallel_tasks, orchestrate or pipeline
        #[arg(required = true)]
        tool: String,
    },
}

impl Cli {
    /// Returns the state directory, defaulting to `./.conductor`.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".conductor"))
    }

    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
