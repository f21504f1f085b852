//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: poll, execute and report until killed (default)
//! - once: a single poll/execute/report cycle
//! - replay: re-submit journaled results
//! - show-config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use provider_agent::config::Config;

/// provider-agent - runs marketplace jobs in containers and reports results
#[derive(Parser, Debug)]
#[command(name = "provider-agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,

    /// Coordinator base URL
    #[arg(long, global = true, env = "PROVIDER_AGENT_COORDINATOR")]
    pub coordinator: Option<String>,

    /// Provider address jobs are matched to
    #[arg(long, global = true, env = "PROVIDER_AGENT_PROVIDER")]
    pub provider: Option<String>,

    /// Host directory for per-job outputs
    #[arg(long, global = true)]
    pub outputs_dir: Option<PathBuf>,

    /// Seconds between polls
    #[arg(long, global = true)]
    pub poll_interval_secs: Option<u64>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Apply command-line overrides on top of the loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.coordinator {
            config.coordinator.url = url.clone();
        }
        if let Some(provider) = &self.provider {
            config.coordinator.provider = provider.clone();
        }
        if let Some(dir) = &self.outputs_dir {
            config.storage.outputs_dir = dir.clone();
        }
        if let Some(secs) = self.poll_interval_secs {
            config.coordinator.poll_interval_ms = secs.saturating_mul(1000);
        }
        if self.verbose {
            config.log_level = Some("debug".to_string());
        }
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Poll, execute and report until the process is killed
    Run,

    /// Run a single poll/execute/report cycle and exit
    Once,

    /// Re-submit results left in the journal and exit
    Replay,

    /// Print the effective configuration as YAML
    ShowConfig,
}
