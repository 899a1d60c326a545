//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// A hot-reloadable configuration core for a Redis-backed metrics relay.
#[derive(Parser, Debug)]
#[command(name = "metric-relay", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "/etc/metric-relay/relay.yaml", env = "CONFIG_PATH", global = true)]
    pub config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level forced by verbosity flags, if any.
    pub fn log_level_override(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

/// Available subcommands for the relay.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the relay and reload configuration on SIGHUP or file change.
    Run(RunArgs),

    /// Validate the configuration file without starting.
    #[command(name = "config-validate")]
    ConfigValidate,

    /// Display the effective configuration with defaults applied.
    #[command(name = "config-show")]
    ConfigShow,
}

/// Arguments for the run subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Disable the config file watcher (reload on SIGHUP only).
    #[arg(long, default_value = "false")]
    pub no_watch: bool,
}
