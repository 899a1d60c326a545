//! Metric Relay - a hot-reloadable configuration core for a Redis-backed
//! metrics relay.
//!
//! This library provides the relay's configuration store, the on-disk schema
//! with its derived Redis client settings, and the supervision loop that
//! reloads configuration on SIGHUP or file change without restarting the
//! process.

pub mod cli;
pub mod config;
pub mod error;
pub mod queue;

use std::path::Path;

use anyhow::Result;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::{Cli, Commands, RunArgs};
use crate::config::hot_reload::ConfigWatcher;
use crate::config::model::LogConfig;
use crate::config::ConfigStore;
use crate::queue::QueueClient;

/// Runs the relay with the provided CLI arguments.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(ref args) => run_daemon(args, &cli).await,
        Commands::ConfigValidate => validate_config(&cli.config),
        Commands::ConfigShow => show_config(&cli.config),
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// The level comes from the `[log]` config section unless `-v` flags or
/// `RUST_LOG` override it.
fn setup_logging(log: &LogConfig, level_override: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = level_override.unwrap_or(&log.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if log.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }
}

/// Runs the relay daemon: initial load, then supervised reloads until
/// shutdown.
///
/// A failed initial load is returned to the caller. A failed reload is
/// fatal: the supervision loop is the only consumer of a signal-triggered
/// reload, and continuing on configuration that no longer matches the file
/// is worse than stopping, so the error is propagated and the process exits
/// non-zero.
async fn run_daemon(args: &RunArgs, cli: &Cli) -> Result<()> {
    let store = ConfigStore::new();
    store.load(&cli.config)?;

    let config = store.get();
    setup_logging(&config.log, cli.log_level_override());

    info!(path = %cli.config.display(), "Starting metric relay");

    // Fail fast on an unreachable queue before entering the loop.
    if config.queue.enable {
        let mut queue = QueueClient::connect(&config.queue).await?;
        queue.ping().await?;
        info!(
            addr = %config.queue.connection_info().addr,
            workers = config.queue.worker_count,
            "Connected to Redis queue"
        );
    }

    let (change_tx, mut change_rx) = mpsc::channel(1);
    let _watcher = if args.no_watch {
        None
    } else {
        Some(ConfigWatcher::new(&cli.config).run(change_tx)?)
    };

    let mut hangup = signal(SignalKind::hangup())?;

    info!("Metric relay is running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }

            _ = hangup.recv() => {
                info!("SIGHUP received, reloading configuration");
                reload_or_die(&store)?;
            }

            Some(()) = change_rx.recv() => {
                info!("Config file changed, reloading configuration");
                reload_or_die(&store)?;
            }
        }
    }

    info!("Shutting down metric relay");
    Ok(())
}

/// Reloads the store, treating any failure as fatal to the daemon.
fn reload_or_die(store: &ConfigStore) -> Result<()> {
    match store.reload() {
        Ok(()) => {
            info!("Configuration reloaded");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Configuration reload failed, stopping");
            Err(e.into())
        }
    }
}

/// Validates the configuration file and reports a summary.
fn validate_config(config_path: &Path) -> Result<()> {
    let config = config::loader::load_from_path(config_path)?;

    println!("Configuration is valid.");
    println!("  listen: {}", config.server.listen);
    println!(
        "  queue: {} ({} channel(s))",
        if config.queue.enable { "enabled" } else { "disabled" },
        config.queue.channels.len()
    );
    if config.registry.link.is_empty() {
        println!("  registry: (unset)");
    } else {
        println!("  registry: {}", config.registry.link);
    }

    Ok(())
}

/// Displays the effective configuration with defaults applied.
fn show_config(config_path: &Path) -> Result<()> {
    let config = config::loader::load_from_path(config_path)?;
    let yaml = serde_yaml::to_string(&config)?;
    println!("{}", yaml);
    Ok(())
}
