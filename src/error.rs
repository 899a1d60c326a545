//! Error types for the metrics relay.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Watcher error: {0}")]
    Watcher(#[from] WatcherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("No configuration file has been loaded yet")]
    NotLoaded,
}

/// Redis queue connection errors.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to Redis at '{addr}': {message}")]
    ConnectionFailed { addr: String, message: String },

    #[error("Redis ping failed: {0}")]
    PingFailed(String),
}

/// Config file watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
}
