//! Configuration data structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure containing all settings.
///
/// A value of this type is only ever produced by a successful decode of the
/// whole config file (or by `Default` before the first load); it is never
/// mutated in place after construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener and relay settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Registry lookup settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Redis queue connection settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// HTTP listener and relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the relay listens on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Port of the upstream InfluxDB instance metrics are relayed to.
    #[serde(default = "default_upstream_port")]
    pub upstream_port: u16,

    /// Interval in seconds between topic list refreshes.
    #[serde(default = "default_topics_poll_interval")]
    pub topics_poll_interval_secs: u64,

    /// Suffix marking metrics that are hidden from listing output.
    #[serde(default)]
    pub hidden_metric_suffix: String,
}

/// Registry lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the resource registry.
    #[serde(default)]
    pub link: String,

    /// Seconds a cached registry entry stays valid.
    #[serde(default = "default_registry_expire")]
    pub expire_secs: u64,
}

/// Redis queue connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Whether the relay consumes from the queue at all.
    #[serde(default)]
    pub enable: bool,

    /// Redis server hostname.
    #[serde(default = "default_queue_host")]
    pub host: String,

    /// Redis server port.
    #[serde(default = "default_queue_port")]
    pub port: u16,

    /// Redis database number.
    #[serde(default)]
    pub db: u8,

    /// Optional Redis password.
    #[serde(default)]
    pub password: Option<String>,

    /// Channels the relay subscribes to.
    #[serde(default)]
    pub channels: Vec<String>,

    /// Prefix prepended to every metric topic key.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Maximum delivery attempts per message.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum number of messages processed concurrently.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Heartbeat interval in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Read timeout in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Interval in milliseconds between queue polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of consumer workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

impl QueueConfig {
    /// Builds the Redis connection settings for this queue section.
    ///
    /// Pure function of the section: called twice on the same section it
    /// yields identical settings, and it is recomputed on every call so the
    /// result always reflects the record it was called on. Fields the Redis
    /// client does not take from configuration stay at client defaults.
    pub fn connection_info(&self) -> redis::ConnectionInfo {
        redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: redis::RedisConnectionInfo {
                db: i64::from(self.db),
                username: None,
                password: self.password.clone(),
            },
        }
    }

    /// Heartbeat interval as a duration.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Read timeout as a duration.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Queue poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to emit JSON-formatted log lines.
    #[serde(default = "default_true")]
    pub json: bool,
}

// Default value functions

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_upstream_port() -> u16 {
    8086
}

fn default_topics_poll_interval() -> u64 {
    30
}

fn default_registry_expire() -> u64 {
    300
}

fn default_queue_host() -> String {
    "127.0.0.1".to_string()
}

fn default_queue_port() -> u16 {
    6379
}

fn default_topic_prefix() -> String {
    "metric".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_in_flight() -> usize {
    200
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_read_timeout_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_worker_count() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            upstream_port: default_upstream_port(),
            topics_poll_interval_secs: default_topics_poll_interval(),
            hidden_metric_suffix: String::new(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            link: String::new(),
            expire_secs: default_registry_expire(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: default_queue_host(),
            port: default_queue_port(),
            db: 0,
            password: None,
            channels: Vec::new(),
            topic_prefix: default_topic_prefix(),
            max_attempts: default_max_attempts(),
            max_in_flight: default_max_in_flight(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            worker_count: default_worker_count(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: true,
        }
    }
}
