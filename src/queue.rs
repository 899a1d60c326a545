//! Redis queue connection for the relay consumer.

use redis::aio::ConnectionManager;

use crate::config::model::QueueConfig;
use crate::error::QueueError;

/// Connection to the Redis queue, built from the `[queue]` config section.
#[derive(Clone)]
pub struct QueueClient {
    connection: ConnectionManager,
}

impl QueueClient {
    /// Connects to Redis using the settings derived from `config`.
    ///
    /// Reconnect attempts use exponential backoff capped at the configured
    /// maximum number of attempts.
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let info = config.connection_info();
        let addr = info.addr.to_string();

        let client = redis::Client::open(info).map_err(|e| QueueError::ConnectionFailed {
            addr: addr.clone(),
            message: e.to_string(),
        })?;

        let connection =
            ConnectionManager::new_with_backoff(client, 2, 100, config.max_attempts as usize)
                .await
                .map_err(|e| QueueError::ConnectionFailed {
                    addr,
                    message: e.to_string(),
                })?;

        Ok(Self { connection })
    }

    /// Round-trips a PING to verify the connection is usable.
    pub async fn ping(&mut self) -> Result<(), QueueError> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.connection)
            .await
            .map_err(|e| QueueError::PingFailed(e.to_string()))?;

        Ok(())
    }
}
