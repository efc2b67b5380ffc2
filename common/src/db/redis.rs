// Redis connection for the durable scheduling substrate

use crate::config::RedisConfig;
use crate::errors::ScheduleError;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

/// Redis connection wrapper
#[derive(Clone)]
pub struct RedisPool {
    manager: ConnectionManager,
}

impl RedisPool {
    #[instrument(skip(config), fields(redis_url = %config.url))]
    pub async fn new(config: &RedisConfig) -> Result<Self, ScheduleError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| ScheduleError::Connection(format!("Failed to create Redis client: {}", e)))?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            ScheduleError::Connection(format!("Failed to create connection manager: {}", e))
        })?;

        info!("Redis connection initialized");

        Ok(Self { manager })
    }

    /// Get a connection handle; the manager multiplexes internally
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), ScheduleError> {
        let mut conn = self.get_connection();

        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ScheduleError::Connection(format!("Health check failed: {}", e)))?;

        if response != "PONG" {
            return Err(ScheduleError::Connection(format!(
                "Unexpected PING response: {}",
                response
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_redis_health_check() {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
        };

        let pool = RedisPool::new(&config).await.unwrap();
        assert!(pool.health_check().await.is_ok());
    }
}
