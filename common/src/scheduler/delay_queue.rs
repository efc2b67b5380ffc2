// Durable scheduling substrate: a Redis sorted set keyed by task id,
// scored by execution time. Cancel-by-key is exact (ZREM).

use crate::db::RedisPool;
use crate::errors::ScheduleError;
use crate::scheduler::DelayQueue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

pub struct RedisDelayQueue {
    redis: RedisPool,
    key: String,
}

impl RedisDelayQueue {
    pub fn new(redis: RedisPool, key: impl Into<String>) -> Self {
        Self {
            redis,
            key: key.into(),
        }
    }
}

#[async_trait]
impl DelayQueue for RedisDelayQueue {
    #[instrument(skip(self))]
    async fn schedule(&self, task_id: i64, execute_at: DateTime<Utc>) -> Result<(), ScheduleError> {
        let mut conn = self.redis.get_connection();

        let _added: i64 = redis::cmd("ZADD")
            .arg(&self.key)
            .arg(execute_at.timestamp())
            .arg(task_id)
            .query_async(&mut conn)
            .await
            .map_err(|e| ScheduleError::SubmitFailed(e.to_string()))?;

        debug!(task_id, execute_at = %execute_at, "Delayed execution registered");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn unschedule(&self, task_id: i64) -> Result<bool, ScheduleError> {
        let mut conn = self.redis.get_connection();

        let removed: i64 = redis::cmd("ZREM")
            .arg(&self.key)
            .arg(task_id)
            .query_async(&mut conn)
            .await
            .map_err(|e| ScheduleError::CancelFailed(e.to_string()))?;

        Ok(removed > 0)
    }

    #[instrument(skip(self))]
    async fn pop_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<i64>, ScheduleError> {
        let mut conn = self.redis.get_connection();

        let due: Vec<i64> = redis::cmd("ZRANGEBYSCORE")
            .arg(&self.key)
            .arg("-inf")
            .arg(now.timestamp())
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await
            .map_err(|e| ScheduleError::Connection(e.to_string()))?;

        if due.is_empty() {
            return Ok(due);
        }

        // Single consumer: a plain ZREM after the range read is enough
        let _removed: i64 = redis::cmd("ZREM")
            .arg(&self.key)
            .arg(&due)
            .query_async(&mut conn)
            .await
            .map_err(|e| ScheduleError::Connection(e.to_string()))?;

        Ok(due)
    }
}
