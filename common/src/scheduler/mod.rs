// Scheduler bridge over the delayed-execution substrate

pub mod delay_queue;
pub mod dispatch;
pub mod reconcile;
pub mod timer_queue;

pub use delay_queue::RedisDelayQueue;
pub use dispatch::Dispatcher;
pub use reconcile::Reconciler;
pub use timer_queue::InProcessTimerQueue;

use crate::config::{SchedulerConfig, SubstrateKind};
use crate::db::repositories::TaskRepository;
use crate::db::RedisPool;
use crate::errors::ScheduleError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::instrument;

/// One interface over the delayed-execution substrate. Entries are keyed by
/// task id alone; there is no second calling convention to probe.
#[async_trait]
pub trait DelayQueue: Send + Sync {
    /// Register a delayed execution for the task
    async fn schedule(&self, task_id: i64, execute_at: DateTime<Utc>) -> Result<(), ScheduleError>;

    /// Remove any entry for the task. Returns whether one existed.
    async fn unschedule(&self, task_id: i64) -> Result<bool, ScheduleError>;

    /// Take up to `limit` task ids whose execution time has passed
    async fn pop_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<i64>, ScheduleError>;
}

/// Build the substrate selected by configuration
pub fn build_queue(
    config: &SchedulerConfig,
    redis: Option<RedisPool>,
) -> Result<Arc<dyn DelayQueue>, ScheduleError> {
    match config.substrate {
        SubstrateKind::Durable => {
            let redis = redis.ok_or_else(|| {
                ScheduleError::Connection(
                    "Durable substrate selected but no Redis connection provided".to_string(),
                )
            })?;
            Ok(Arc::new(RedisDelayQueue::new(redis, config.queue_key.clone())))
        }
        SubstrateKind::Timer => Ok(Arc::new(InProcessTimerQueue::new())),
    }
}

/// SchedulerBridge pairs the substrate with the task store: every schedule
/// first cancels any existing entry for the key, then registers the delayed
/// call, then persists the chosen time onto the task row. The
/// cancel-before-schedule discipline is what keeps re-scheduling idempotent
/// when stale entries survive from earlier runs.
pub struct SchedulerBridge {
    queue: Arc<dyn DelayQueue>,
    tasks: Arc<TaskRepository>,
}

impl SchedulerBridge {
    pub fn new(queue: Arc<dyn DelayQueue>, tasks: Arc<TaskRepository>) -> Self {
        Self { queue, tasks }
    }

    #[instrument(skip(self))]
    pub async fn schedule(
        &self,
        task_id: i64,
        execute_at: DateTime<Utc>,
    ) -> Result<(), ScheduleError> {
        self.queue.unschedule(task_id).await?;
        self.queue.schedule(task_id, execute_at).await?;
        self.tasks.set_schedule(task_id, execute_at).await?;
        Ok(())
    }

    /// Best-effort removal of any delayed execution for the task
    #[instrument(skip(self))]
    pub async fn unschedule(&self, task_id: i64) -> Result<(), ScheduleError> {
        self.queue.unschedule(task_id).await?;
        Ok(())
    }
}
