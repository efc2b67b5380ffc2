// Dispatcher: polls the substrate for due task ids and hands each one to
// the executor. Executions for distinct tasks run concurrently.

use crate::errors::ScheduleError;
use crate::executor::TaskExecutor;
use crate::scheduler::DelayQueue;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

pub struct Dispatcher {
    queue: Arc<dyn DelayQueue>,
    executor: Arc<TaskExecutor>,
    poll_interval: Duration,
    batch: usize,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<dyn DelayQueue>,
        executor: Arc<TaskExecutor>,
        poll_interval: Duration,
        batch: usize,
    ) -> Self {
        Self {
            queue,
            executor,
            poll_interval,
            batch,
        }
    }

    /// Poll loop; runs until the shutdown signal arrives
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(poll_interval = ?self.poll_interval, "Dispatcher started");
        let mut tick = interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "Dispatch poll failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, stopping dispatcher");
                    break;
                }
            }
        }
    }

    /// Take due task ids from the substrate and spawn one execution per id
    pub async fn poll_once(&self) -> Result<usize, ScheduleError> {
        let due = self.queue.pop_due(Utc::now(), self.batch).await?;
        let count = due.len();

        for task_id in due {
            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move {
                if let Err(e) = executor.execute(task_id).await {
                    error!(task_id, error = %e, "Task execution failed");
                }
            });
        }

        if count > 0 {
            debug!(count, "Dispatched due tasks");
        }
        Ok(count)
    }
}
