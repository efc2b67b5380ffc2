// Reconciler: periodic sweep that re-submits waiting tasks whose execution
// window has passed without being picked up. Recovers schedules lost to
// restarts, substrate eviction, or a crash between task insert and schedule
// registration. A backstop, not the primary execution path.

use crate::db::repositories::TaskRepository;
use crate::errors::ScheduleError;
use crate::scheduler::SchedulerBridge;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

pub struct Reconciler {
    tasks: Arc<TaskRepository>,
    bridge: Arc<SchedulerBridge>,
    sweep_interval: Duration,
    /// Bounds the reconciliation burst per tick
    batch: i64,
    resubmit_grace: chrono::Duration,
}

impl Reconciler {
    pub fn new(
        tasks: Arc<TaskRepository>,
        bridge: Arc<SchedulerBridge>,
        sweep_interval: Duration,
        batch: i64,
        resubmit_grace_seconds: i64,
    ) -> Self {
        Self {
            tasks,
            bridge,
            sweep_interval,
            batch,
            resubmit_grace: chrono::Duration::seconds(resubmit_grace_seconds),
        }
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(sweep_interval = ?self.sweep_interval, "Reconciler started");
        let mut tick = interval(self.sweep_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Reconciliation sweep failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, stopping reconciler");
                    break;
                }
            }
        }
    }

    /// Re-submit up to `batch` overdue waiting tasks, oldest first
    pub async fn sweep(&self) -> Result<usize, ScheduleError> {
        let now = Utc::now();
        let overdue = self.tasks.due_waiting(now, self.batch).await?;
        let count = overdue.len();

        for task in &overdue {
            self.bridge
                .schedule(task.id, now + self.resubmit_grace)
                .await?;
            debug!(task_id = task.id, "Overdue task re-submitted");
        }

        if count > 0 {
            info!(count, "Re-submitted overdue waiting tasks");
        }
        Ok(count)
    }
}
