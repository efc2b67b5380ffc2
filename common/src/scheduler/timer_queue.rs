// Fallback scheduling substrate: plain tokio timers inside the process.
// Not durable across restarts, and cancellation is best-effort: a timer
// that has already fired into the due buffer can no longer be aborted.
// The reconciler sweep covers both gaps.

use crate::errors::ScheduleError;
use crate::scheduler::DelayQueue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

#[derive(Default)]
struct TimerState {
    pending: HashMap<i64, JoinHandle<()>>,
    fired: Vec<i64>,
}

#[derive(Default)]
pub struct InProcessTimerQueue {
    state: Arc<Mutex<TimerState>>,
}

impl InProcessTimerQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DelayQueue for InProcessTimerQueue {
    #[instrument(skip(self))]
    async fn schedule(&self, task_id: i64, execute_at: DateTime<Utc>) -> Result<(), ScheduleError> {
        let delay = (execute_at - Utc::now()).to_std().unwrap_or_default();

        // Hold the lock across the spawn so an immediately-firing timer
        // cannot run before its handle lands in the pending map
        let mut state = self.state.lock().await;

        let shared = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = shared.lock().await;
            state.pending.remove(&task_id);
            state.fired.push(task_id);
        });

        if let Some(previous) = state.pending.insert(task_id, handle) {
            previous.abort();
        }

        debug!(task_id, execute_at = %execute_at, "Timer armed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn unschedule(&self, task_id: i64) -> Result<bool, ScheduleError> {
        let mut state = self.state.lock().await;

        let mut existed = false;
        if let Some(handle) = state.pending.remove(&task_id) {
            handle.abort();
            existed = true;
        }
        let before = state.fired.len();
        state.fired.retain(|&id| id != task_id);
        existed |= state.fired.len() < before;

        Ok(existed)
    }

    async fn pop_due(&self, _now: DateTime<Utc>, limit: usize) -> Result<Vec<i64>, ScheduleError> {
        let mut state = self.state.lock().await;
        let take = state.fired.len().min(limit);
        Ok(state.fired.drain(..take).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_due() {
        let queue = InProcessTimerQueue::new();
        queue
            .schedule(7, Utc::now() + chrono::Duration::milliseconds(50))
            .await
            .unwrap();

        assert!(queue.pop_due(Utc::now(), 10).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.pop_due(Utc::now(), 10).await.unwrap(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unschedule_cancels_pending_timer() {
        let queue = InProcessTimerQueue::new();
        queue
            .schedule(7, Utc::now() + chrono::Duration::seconds(5))
            .await
            .unwrap();

        assert!(queue.unschedule(7).await.unwrap());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(queue.pop_due(Utc::now(), 10).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_existing_timer() {
        let queue = InProcessTimerQueue::new();
        queue
            .schedule(7, Utc::now() + chrono::Duration::milliseconds(50))
            .await
            .unwrap();
        queue
            .schedule(7, Utc::now() + chrono::Duration::milliseconds(80))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        // The first timer was replaced, so the id fires exactly once
        assert_eq!(queue.pop_due(Utc::now(), 10).await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_pop_due_respects_limit() {
        let queue = InProcessTimerQueue::new();
        let past = Utc::now() - chrono::Duration::seconds(1);
        for id in 1..=4 {
            queue.schedule(id, past).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let first = queue.pop_due(Utc::now(), 3).await.unwrap();
        let rest = queue.pop_due(Utc::now(), 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(rest.len(), 1);
    }
}
