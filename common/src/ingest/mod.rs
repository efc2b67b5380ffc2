// Batch CSV ingestor: reads a bounded slice of source rows, maps them to
// task snapshots, computes pacing, persists and schedules each task, and
// continues itself until end-of-input.

pub mod rows;

pub use rows::{BatchRow, RawBatch};

use crate::config::IngestConfig;
use crate::db::repositories::{LogRepository, ProjectRepository, TaskRepository};
use crate::errors::{DatabaseError, IngestError};
use crate::models::{NewTask, ProjectStatus, TaskData};
use crate::scheduler::SchedulerBridge;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Pacing gap between consecutive tasks of a project
pub fn pacing_step(interval_minutes: i32) -> chrono::Duration {
    chrono::Duration::seconds(interval_minutes as i64 * 60)
}

/// Where the pacing cursor starts: a fresh project begins a small grace
/// after "now"; a project with existing tasks continues one interval after
/// its most recent scheduled time, whichever is later.
pub fn pacing_start(
    now: DateTime<Utc>,
    grace_seconds: i64,
    interval_minutes: i32,
    last_scheduled: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let base = now + chrono::Duration::seconds(grace_seconds);
    match last_scheduled {
        Some(last) => base.max(last + pacing_step(interval_minutes)),
        None => base,
    }
}

/// Outcome of one ingestion invocation
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub emitted: usize,
    pub skipped: usize,
    /// Offset for the continuation call; advances by consumed rows
    pub next_offset: i64,
    pub end_of_input: bool,
}

pub struct Ingestor {
    projects: Arc<ProjectRepository>,
    tasks: Arc<TaskRepository>,
    logs: Arc<LogRepository>,
    bridge: Arc<SchedulerBridge>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        projects: Arc<ProjectRepository>,
        tasks: Arc<TaskRepository>,
        logs: Arc<LogRepository>,
        bridge: Arc<SchedulerBridge>,
        config: IngestConfig,
    ) -> Self {
        Self {
            projects,
            tasks,
            logs,
            bridge,
            config,
        }
    }

    /// Process at most `batch_size` non-blank data rows starting at
    /// `offset`. `batch_size` 0 selects the configured default.
    ///
    /// An unreadable source aborts the batch, logs the error, and leaves
    /// the project status unchanged.
    #[instrument(skip(self), fields(project_id = %project_id, offset))]
    pub async fn ingest_batch(
        &self,
        project_id: Uuid,
        offset: i64,
        batch_size: usize,
    ) -> Result<BatchReport, IngestError> {
        let batch_size = if batch_size == 0 {
            self.config.default_batch_size
        } else {
            batch_size
        };

        let Some(project) = self.projects.find_by_id(project_id).await? else {
            return Err(IngestError::ProjectNotFound(project_id));
        };

        let bytes = match tokio::fs::read(&project.source_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = IngestError::SourceUnreadable {
                    path: project.source_path.clone(),
                    reason: e.to_string(),
                };
                self.logs
                    .append(Some(project.id), None, &format!("Ingestion error: {}", err))
                    .await?;
                return Err(err);
            }
        };

        let batch = rows::read_batch(bytes.as_slice(), project.has_header, offset, batch_size)?;

        let mut cursor = pacing_start(
            Utc::now(),
            self.config.start_grace_seconds,
            project.interval_minutes,
            self.tasks.last_scheduled_at(project.id).await?,
        );
        let step = pacing_step(project.interval_minutes);

        let emitted = batch.rows.len();
        for row in &batch.rows {
            let task = NewTask {
                project_id: project.id,
                row_index: row.row_index,
                data: TaskData::snapshot(row.fields.clone(), &project),
                scheduled_at: cursor,
            };
            let task_id = self.tasks.insert(&task).await?;
            self.bridge.schedule(task_id, cursor).await?;
            cursor = cursor + step;
        }

        self.logs
            .append(
                Some(project.id),
                None,
                &format!(
                    "Batch at offset {} complete: {} created, {} skipped",
                    offset, emitted, batch.skipped
                ),
            )
            .await?;

        if batch.end_of_input {
            self.projects
                .set_status(project.id, ProjectStatus::Ready)
                .await?;
            self.logs
                .append(Some(project.id), None, "Ingestion complete, project ready")
                .await?;
            info!(project_id = %project.id, "Project ready");
        }

        Ok(BatchReport {
            emitted,
            skipped: batch.skipped,
            next_offset: offset + batch.consumed as i64,
            end_of_input: batch.end_of_input,
        })
    }

    /// Drive batches with the configured pause in between until
    /// end-of-input. Errors abort the run; the project stays `waiting` and
    /// can be resumed on the next start.
    pub async fn run_to_completion(&self, project_id: Uuid, mut offset: i64) {
        loop {
            match self.ingest_batch(project_id, offset, 0).await {
                Ok(report) => {
                    if report.end_of_input {
                        break;
                    }
                    offset = report.next_offset;
                    tokio::time::sleep(Duration::from_secs(
                        self.config.continuation_delay_seconds,
                    ))
                    .await;
                }
                Err(e) => {
                    error!(project_id = %project_id, error = %e, "Ingestion aborted");
                    break;
                }
            }
        }
    }

    /// Projects whose ingestion had not reached end-of-input when the
    /// process last stopped, with the offset each should resume from.
    pub async fn resume_offsets(&self) -> Result<Vec<(Uuid, i64)>, DatabaseError> {
        let mut pending = Vec::new();
        for project in self.projects.waiting().await? {
            let offset = self.tasks.next_row_index(project.id).await?;
            pending.push((project.id, offset));
        }
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_fresh_project_starts_after_grace() {
        let now = Utc::now();
        let start = pacing_start(now, 5, 5, None);
        assert_eq!(start, now + chrono::Duration::seconds(5));
    }

    #[test]
    fn test_pacing_continues_from_latest_schedule() {
        let now = Utc::now();
        let last = now + chrono::Duration::minutes(30);
        let start = pacing_start(now, 5, 5, Some(last));
        assert_eq!(start, last + chrono::Duration::minutes(5));
    }

    #[test]
    fn test_pacing_ignores_stale_schedule_in_the_past() {
        let now = Utc::now();
        let last = now - chrono::Duration::hours(2);
        let start = pacing_start(now, 5, 5, Some(last));
        assert_eq!(start, now + chrono::Duration::seconds(5));
    }

    #[test]
    fn test_pacing_step_is_interval_in_seconds() {
        assert_eq!(pacing_step(5).num_seconds(), 300);
        assert_eq!(pacing_step(1).num_seconds(), 60);
    }

    #[test]
    fn test_two_row_batch_schedules_one_interval_apart() {
        let source = "name,topic\nAlice,Go\nBob,Rust\n";
        let batch = rows::read_batch(source.as_bytes(), true, 0, 10).unwrap();
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(
            batch.rows[0].fields.get("name").map(String::as_str),
            Some("Alice")
        );
        assert_eq!(
            batch.rows[1].fields.get("topic").map(String::as_str),
            Some("Rust")
        );

        let now = Utc::now();
        let first = pacing_start(now, 5, 5, None);
        let second = first + pacing_step(5);
        assert_eq!((second - first).num_seconds(), 300);
    }
}
