// Task repository.
//
// Status transitions out of `waiting` are conditional UPDATEs: the WHERE
// clause carries the expected current status, so a concurrent duplicate
// invocation loses the race and changes no rows.

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{NewTask, Task, TaskData, TaskStatus};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, project_id, row_index, data, scheduled_at, status, \
     last_error, created_at, updated_at";

/// Repository for task-related database operations
pub struct TaskRepository {
    pool: DbPool,
}

impl TaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<Task, DatabaseError> {
        let data_json: serde_json::Value = row.try_get("data")?;
        let data: TaskData = serde_json::from_value(data_json)
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to parse task data: {}", e)))?;
        let status: TaskStatus = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(DatabaseError::QueryFailed)?;

        Ok(Task {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            row_index: row.try_get("row_index")?,
            data,
            scheduled_at: row.try_get("scheduled_at")?,
            status,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Insert one task row, returning its assigned id
    #[instrument(skip(self, task), fields(project_id = %task.project_id, row_index = task.row_index))]
    pub async fn insert(&self, task: &NewTask) -> Result<i64, DatabaseError> {
        let data_json = serde_json::to_value(&task.data).map_err(|e| {
            DatabaseError::QueryFailed(format!("Failed to serialize task data: {}", e))
        })?;

        let row = sqlx::query(
            r#"
            INSERT INTO tasks (project_id, row_index, data, scheduled_at, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            RETURNING id
            "#,
        )
        .bind(task.project_id)
        .bind(task.row_index)
        .bind(data_json)
        .bind(task.scheduled_at)
        .bind(TaskStatus::Waiting.to_string())
        .fetch_one(self.pool.pool())
        .await?;

        Ok(row.try_get("id")?)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    /// Latest scheduled_at in the project; the ingestion pacing cursor
    /// continues from here
    #[instrument(skip(self))]
    pub async fn last_scheduled_at(
        &self,
        project_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let row = sqlx::query("SELECT MAX(scheduled_at) AS last FROM tasks WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(self.pool.pool())
            .await?;

        Ok(row.try_get("last")?)
    }

    /// Next unassigned row index for the project; 0 when it has no tasks.
    /// Used to resume ingestion after a restart.
    #[instrument(skip(self))]
    pub async fn next_row_index(&self, project_id: Uuid) -> Result<i64, DatabaseError> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(row_index) + 1, 0) AS next FROM tasks WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(row.try_get("next")?)
    }

    /// Waiting tasks whose execution window has passed, oldest first
    #[instrument(skip(self))]
    pub async fn due_waiting(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Task>, DatabaseError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM tasks
            WHERE status = $1 AND scheduled_at <= $2
            ORDER BY scheduled_at ASC
            LIMIT $3
            "#,
            TASK_COLUMNS
        ))
        .bind(TaskStatus::Waiting.to_string())
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    /// Waiting tasks of one project in ascending id (insertion) order
    #[instrument(skip(self))]
    pub async fn waiting_in_project(&self, project_id: Uuid) -> Result<Vec<Task>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tasks WHERE project_id = $1 AND status = $2 ORDER BY id ASC",
            TASK_COLUMNS
        ))
        .bind(project_id)
        .bind(TaskStatus::Waiting.to_string())
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    /// Tasks of one project for the listing surface, newest first
    #[instrument(skip(self))]
    pub async fn for_project(
        &self,
        project_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Task>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tasks WHERE project_id = $1 ORDER BY id DESC LIMIT $2",
            TASK_COLUMNS
        ))
        .bind(project_id)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    /// Persist the scheduled execution time chosen by the scheduler bridge
    #[instrument(skip(self))]
    pub async fn set_schedule(
        &self,
        task_id: i64,
        scheduled_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE tasks SET scheduled_at = $2, updated_at = now() WHERE id = $1")
            .bind(task_id)
            .bind(scheduled_at)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }

    /// waiting -> done, compare-and-swap. Returns false when the task was
    /// no longer waiting (a duplicate invocation finished first).
    #[instrument(skip(self))]
    pub async fn mark_done_if_waiting(&self, task_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE tasks SET status = $2, updated_at = now() WHERE id = $1 AND status = $3",
        )
        .bind(task_id)
        .bind(TaskStatus::Done.to_string())
        .bind(TaskStatus::Waiting.to_string())
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// waiting -> failed with the captured error text, compare-and-swap
    #[instrument(skip(self, error))]
    pub async fn mark_failed_if_waiting(
        &self,
        task_id: i64,
        error: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET status = $2, last_error = $3, updated_at = now()
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(task_id)
        .bind(TaskStatus::Failed.to_string())
        .bind(error)
        .bind(TaskStatus::Waiting.to_string())
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// failed -> waiting for every failed task in the project, clearing the
    /// stored error. Tasks in other states are untouched.
    #[instrument(skip(self))]
    pub async fn requeue_failed(&self, project_id: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET status = $2, last_error = NULL, updated_at = now()
            WHERE project_id = $1 AND status = $3
            "#,
        )
        .bind(project_id)
        .bind(TaskStatus::Waiting.to_string())
        .bind(TaskStatus::Failed.to_string())
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Per-project task progress: (total, done, failed)
    #[instrument(skip(self))]
    pub async fn status_counts(&self, project_id: Uuid) -> Result<(i64, i64, i64), DatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'done') AS done,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM tasks
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_one(self.pool.pool())
        .await?;

        Ok((
            row.try_get("total")?,
            row.try_get("done")?,
            row.try_get("failed")?,
        ))
    }
}
