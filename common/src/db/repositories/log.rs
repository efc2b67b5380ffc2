// Log repository: the append-only operational event sink.
// Entries are never updated or deleted.

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::LogEntry;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

pub struct LogRepository {
    pool: DbPool,
}

impl LogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<LogEntry, DatabaseError> {
        Ok(LogEntry {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            task_id: row.try_get("task_id")?,
            message: row.try_get("message")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Append one event, correlated to a project and/or task
    #[instrument(skip(self, message))]
    pub async fn append(
        &self,
        project_id: Option<Uuid>,
        task_id: Option<i64>,
        message: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO logs (project_id, task_id, message, created_at) VALUES ($1, $2, $3, now())",
        )
        .bind(project_id)
        .bind(task_id)
        .bind(message)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    /// Most recent entries across all projects
    #[instrument(skip(self))]
    pub async fn recent(&self, limit: i64) -> Result<Vec<LogEntry>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT id, project_id, task_id, message, created_at FROM logs ORDER BY id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    /// Most recent entries for one project
    #[instrument(skip(self))]
    pub async fn for_project(
        &self,
        project_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LogEntry>, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, task_id, message, created_at
            FROM logs
            WHERE project_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(project_id)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}
