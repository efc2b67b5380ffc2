// Project repository

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Project, ProjectStatus};
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

const PROJECT_COLUMNS: &str = "id, name, source_path, title_template, content_template, \
     thumbnail_ref, category_ref, tags, interval_minutes, has_header, status, created_at";

/// Repository for project-related database operations
pub struct ProjectRepository {
    pool: DbPool,
}

impl ProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<Project, DatabaseError> {
        let tags_json: serde_json::Value = row.try_get("tags")?;
        let tags: Vec<String> = serde_json::from_value(tags_json)
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to parse tags: {}", e)))?;
        let status: ProjectStatus = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(DatabaseError::QueryFailed)?;

        Ok(Project {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            source_path: row.try_get("source_path")?,
            title_template: row.try_get("title_template")?,
            content_template: row.try_get("content_template")?,
            thumbnail_ref: row.try_get("thumbnail_ref")?,
            category_ref: row.try_get("category_ref")?,
            tags,
            interval_minutes: row.try_get("interval_minutes")?,
            has_header: row.try_get("has_header")?,
            status,
            created_at: row.try_get("created_at")?,
        })
    }

    #[instrument(skip(self, project), fields(project_id = %project.id, name = %project.name))]
    pub async fn create(&self, project: &Project) -> Result<(), DatabaseError> {
        let tags_json = serde_json::to_value(&project.tags)
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to serialize tags: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO projects (
                id, name, source_path, title_template, content_template,
                thumbnail_ref, category_ref, tags, interval_minutes,
                has_header, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.source_path)
        .bind(&project.title_template)
        .bind(&project.content_template)
        .bind(&project.thumbnail_ref)
        .bind(&project.category_ref)
        .bind(tags_json)
        .bind(project.interval_minutes)
        .bind(project.has_header)
        .bind(project.status.to_string())
        .bind(project.created_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(project_id = %project.id, "Project created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, DatabaseError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM projects WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, id: Uuid, status: ProjectStatus) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE projects SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }

    /// All projects, newest first
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Project>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM projects ORDER BY created_at DESC",
            PROJECT_COLUMNS
        ))
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    /// Projects whose ingestion has not reached end-of-input
    #[instrument(skip(self))]
    pub async fn waiting(&self) -> Result<Vec<Project>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM projects WHERE status = $1 ORDER BY created_at",
            PROJECT_COLUMNS
        ))
        .bind(ProjectStatus::Waiting.to_string())
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}
