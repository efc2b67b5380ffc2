// Manual control surface: project registration, failed-task requeue,
// force-run, and the read-only listings consumed by an external UI or
// automation layer. Callers at this boundary are trusted.

use crate::db::repositories::{LogRepository, ProjectRepository, TaskRepository};
use crate::errors::{OpsError, ValidationError};
use crate::ingest::pacing_step;
use crate::models::{LogEntry, NewProject, Project, ProjectOverview, ProjectStatus, Task};
use crate::scheduler::SchedulerBridge;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct OpsService {
    projects: Arc<ProjectRepository>,
    tasks: Arc<TaskRepository>,
    logs: Arc<LogRepository>,
    bridge: Arc<SchedulerBridge>,
}

impl OpsService {
    pub fn new(
        projects: Arc<ProjectRepository>,
        tasks: Arc<TaskRepository>,
        logs: Arc<LogRepository>,
        bridge: Arc<SchedulerBridge>,
    ) -> Self {
        Self {
            projects,
            tasks,
            logs,
            bridge,
        }
    }

    /// Validate and persist a new project. The source file is expected to
    /// already sit at `source_path`, placed there by the upload collaborator.
    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn register_project(&self, new: NewProject) -> Result<Project, OpsError> {
        validate_new_project(&new)?;

        let project = Project {
            id: Uuid::new_v4(),
            name: new.name,
            source_path: new.source_path,
            title_template: new.title_template,
            content_template: new.content_template,
            thumbnail_ref: new.thumbnail_ref,
            category_ref: new.category_ref,
            tags: new.tags,
            interval_minutes: new.interval_minutes,
            has_header: new.has_header,
            status: ProjectStatus::Waiting,
            created_at: Utc::now(),
        };

        self.projects.create(&project).await?;
        self.logs
            .append(
                Some(project.id),
                None,
                &format!("Project '{}' registered, ingestion starting", project.name),
            )
            .await?;

        Ok(project)
    }

    /// Set every failed task of the project back to waiting and clear its
    /// stored error. Tasks in other states and other projects are untouched;
    /// the reconciler picks the requeued tasks up within one sweep.
    #[instrument(skip(self))]
    pub async fn requeue_failed(&self, project_id: Uuid) -> Result<u64, OpsError> {
        if self.projects.find_by_id(project_id).await?.is_none() {
            return Err(OpsError::ProjectNotFound(project_id));
        }

        let requeued = self.tasks.requeue_failed(project_id).await?;
        self.logs
            .append(
                Some(project_id),
                None,
                &format!("Requeued {} failed tasks", requeued),
            )
            .await?;

        info!(project_id = %project_id, requeued, "Failed tasks requeued");
        Ok(requeued)
    }

    /// Drain the project's backlog now: every waiting task, in ascending id
    /// order, is reassigned scheduled_at = now, now + interval, now + 2 *
    /// interval, ... regardless of prior values, and re-submitted.
    #[instrument(skip(self))]
    pub async fn force_run(&self, project_id: Uuid) -> Result<usize, OpsError> {
        let Some(project) = self.projects.find_by_id(project_id).await? else {
            return Err(OpsError::ProjectNotFound(project_id));
        };

        let waiting = self.tasks.waiting_in_project(project_id).await?;
        let now = Utc::now();
        let step = pacing_step(project.interval_minutes);

        for (i, task) in waiting.iter().enumerate() {
            let execute_at = now + step * i as i32;
            self.bridge.schedule(task.id, execute_at).await?;
        }

        self.logs
            .append(
                Some(project_id),
                None,
                &format!("Force run rescheduled {} waiting tasks", waiting.len()),
            )
            .await?;

        info!(project_id = %project_id, count = waiting.len(), "Force run issued");
        Ok(waiting.len())
    }

    /// All projects with task progress counts, newest first
    pub async fn list_projects(&self) -> Result<Vec<ProjectOverview>, OpsError> {
        let mut overviews = Vec::new();
        for project in self.projects.list().await? {
            let (total, done, failed) = self.tasks.status_counts(project.id).await?;
            overviews.push(ProjectOverview {
                project,
                total_tasks: total,
                done_tasks: done,
                failed_tasks: failed,
            });
        }
        Ok(overviews)
    }

    pub async fn project_tasks(&self, project_id: Uuid, limit: i64) -> Result<Vec<Task>, OpsError> {
        if self.projects.find_by_id(project_id).await?.is_none() {
            return Err(OpsError::ProjectNotFound(project_id));
        }
        Ok(self.tasks.for_project(project_id, limit).await?)
    }

    pub async fn project_logs(
        &self,
        project_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LogEntry>, OpsError> {
        Ok(self.logs.for_project(project_id, limit).await?)
    }

    pub async fn recent_logs(&self, limit: i64) -> Result<Vec<LogEntry>, OpsError> {
        Ok(self.logs.recent(limit).await?)
    }
}

fn validate_new_project(new: &NewProject) -> Result<(), ValidationError> {
    if new.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name".to_string()));
    }
    if new.source_path.trim().is_empty() {
        return Err(ValidationError::MissingField("source_path".to_string()));
    }
    if new.interval_minutes < 1 {
        return Err(ValidationError::InvalidFieldValue {
            field: "interval_minutes".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_project(interval: i32) -> NewProject {
        NewProject {
            name: "campaign".to_string(),
            source_path: "/data/feed.csv".to_string(),
            title_template: String::new(),
            content_template: String::new(),
            thumbnail_ref: None,
            category_ref: None,
            tags: vec![],
            interval_minutes: interval,
            has_header: true,
        }
    }

    #[test]
    fn test_validate_accepts_minimal_project() {
        assert!(validate_new_project(&new_project(1)).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_interval() {
        assert!(validate_new_project(&new_project(0)).is_err());
        assert!(validate_new_project(&new_project(-5)).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let mut p = new_project(5);
        p.name = "  ".to_string();
        assert!(validate_new_project(&p).is_err());
    }
}
