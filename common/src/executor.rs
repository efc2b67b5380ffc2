// Task executor: runs one task end to end.
//
// Rendering is driven entirely by the task's data snapshot; the live project
// row is only an existence check, so project edits made after ingestion never
// leak into pending tasks.

use crate::config::PublisherConfig;
use crate::db::repositories::{LogRepository, ProjectRepository, TaskRepository};
use crate::errors::DatabaseError;
use crate::models::{Task, TaskStatus};
use crate::publisher::{ContentId, NewContent, Publisher};
use crate::render::{self, ValueMode};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Render a task's snapshot into sink-ready content
pub fn render_content(task: &Task, publish_status: &str, author: &str) -> NewContent {
    let data = &task.data;

    let raw_title = render::render(&data.title_template, &data.fields, ValueMode::StripMarkup);
    // Templates may carry markup of their own; titles are plain text
    let mut title = render::strip_markup(&raw_title).trim().to_string();
    if title.is_empty() {
        title = format!("Post #{}", task.id);
    }

    let content = render::render(&data.content_template, &data.fields, ValueMode::EscapeMarkup);

    NewContent {
        title,
        content,
        status: publish_status.to_string(),
        author: author.to_string(),
        categories: data.category_ref.iter().cloned().collect(),
    }
}

pub struct TaskExecutor {
    tasks: Arc<TaskRepository>,
    projects: Arc<ProjectRepository>,
    logs: Arc<LogRepository>,
    publisher: Arc<dyn Publisher>,
    publish_status: String,
    author: String,
}

impl TaskExecutor {
    pub fn new(
        tasks: Arc<TaskRepository>,
        projects: Arc<ProjectRepository>,
        logs: Arc<LogRepository>,
        publisher: Arc<dyn Publisher>,
        config: &PublisherConfig,
    ) -> Self {
        Self {
            tasks,
            projects,
            logs,
            publisher,
            publish_status: config.publish_status.clone(),
            author: config.default_author.clone(),
        }
    }

    /// Execute one task. Silently a no-op when the task or its project is
    /// missing, or when the task is already done. Delivery is at-least-once:
    /// the terminal transition is a compare-and-swap, so a concurrent
    /// duplicate changes no state.
    #[instrument(skip(self))]
    pub async fn execute(&self, task_id: i64) -> Result<(), DatabaseError> {
        let Some(task) = self.tasks.find_by_id(task_id).await? else {
            debug!(task_id, "Task missing, nothing to execute");
            return Ok(());
        };
        if self.projects.find_by_id(task.project_id).await?.is_none() {
            debug!(task_id, "Owning project missing, nothing to execute");
            return Ok(());
        }
        if task.status == TaskStatus::Done {
            debug!(task_id, "Task already done, skipping");
            return Ok(());
        }

        let content = render_content(&task, &self.publish_status, &self.author);

        let created = match self.publisher.create(&content).await {
            Ok(id) => id,
            Err(e) => {
                let message = e.to_string();
                if self.tasks.mark_failed_if_waiting(task.id, &message).await? {
                    warn!(task_id, error = %message, "Publish failed");
                    self.logs
                        .append(
                            Some(task.project_id),
                            Some(task.id),
                            &format!("Publish failed: {}", message),
                        )
                        .await?;
                }
                return Ok(());
            }
        };

        self.apply_extras(&task, &created).await?;

        if self.tasks.mark_done_if_waiting(task.id).await? {
            self.logs
                .append(
                    Some(task.project_id),
                    Some(task.id),
                    &format!("Published content {} ({})", created, content.title),
                )
                .await?;
            info!(task_id, content_id = %created, "Task completed");
        } else {
            debug!(task_id, "Terminal transition lost to a concurrent invocation");
        }

        Ok(())
    }

    /// Tags and thumbnail are applied after creation. The content already
    /// exists at the sink, so a failure here is logged but does not fail the
    /// task: re-running it would publish a duplicate.
    async fn apply_extras(&self, task: &Task, content_id: &ContentId) -> Result<(), DatabaseError> {
        if !task.data.tags.is_empty() {
            if let Err(e) = self.publisher.set_tags(content_id, &task.data.tags).await {
                warn!(task_id = task.id, error = %e, "Tag application failed");
                self.logs
                    .append(
                        Some(task.project_id),
                        Some(task.id),
                        &format!("Tag application failed for content {}: {}", content_id, e),
                    )
                    .await?;
            }
        }

        if let Some(media_ref) = &task.data.thumbnail_ref {
            if let Err(e) = self.publisher.set_thumbnail(content_id, media_ref).await {
                warn!(task_id = task.id, error = %e, "Thumbnail application failed");
                self.logs
                    .append(
                        Some(task.project_id),
                        Some(task.id),
                        &format!("Thumbnail application failed for content {}: {}", content_id, e),
                    )
                    .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskData;
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn task(data: TaskData) -> Task {
        Task {
            id: 17,
            project_id: Uuid::new_v4(),
            row_index: 0,
            data,
            scheduled_at: Utc::now(),
            status: TaskStatus::Waiting,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_content_from_snapshot() {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), "Alice".to_string());
        fields.insert("topic".to_string(), "Go".to_string());

        let data = TaskData {
            fields,
            title_template: "{{name}} on {{topic}}".to_string(),
            content_template: "Hello {{name}}".to_string(),
            category_ref: Some("news".to_string()),
            tags: vec![],
            thumbnail_ref: None,
        };

        let content = render_content(&task(data), "publish", "dripfeed");
        assert_eq!(content.title, "Alice on Go");
        assert_eq!(content.content, "Hello Alice");
        assert_eq!(content.categories, vec!["news".to_string()]);
        assert_eq!(content.status, "publish");
    }

    #[test]
    fn test_empty_title_gets_placeholder_with_task_id() {
        let data = TaskData {
            title_template: "{{missing}}".to_string(),
            content_template: "body".to_string(),
            ..Default::default()
        };

        let content = render_content(&task(data), "publish", "dripfeed");
        assert_eq!(content.title, "Post #17");
    }

    #[test]
    fn test_title_markup_is_stripped() {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), "<em>Alice</em>".to_string());

        let data = TaskData {
            fields,
            title_template: "<h1>{{name}}</h1>".to_string(),
            content_template: String::new(),
            ..Default::default()
        };

        let content = render_content(&task(data), "publish", "dripfeed");
        assert_eq!(content.title, "Alice");
    }

    #[test]
    fn test_no_category_means_empty_categories() {
        let data = TaskData {
            title_template: "t".to_string(),
            ..Default::default()
        };
        let content = render_content(&task(data), "draft", "ops");
        assert!(content.categories.is_empty());
    }
}
