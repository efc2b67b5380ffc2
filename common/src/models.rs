use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Project Models
// ============================================================================

/// Project represents one source-file-driven publishing campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    /// Path to the delimited source file, as handed over by the upload collaborator
    pub source_path: String,
    pub title_template: String,
    pub content_template: String,
    pub thumbnail_ref: Option<String>,
    pub category_ref: Option<String>,
    pub tags: Vec<String>,
    /// Pacing gap between consecutive tasks, >= 1
    pub interval_minutes: i32,
    /// Whether the first row of the source is a header row
    pub has_header: bool,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

/// ProjectStatus tracks whether ingestion has reached end-of-input
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Waiting,
    Ready,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Waiting => write!(f, "waiting"),
            ProjectStatus::Ready => write!(f, "ready"),
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(ProjectStatus::Waiting),
            "ready" => Ok(ProjectStatus::Ready),
            _ => Err(format!("Invalid project status: {}", s)),
        }
    }
}

/// Input for registering a new project
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub source_path: String,
    #[serde(default)]
    pub title_template: String,
    #[serde(default)]
    pub content_template: String,
    #[serde(default)]
    pub thumbnail_ref: Option<String>,
    #[serde(default)]
    pub category_ref: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub interval_minutes: i32,
    #[serde(default = "default_has_header")]
    pub has_header: bool,
}

fn default_has_header() -> bool {
    true
}

/// Project listing entry with task progress counts
#[derive(Debug, Clone, Serialize)]
pub struct ProjectOverview {
    #[serde(flatten)]
    pub project: Project,
    pub total_tasks: i64,
    pub done_tasks: i64,
    pub failed_tasks: i64,
}

// ============================================================================
// Task Models
// ============================================================================

/// Task is one scheduled unit of work derived from a single source row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub project_id: Uuid,
    /// 0-based position over data rows of the source (header excluded)
    pub row_index: i64,
    pub data: TaskData,
    pub scheduled_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// TaskData is the snapshot captured at ingestion time.
///
/// It carries the row's field map plus copies of the owning project's
/// template, category, tag and thumbnail settings as they were at that
/// moment, so later project edits never alter pending tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskData {
    pub fields: HashMap<String, String>,
    pub title_template: String,
    pub content_template: String,
    #[serde(default)]
    pub category_ref: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub thumbnail_ref: Option<String>,
}

impl TaskData {
    /// Build the snapshot for one source row
    pub fn snapshot(fields: HashMap<String, String>, project: &Project) -> Self {
        Self {
            fields,
            title_template: project.title_template.clone(),
            content_template: project.content_template.clone(),
            category_ref: project.category_ref.clone(),
            tags: project.tags.clone(),
            thumbnail_ref: project.thumbnail_ref.clone(),
        }
    }
}

/// Fields for inserting a task row
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: Uuid,
    pub row_index: i64,
    pub data: TaskData,
    pub scheduled_at: DateTime<Utc>,
}

/// TaskStatus: waiting -> done or waiting -> failed, each exactly once.
/// done is terminal; failed is recoverable only via explicit requeue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Waiting,
    Done,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Waiting => write!(f, "waiting"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(TaskStatus::Waiting),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

// ============================================================================
// Log Models
// ============================================================================

/// LogEntry is one append-only operational event, correlated to project/task
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub project_id: Option<Uuid>,
    pub task_id: Option<i64>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "spring campaign".to_string(),
            source_path: "/data/spring.csv".to_string(),
            title_template: "{{name}} weekly".to_string(),
            content_template: "Hello {{name}}".to_string(),
            thumbnail_ref: Some("media-77".to_string()),
            category_ref: Some("news".to_string()),
            tags: vec!["spring".to_string()],
            interval_minutes: 5,
            has_header: true,
            status: ProjectStatus::Waiting,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_round_trip() {
        for s in [TaskStatus::Waiting, TaskStatus::Done, TaskStatus::Failed] {
            assert_eq!(s.to_string().parse::<TaskStatus>().unwrap(), s);
        }
        for s in [ProjectStatus::Waiting, ProjectStatus::Ready] {
            assert_eq!(s.to_string().parse::<ProjectStatus>().unwrap(), s);
        }
        assert!("running".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_snapshot_copies_project_fields() {
        let p = project();
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), "Alice".to_string());

        let data = TaskData::snapshot(fields, &p);
        assert_eq!(data.title_template, p.title_template);
        assert_eq!(data.tags, p.tags);
        assert_eq!(data.thumbnail_ref, p.thumbnail_ref);
        assert_eq!(data.fields.get("name").map(String::as_str), Some("Alice"));
    }

    #[test]
    fn test_task_data_json_round_trip() {
        let p = project();
        let data = TaskData::snapshot(HashMap::new(), &p);
        let json = serde_json::to_value(&data).unwrap();
        let back: TaskData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }
}
