// Error handling framework

use thiserror::Error;

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Scheduling substrate errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Failed to connect to scheduling substrate: {0}")]
    Connection(String),

    #[error("Failed to register delayed execution: {0}")]
    SubmitFailed(String),

    #[error("Failed to cancel delayed execution: {0}")]
    CancelFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Project not found: {0}")]
    ProjectNotFound(uuid::Uuid),

    #[error("Source file unreadable: {path}: {reason}")]
    SourceUnreadable { path: String, reason: String },

    #[error("Failed to parse source row: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Scheduling error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Publisher errors
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Publisher request failed: {0}")]
    Request(String),

    #[error("Publisher rejected content (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid publisher response: {0}")]
    InvalidResponse(String),
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },
}

/// Errors surfaced by the manual control surface
#[derive(Error, Debug)]
pub enum OpsError {
    #[error("Project not found: {0}")]
    ProjectNotFound(uuid::Uuid),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new("VALIDATION_ERROR", err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::new("STORAGE_ERROR", err.to_string())
    }
}

impl From<OpsError> for ApiError {
    fn from(err: OpsError) -> Self {
        match err {
            OpsError::ProjectNotFound(_) => ApiError::new("NOT_FOUND", err.to_string()),
            OpsError::Validation(e) => e.into(),
            OpsError::Database(e) => e.into(),
            OpsError::Schedule(e) => ApiError::new("SCHEDULE_ERROR", e.to_string()),
        }
    }
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        "23503" => DatabaseError::ForeignKeyViolation(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for ScheduleError {
    fn from(err: redis::RedisError) -> Self {
        ScheduleError::Connection(err.to_string())
    }
}
