use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use common::context::AppContext;
use common::errors::{ApiError, OpsError};
use common::models::{LogEntry, NewProject, Project, ProjectOverview, Task};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn error_response(err: OpsError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        OpsError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
        OpsError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiError::from(err)))
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct RequeueResponse {
    pub requeued: u64,
}

#[derive(Debug, Serialize)]
pub struct ForceRunResponse {
    pub rescheduled: usize,
}

pub async fn health(State(ctx): State<Arc<AppContext>>) -> ApiResult<serde_json::Value> {
    ctx.db
        .health_check()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError::from(e))))?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// Register a project and kick off its ingestion. The source file is
/// expected to already be on disk, placed there by the upload collaborator.
#[tracing::instrument(skip(ctx, req))]
pub async fn create_project(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<NewProject>,
) -> ApiResult<Project> {
    let project = ctx.ops.register_project(req).await.map_err(error_response)?;

    let ingestor = Arc::clone(&ctx.ingestor);
    let project_id = project.id;
    tokio::spawn(async move { ingestor.run_to_completion(project_id, 0).await });

    Ok(Json(project))
}

pub async fn list_projects(
    State(ctx): State<Arc<AppContext>>,
) -> ApiResult<Vec<ProjectOverview>> {
    let projects = ctx.ops.list_projects().await.map_err(error_response)?;
    Ok(Json(projects))
}

pub async fn project_tasks(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<Task>> {
    let tasks = ctx
        .ops
        .project_tasks(id, params.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(tasks))
}

pub async fn project_logs(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<LogEntry>> {
    let logs = ctx
        .ops
        .project_logs(id, params.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(logs))
}

pub async fn recent_logs(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<LogEntry>> {
    let logs = ctx
        .ops
        .recent_logs(params.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(logs))
}

#[tracing::instrument(skip(ctx))]
pub async fn requeue_failed(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<RequeueResponse> {
    let requeued = ctx.ops.requeue_failed(id).await.map_err(error_response)?;
    Ok(Json(RequeueResponse { requeued }))
}

#[tracing::instrument(skip(ctx))]
pub async fn force_run(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<ForceRunResponse> {
    let rescheduled = ctx.ops.force_run(id).await.map_err(error_response)?;
    Ok(Json(ForceRunResponse { rescheduled }))
}
