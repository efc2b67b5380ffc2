use axum::{
    routing::{get, post},
    Router,
};
use common::context::AppContext;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Router for the manual control surface. Callers are trusted at this
/// boundary; authentication belongs to the layer in front of it.
pub fn create_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/projects",
            post(handlers::create_project).get(handlers::list_projects),
        )
        .route("/projects/:id/tasks", get(handlers::project_tasks))
        .route("/projects/:id/logs", get(handlers::project_logs))
        .route("/projects/:id/requeue", post(handlers::requeue_failed))
        .route("/projects/:id/force-run", post(handlers::force_run))
        .route("/logs", get(handlers::recent_logs))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(ctx)
}
