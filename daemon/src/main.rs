// dripfeed daemon entry point: one process running the dispatcher, the
// reconciler, ingestion continuations, and the HTTP control surface.

mod handlers;
mod routes;

use common::config::Settings;
use common::context::AppContext;
use common::scheduler::{Dispatcher, Reconciler};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    common::telemetry::init_logging(&settings.observability.log_level)?;
    info!("Starting dripfeed daemon");

    let ctx = AppContext::init(settings).await?;

    sqlx::migrate!("./migrations").run(ctx.db.pool()).await?;
    info!("Migrations applied");

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Dispatcher: due task ids -> executor
    let dispatcher = Dispatcher::new(
        Arc::clone(&ctx.queue),
        Arc::clone(&ctx.executor),
        Duration::from_secs(ctx.settings.scheduler.dispatch_interval_seconds),
        ctx.settings.scheduler.dispatch_batch,
    );
    let dispatcher_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move { dispatcher.run(dispatcher_shutdown).await });

    // Reconciler: heals lost schedules
    let reconciler = Reconciler::new(
        Arc::clone(&ctx.tasks),
        Arc::clone(&ctx.bridge),
        Duration::from_secs(ctx.settings.scheduler.reconcile_interval_seconds),
        ctx.settings.scheduler.reconcile_batch,
        ctx.settings.scheduler.resubmit_grace_seconds,
    );
    let reconciler_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move { reconciler.run(reconciler_shutdown).await });

    // Resume ingestion for projects interrupted by the last shutdown
    for (project_id, offset) in ctx.ingestor.resume_offsets().await? {
        info!(%project_id, offset, "Resuming ingestion");
        let ingestor = Arc::clone(&ctx.ingestor);
        tokio::spawn(async move { ingestor.run_to_completion(project_id, offset).await });
    }

    // Ctrl+C triggers a coordinated shutdown
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, initiating graceful shutdown");
        let _ = signal_tx.send(());
    });

    // HTTP control surface
    let addr = format!(
        "{}:{}",
        ctx.settings.server.host, ctx.settings.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Control surface listening");

    let app = routes::create_router(Arc::clone(&ctx));
    let mut server_shutdown = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.recv().await;
        })
        .await?;

    ctx.db.close().await;
    info!("dripfeed daemon stopped");
    Ok(())
}
