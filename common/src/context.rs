// Application context: every component constructed once at startup and
// passed by reference. There is no ambient global state; whatever a
// component needs arrives through here.

use crate::config::{Settings, SubstrateKind};
use crate::db::repositories::{LogRepository, ProjectRepository, TaskRepository};
use crate::db::{DbPool, RedisPool};
use crate::executor::TaskExecutor;
use crate::ingest::Ingestor;
use crate::ops::OpsService;
use crate::publisher::{HttpPublisher, Publisher};
use crate::scheduler::{build_queue, DelayQueue, SchedulerBridge};
use std::sync::Arc;
use tracing::info;

pub struct AppContext {
    pub settings: Settings,
    pub db: DbPool,
    pub projects: Arc<ProjectRepository>,
    pub tasks: Arc<TaskRepository>,
    pub logs: Arc<LogRepository>,
    pub queue: Arc<dyn DelayQueue>,
    pub bridge: Arc<SchedulerBridge>,
    pub publisher: Arc<dyn Publisher>,
    pub executor: Arc<TaskExecutor>,
    pub ingestor: Arc<Ingestor>,
    pub ops: Arc<OpsService>,
}

impl AppContext {
    pub async fn init(settings: Settings) -> anyhow::Result<Arc<Self>> {
        let db = DbPool::new(&settings.database).await?;

        let redis = match settings.scheduler.substrate {
            SubstrateKind::Durable => Some(RedisPool::new(&settings.redis).await?),
            SubstrateKind::Timer => None,
        };

        let projects = Arc::new(ProjectRepository::new(db.clone()));
        let tasks = Arc::new(TaskRepository::new(db.clone()));
        let logs = Arc::new(LogRepository::new(db.clone()));

        let queue = build_queue(&settings.scheduler, redis)?;
        let bridge = Arc::new(SchedulerBridge::new(Arc::clone(&queue), Arc::clone(&tasks)));

        let publisher: Arc<dyn Publisher> = Arc::new(HttpPublisher::new(&settings.publisher)?);

        let executor = Arc::new(TaskExecutor::new(
            Arc::clone(&tasks),
            Arc::clone(&projects),
            Arc::clone(&logs),
            Arc::clone(&publisher),
            &settings.publisher,
        ));

        let ingestor = Arc::new(Ingestor::new(
            Arc::clone(&projects),
            Arc::clone(&tasks),
            Arc::clone(&logs),
            Arc::clone(&bridge),
            settings.ingest.clone(),
        ));

        let ops = Arc::new(OpsService::new(
            Arc::clone(&projects),
            Arc::clone(&tasks),
            Arc::clone(&logs),
            Arc::clone(&bridge),
        ));

        info!(substrate = ?settings.scheduler.substrate, "Application context initialized");

        Ok(Arc::new(Self {
            settings,
            db,
            projects,
            tasks,
            logs,
            queue,
            bridge,
            publisher,
            executor,
            ingestor,
            ops,
        }))
    }
}
