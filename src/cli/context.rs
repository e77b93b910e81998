//! Shared wiring for CLI commands: configuration, pool, and services.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::sqlite::{
    initialize_database, PoolConfig, SqliteDefinitionRepository, SqliteDelegationRepository,
    SqliteDirectory, SqliteHistoryRepository, SqliteInstanceRepository, SqliteTaskRepository,
};
use crate::adapters::LogNotifier;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{
    ApproverResolver, DelegationService, EscalationService, ReportingService, TaskQueueService,
    WorkflowOrchestrator,
};

/// Everything a command handler needs, built once per invocation.
pub struct AppContext {
    pub config: Config,
    pub directory: Arc<SqliteDirectory>,
    pub definitions: Arc<SqliteDefinitionRepository>,
    pub instances: Arc<SqliteInstanceRepository>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub task_queue: TaskQueueService,
    pub escalation: EscalationService,
    pub delegation: DelegationService,
    pub reporting: ReportingService,
}

impl AppContext {
    /// Load configuration, open the database, and wire the service graph.
    pub async fn init() -> Result<Self> {
        let config = ConfigLoader::load().context("Failed to load configuration")?;
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Result<Self> {
        let database_url = format!("sqlite:{}", config.database.path);
        let pool_config = PoolConfig { max_connections: config.database.max_connections, ..PoolConfig::default() };
        let pool = initialize_database(&database_url, Some(pool_config))
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        let directory = Arc::new(SqliteDirectory::new(pool.clone()));
        let definitions = Arc::new(SqliteDefinitionRepository::new(pool.clone()));
        let instances = Arc::new(SqliteInstanceRepository::new(pool.clone()));
        let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let delegations = Arc::new(SqliteDelegationRepository::new(pool.clone()));
        let history = Arc::new(SqliteHistoryRepository::new(pool));
        let notifier = Arc::new(LogNotifier::new());

        let resolver = ApproverResolver::new(directory.clone(), delegations.clone());
        let orchestrator = Arc::new(
            WorkflowOrchestrator::new(
                definitions.clone(),
                instances.clone(),
                tasks.clone(),
                directory.clone(),
                resolver,
                notifier.clone(),
            )
            .with_default_escalation_hours(config.engine.default_escalation_hours),
        );
        let task_queue = TaskQueueService::new(tasks.clone(), directory.clone());
        let escalation = EscalationService::new(
            tasks.clone(),
            instances.clone(),
            ApproverResolver::new(directory.clone(), delegations.clone()),
            notifier,
            orchestrator.clone(),
            config.engine.sweep_batch_size,
        );
        let delegation = DelegationService::new(delegations, directory.clone());
        let reporting = ReportingService::new(instances.clone(), tasks, history);

        Ok(Self {
            config,
            directory,
            definitions,
            instances,
            orchestrator,
            task_queue,
            escalation,
            delegation,
            reporting,
        })
    }
}
