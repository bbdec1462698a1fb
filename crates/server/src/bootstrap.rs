use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use vaxline_core::config::{AppConfig, ConfigError, LoadOptions};
use vaxline_core::conversation::ConversationService;
use vaxline_core::fulfillment::default_router;
use vaxline_core::ports::IntentResolver;
use vaxline_db::{
    connect_with_settings, migrations, DbPool, SqlKnowledgeRepository, SqlReminderRepository,
};
use vaxline_nlu::{DialogflowResolver, NluSetupError};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub conversation: Arc<ConversationService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("intent resolver setup failed: {0}")]
    Resolver(#[from] NluSetupError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

static SHARED: OnceCell<Arc<Application>> = OnceCell::const_new();

/// Process-wide application, built on first use and reused afterwards.
///
/// Concurrent first callers wait for a single initialization; a failed
/// attempt leaves the cell empty so a later call can retry.
pub async fn shared(options: LoadOptions) -> Result<Arc<Application>, BootstrapError> {
    SHARED
        .get_or_try_init(|| async move { bootstrap(options).await.map(Arc::new) })
        .await
        .cloned()
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let resolver = DialogflowResolver::from_config(&config.dialogflow)?;
    info!(
        event_name = "system.bootstrap.resolver_ready",
        correlation_id = "bootstrap",
        project_id = %config.dialogflow.project_id,
        language_code = %config.dialogflow.language_code,
        "dialogflow resolver configured"
    );

    assemble(config, Arc::new(resolver)).await
}

/// Connects the database, applies migrations and wires the conversation
/// service around `resolver`.
pub async fn assemble(
    config: AppConfig,
    resolver: Arc<dyn IntentResolver>,
) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let conversation = Arc::new(conversation_service(&config, resolver, db_pool.clone()));
    info!(
        event_name = "system.bootstrap.completed",
        correlation_id = "bootstrap",
        "application bootstrap completed"
    );

    Ok(Application { config, db_pool, conversation })
}

pub fn conversation_service(
    config: &AppConfig,
    resolver: Arc<dyn IntentResolver>,
    db_pool: DbPool,
) -> ConversationService {
    let knowledge = Arc::new(SqlKnowledgeRepository::new(db_pool.clone()));
    let reminders = Arc::new(SqlReminderRepository::new(db_pool));
    let router = default_router(knowledge, reminders)
        .with_store_timeout(Duration::from_secs(config.store.timeout_secs));

    ConversationService::new(resolver, router)
        .with_resolver_timeout(Duration::from_secs(config.dialogflow.timeout_secs))
}
