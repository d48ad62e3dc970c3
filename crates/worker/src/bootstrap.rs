use std::sync::Arc;

use hrflow_core::config::{AppConfig, ConfigError};
use hrflow_core::workflow::{ApprovalChainCatalog, ApprovalError};
use hrflow_db::repositories::{CatalogLoadError, SqlApprovalChainRepository};
use hrflow_db::{connect_with_config, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub catalog: Arc<ApprovalChainCatalog>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("approval chains could not be loaded: {0}")]
    Catalog(#[source] CatalogLoadError),
    #[error("approval chain coverage check failed: {0}")]
    Coverage(#[source] ApprovalError),
}

/// Connects, migrates and loads the chain catalog. Refuses to start when a
/// required request type has no chain row.
pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting worker bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let catalog = SqlApprovalChainRepository::new(db_pool.clone())
        .load_catalog()
        .await
        .map_err(BootstrapError::Catalog)?;
    catalog
        .ensure_covers(&config.workflow.required_request_types)
        .map_err(BootstrapError::Coverage)?;
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        request_types = catalog.request_types().count(),
        "approval chain catalog loaded"
    );

    Ok(Application { config, db_pool, catalog: Arc::new(catalog) })
}
