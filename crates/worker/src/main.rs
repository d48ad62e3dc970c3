mod bootstrap;
mod scheduler;

use anyhow::Result;
use hrflow_core::config::{AppConfig, LoadOptions};

use crate::bootstrap::BootstrapError;
use crate::scheduler::Scheduler;

fn init_logging(config: &AppConfig) {
    use hrflow_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default()).map_err(BootstrapError::from)?;
    init_logging(&config);

    let app = bootstrap::bootstrap(config).await?;
    let scheduler = Scheduler::new(&app);

    scheduler.run_until(wait_for_shutdown()).await;

    tracing::info!(
        event_name = "system.worker.stopping",
        correlation_id = "shutdown",
        "hrflow-worker stopping"
    );
    app.db_pool.close().await;
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(
            event_name = "system.worker.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for ctrl-c; shutting down"
        );
    }
}
