pub mod chains;
pub mod config;
pub mod dispatch;
pub mod doctor;
pub mod migrate;
pub mod seed;
pub mod sweep;

use chrono::Utc;
use hrflow_core::config::{AppConfig, LoadOptions};
use hrflow_core::errors::ApplicationError;
use hrflow_db::{connect_with_config, migrations, DbPool, ServiceError};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Error class, message and exit code of a failed command step.
pub(crate) type StepFailure = (&'static str, String, u8);

/// Maps a service failure through the interface error classes so the
/// operator sees the class, the user-facing guidance and a correlation id.
pub(crate) fn service_failure(
    command: &str,
    error: impl Into<ServiceError>,
) -> StepFailure {
    let correlation_id = format!("cli-{command}-{}", Utc::now().timestamp_millis());
    let interface = ApplicationError::from(error.into()).into_interface(correlation_id);
    (
        "service",
        format!(
            "{interface}; {} (correlation_id: {})",
            interface.user_message(),
            interface.correlation_id()
        ),
        7,
    )
}

/// Loads config and a current-thread runtime, then runs `body` against a
/// migrated pool. The pool is closed before the result is rendered.
pub(crate) fn with_database<T, F, Fut>(
    command: &str,
    body: F,
) -> Result<T, CommandResult>
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: std::future::Future<Output = Result<T, StepFailure>>,
{
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    runtime
        .block_on(async {
            let pool = connect_with_config(&config.database)
                .await
                .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), 5u8))?;

            let outcome = body(config, pool.clone()).await;
            pool.close().await;
            outcome
        })
        .map_err(|(error_class, message, exit_code)| {
            CommandResult::failure(command, error_class, message, exit_code)
        })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
