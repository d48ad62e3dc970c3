use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request_type::RequestType;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub workflow: WorkflowConfig,
    pub outbox: OutboxConfig,
    pub alerts: AlertsConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    /// Pending requests untouched for this long are approved by the sweep.
    pub auto_approval_after_hours: u64,
    pub sweep_interval_secs: u64,
    pub system_actor_id: String,
    pub admin_role: String,
    /// Request types whose pending level an admin may sign off on behalf of
    /// the assigned approver. Empty disables the override entirely.
    pub admin_bypass_request_types: Vec<RequestType>,
    /// Startup fails unless every listed type has a registered chain.
    pub required_request_types: Vec<RequestType>,
}

#[derive(Clone, Debug)]
pub struct OutboxConfig {
    pub poll_interval_secs: u64,
    pub batch_size: u32,
    pub max_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct AlertsConfig {
    pub overtime_thresholds_hours: Vec<u32>,
    pub standard_daily_hours: u32,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub auto_approval_after_hours: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://hrflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            workflow: WorkflowConfig {
                auto_approval_after_hours: 48,
                sweep_interval_secs: 300,
                system_actor_id: "SYSTEM".to_string(),
                admin_role: "ADMIN".to_string(),
                admin_bypass_request_types: Vec::new(),
                required_request_types: RequestType::ALL.to_vec(),
            },
            outbox: OutboxConfig { poll_interval_secs: 5, batch_size: 50, max_attempts: 5 },
            alerts: AlertsConfig {
                overtime_thresholds_hours: vec![20, 40],
                standard_daily_hours: 8,
                sweep_interval_secs: 3600,
            },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl WorkflowConfig {
    pub fn admin_bypass_allowed(&self, request_type: RequestType) -> bool {
        self.admin_bypass_request_types.contains(&request_type)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("hrflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(hours) = workflow.auto_approval_after_hours {
                self.workflow.auto_approval_after_hours = hours;
            }
            if let Some(interval) = workflow.sweep_interval_secs {
                self.workflow.sweep_interval_secs = interval;
            }
            if let Some(actor) = workflow.system_actor_id {
                self.workflow.system_actor_id = actor;
            }
            if let Some(role) = workflow.admin_role {
                self.workflow.admin_role = role;
            }
            if let Some(types) = workflow.admin_bypass_request_types {
                self.workflow.admin_bypass_request_types = types;
            }
            if let Some(types) = workflow.required_request_types {
                self.workflow.required_request_types = types;
            }
        }

        if let Some(outbox) = patch.outbox {
            if let Some(interval) = outbox.poll_interval_secs {
                self.outbox.poll_interval_secs = interval;
            }
            if let Some(batch_size) = outbox.batch_size {
                self.outbox.batch_size = batch_size;
            }
            if let Some(max_attempts) = outbox.max_attempts {
                self.outbox.max_attempts = max_attempts;
            }
        }

        if let Some(alerts) = patch.alerts {
            if let Some(thresholds) = alerts.overtime_thresholds_hours {
                self.alerts.overtime_thresholds_hours = thresholds;
            }
            if let Some(hours) = alerts.standard_daily_hours {
                self.alerts.standard_daily_hours = hours;
            }
            if let Some(interval) = alerts.sweep_interval_secs {
                self.alerts.sweep_interval_secs = interval;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HRFLOW_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("HRFLOW_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("HRFLOW_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("HRFLOW_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("HRFLOW_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("HRFLOW_LOGGING_LEVEL").or_else(|| read_env("HRFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HRFLOW_LOGGING_FORMAT").or_else(|| read_env("HRFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("HRFLOW_WORKFLOW_AUTO_APPROVAL_AFTER_HOURS") {
            self.workflow.auto_approval_after_hours =
                parse_u64("HRFLOW_WORKFLOW_AUTO_APPROVAL_AFTER_HOURS", &value)?;
        }
        if let Some(value) = read_env("HRFLOW_WORKFLOW_SWEEP_INTERVAL_SECS") {
            self.workflow.sweep_interval_secs =
                parse_u64("HRFLOW_WORKFLOW_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("HRFLOW_WORKFLOW_SYSTEM_ACTOR_ID") {
            self.workflow.system_actor_id = value;
        }
        if let Some(value) = read_env("HRFLOW_WORKFLOW_ADMIN_ROLE") {
            self.workflow.admin_role = value;
        }
        if let Some(value) = read_env("HRFLOW_WORKFLOW_ADMIN_BYPASS_REQUEST_TYPES") {
            self.workflow.admin_bypass_request_types =
                parse_request_types("HRFLOW_WORKFLOW_ADMIN_BYPASS_REQUEST_TYPES", &value)?;
        }
        if let Some(value) = read_env("HRFLOW_WORKFLOW_REQUIRED_REQUEST_TYPES") {
            self.workflow.required_request_types =
                parse_request_types("HRFLOW_WORKFLOW_REQUIRED_REQUEST_TYPES", &value)?;
        }

        if let Some(value) = read_env("HRFLOW_OUTBOX_POLL_INTERVAL_SECS") {
            self.outbox.poll_interval_secs = parse_u64("HRFLOW_OUTBOX_POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("HRFLOW_OUTBOX_BATCH_SIZE") {
            self.outbox.batch_size = parse_u32("HRFLOW_OUTBOX_BATCH_SIZE", &value)?;
        }
        if let Some(value) = read_env("HRFLOW_OUTBOX_MAX_ATTEMPTS") {
            self.outbox.max_attempts = parse_u32("HRFLOW_OUTBOX_MAX_ATTEMPTS", &value)?;
        }

        if let Some(value) = read_env("HRFLOW_ALERTS_OVERTIME_THRESHOLDS_HOURS") {
            self.alerts.overtime_thresholds_hours = value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| parse_u32("HRFLOW_ALERTS_OVERTIME_THRESHOLDS_HOURS", item))
                .collect::<Result<_, _>>()?;
        }
        if let Some(value) = read_env("HRFLOW_ALERTS_STANDARD_DAILY_HOURS") {
            self.alerts.standard_daily_hours =
                parse_u32("HRFLOW_ALERTS_STANDARD_DAILY_HOURS", &value)?;
        }
        if let Some(value) = read_env("HRFLOW_ALERTS_SWEEP_INTERVAL_SECS") {
            self.alerts.sweep_interval_secs =
                parse_u64("HRFLOW_ALERTS_SWEEP_INTERVAL_SECS", &value)?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(hours) = overrides.auto_approval_after_hours {
            self.workflow.auto_approval_after_hours = hours;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_logging(&self.logging)?;
        validate_workflow(&self.workflow)?;
        validate_outbox(&self.outbox)?;
        validate_alerts(&self.alerts)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("hrflow.toml"), PathBuf::from("config/hrflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if workflow.auto_approval_after_hours == 0 {
        return Err(ConfigError::Validation(
            "workflow.auto_approval_after_hours must be greater than zero".to_string(),
        ));
    }
    if workflow.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "workflow.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    if workflow.system_actor_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "workflow.system_actor_id must not be empty".to_string(),
        ));
    }
    if workflow.admin_role.trim().is_empty() {
        return Err(ConfigError::Validation("workflow.admin_role must not be empty".to_string()));
    }
    Ok(())
}

fn validate_outbox(outbox: &OutboxConfig) -> Result<(), ConfigError> {
    if outbox.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "outbox.poll_interval_secs must be greater than zero".to_string(),
        ));
    }
    if outbox.batch_size == 0 {
        return Err(ConfigError::Validation(
            "outbox.batch_size must be greater than zero".to_string(),
        ));
    }
    if outbox.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "outbox.max_attempts must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_alerts(alerts: &AlertsConfig) -> Result<(), ConfigError> {
    if alerts.overtime_thresholds_hours.iter().any(|threshold| *threshold == 0) {
        return Err(ConfigError::Validation(
            "alerts.overtime_thresholds_hours must not contain zero".to_string(),
        ));
    }
    if alerts.standard_daily_hours == 0 || alerts.standard_daily_hours > 24 {
        return Err(ConfigError::Validation(
            "alerts.standard_daily_hours must be in range 1..=24".to_string(),
        ));
    }
    if alerts.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "alerts.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Comma-separated storage codes, e.g. `VAC,LOAN`.
fn parse_request_types(key: &str, value: &str) -> Result<Vec<RequestType>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            RequestType::parse(item).ok_or_else(|| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: item.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    workflow: Option<WorkflowPatch>,
    outbox: Option<OutboxPatch>,
    alerts: Option<AlertsPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    auto_approval_after_hours: Option<u64>,
    sweep_interval_secs: Option<u64>,
    system_actor_id: Option<String>,
    admin_role: Option<String>,
    admin_bypass_request_types: Option<Vec<RequestType>>,
    required_request_types: Option<Vec<RequestType>>,
}

#[derive(Debug, Default, Deserialize)]
struct OutboxPatch {
    poll_interval_secs: Option<u64>,
    batch_size: Option<u32>,
    max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AlertsPatch {
    overtime_thresholds_hours: Option<Vec<u32>>,
    standard_daily_hours: Option<u32>,
    sweep_interval_secs: Option<u64>,
}
