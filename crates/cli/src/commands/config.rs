use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hrflow_core::config::{AppConfig, LoadOptions};
use hrflow_core::domain::request_type::RequestType;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let env_key = env_key_for(key_path);
        let source = field_source(
            key_path,
            &env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
        (
            "workflow.auto_approval_after_hours",
            config.workflow.auto_approval_after_hours.to_string(),
        ),
        ("workflow.sweep_interval_secs", config.workflow.sweep_interval_secs.to_string()),
        ("workflow.system_actor_id", config.workflow.system_actor_id.clone()),
        ("workflow.admin_role", config.workflow.admin_role.clone()),
        (
            "workflow.admin_bypass_request_types",
            render_types(&config.workflow.admin_bypass_request_types),
        ),
        ("workflow.required_request_types", render_types(&config.workflow.required_request_types)),
        ("outbox.poll_interval_secs", config.outbox.poll_interval_secs.to_string()),
        ("outbox.batch_size", config.outbox.batch_size.to_string()),
        ("outbox.max_attempts", config.outbox.max_attempts.to_string()),
        (
            "alerts.overtime_thresholds_hours",
            config
                .alerts
                .overtime_thresholds_hours
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        ("alerts.standard_daily_hours", config.alerts.standard_daily_hours.to_string()),
        ("alerts.sweep_interval_secs", config.alerts.sweep_interval_secs.to_string()),
    ]
}

fn render_types(types: &[RequestType]) -> String {
    if types.is_empty() {
        return "<none>".to_string();
    }
    types.iter().map(RequestType::as_str).collect::<Vec<_>>().join(",")
}

/// `workflow.admin_role` reads from `HRFLOW_WORKFLOW_ADMIN_ROLE`.
fn env_key_for(key_path: &str) -> String {
    format!("HRFLOW_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("hrflow.toml"), PathBuf::from("config/hrflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
