use std::env;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{NaiveDate, NaiveTime};
use hrflow_cli::commands::{chains, config, dispatch, doctor, migrate, seed, sweep};
use hrflow_core::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
use hrflow_core::domain::payload::{ManualAttendanceRequest, RequestPayload};
use hrflow_db::repositories::SqlApprovalChainRepository;
use hrflow_db::{connect_with_settings, ApprovalService, SubmitRequest, TracingAuditSink};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("HRFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("HRFLOW_DATABASE_URL", "postgres://localhost/hrflow")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_and_lists_chains() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = file_url(dir.path());
    with_env(&[("HRFLOW_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["status"], "ok");
        assert_eq!(first_payload["message"], second_payload["message"]);

        let message = first_payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("  - VAC: 2 level(s) (Leave: project manager then HR)"));
        assert!(message.contains("  - LOAN: 1 level(s) (Loan: finance sign-off)"));
    });
}

#[test]
fn chains_prints_seeded_levels() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = file_url(dir.path());
    with_env(&[("HRFLOW_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = chains::run();
        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains(
            "PROJ_TRANSFER: 1. Source Project Manager [project_manager] -> \
             2. Destination Project Manager [project_manager] -> \
             3. HR Manager [role_holder(HR_MANAGER)]"
        ));
    });
}

#[test]
fn doctor_flags_missing_chains_until_seeded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = file_url(dir.path());
    with_env(&[("HRFLOW_DATABASE_URL", url.as_str())], || {
        let before = doctor::run(true);
        assert_eq!(before.exit_code, 1);
        let report = parse_payload(&before.output);
        assert_eq!(report["overall_status"], "fail");
        let coverage = report["checks"]
            .as_array()
            .and_then(|checks| checks.iter().find(|check| check["name"] == "chain_coverage"))
            .expect("coverage check");
        assert_eq!(coverage["status"], "fail");

        assert_eq!(seed::run().exit_code, 0);

        let after = doctor::run(false);
        assert_eq!(after.exit_code, 0);
        assert!(after.output.starts_with("doctor: all readiness checks passed"));
        assert!(after.output.contains("- [ok] chain_coverage: 8 request type(s) have approval chains"));
    });
}

#[test]
fn doctor_skips_database_checks_when_config_is_invalid() {
    with_env(&[("HRFLOW_DATABASE_URL", "mysql://nowhere")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] database_connectivity"));
        assert!(result.output.contains("- [skip] chain_coverage"));
    });
}

#[test]
fn config_attributes_env_overrides() {
    with_env(
        &[("HRFLOW_DATABASE_URL", "sqlite::memory:"), ("HRFLOW_OUTBOX_BATCH_SIZE", "10")],
        || {
            let output = config::run();
            assert!(output.contains(
                "- database.url = sqlite::memory: (source: env (HRFLOW_DATABASE_URL))"
            ));
            assert!(output.contains("- outbox.batch_size = 10 (source: env (HRFLOW_OUTBOX_BATCH_SIZE))"));
            assert!(output.contains("- outbox.max_attempts = 5 (source: default)"));
            assert!(output.contains("- workflow.admin_bypass_request_types = <none> (source: default)"));
        },
    );
}

#[test]
fn dispatch_and_sweep_run_once_against_seeded_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = file_url(dir.path());
    with_env(&[("HRFLOW_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);
        submit_manual_attendance(&url);

        let sweep_result = sweep::run();
        assert_eq!(sweep_result.exit_code, 0);
        let sweep_payload = parse_payload(&sweep_result.output);
        assert_eq!(
            sweep_payload["message"],
            "examined 0 stale request(s): 0 advanced, 0 fully approved, 0 failed"
        );

        let first = parse_payload(&dispatch::run().output);
        assert_eq!(first["message"], "outbox batch: 1 delivered, 0 retried, 0 dead");
        let second = parse_payload(&dispatch::run().output);
        assert_eq!(second["message"], "outbox batch: 0 delivered, 0 retried, 0 dead");
    });
}

fn submit_manual_attendance(url: &str) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let pool = connect_with_settings(url, 1, 5).await.expect("connect");
        let catalog =
            SqlApprovalChainRepository::new(pool.clone()).load_catalog().await.expect("catalog");
        let service = ApprovalService::new(
            pool.clone(),
            Arc::new(catalog),
            hrflow_core::config::AppConfig::default().workflow,
            Arc::new(TracingAuditSink),
        );
        service
            .submit(SubmitRequest {
                employee_no: EmployeeId::new("100"),
                department_code: Some(DepartmentCode::new("5")),
                project_code: Some(ProjectCode::new("9")),
                payload: RequestPayload::ManualAttendance(ManualAttendanceRequest {
                    work_date: NaiveDate::from_ymd_opt(2026, 10, 12).expect("date"),
                    check_in: NaiveTime::from_hms_opt(7, 0, 0).expect("time"),
                    check_out: NaiveTime::from_hms_opt(16, 0, 0).expect("time"),
                    reason: "badge reader offline".to_string(),
                }),
                submitted_by: "100".to_string(),
                correlation_id: "cli-test".to_string(),
            })
            .await
            .expect("submit");
        pool.close().await;
    });
}

fn file_url(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("hrflow.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "HRFLOW_DATABASE_URL",
        "HRFLOW_DATABASE_MAX_CONNECTIONS",
        "HRFLOW_DATABASE_TIMEOUT_SECS",
        "HRFLOW_LOGGING_LEVEL",
        "HRFLOW_LOGGING_FORMAT",
        "HRFLOW_LOG_LEVEL",
        "HRFLOW_LOG_FORMAT",
        "HRFLOW_WORKFLOW_AUTO_APPROVAL_AFTER_HOURS",
        "HRFLOW_WORKFLOW_SWEEP_INTERVAL_SECS",
        "HRFLOW_WORKFLOW_SYSTEM_ACTOR_ID",
        "HRFLOW_WORKFLOW_ADMIN_ROLE",
        "HRFLOW_WORKFLOW_ADMIN_BYPASS_REQUEST_TYPES",
        "HRFLOW_WORKFLOW_REQUIRED_REQUEST_TYPES",
        "HRFLOW_OUTBOX_POLL_INTERVAL_SECS",
        "HRFLOW_OUTBOX_BATCH_SIZE",
        "HRFLOW_OUTBOX_MAX_ATTEMPTS",
        "HRFLOW_ALERTS_OVERTIME_THRESHOLDS_HOURS",
        "HRFLOW_ALERTS_STANDARD_DAILY_HOURS",
        "HRFLOW_ALERTS_SWEEP_INTERVAL_SECS",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
