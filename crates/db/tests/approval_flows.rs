use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use hrflow_core::audit::InMemoryAuditSink;
use hrflow_core::config::{AppConfig, WorkflowConfig};
use hrflow_core::domain::approval::{ApprovalId, ApprovalState, TransStatus};
use hrflow_core::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
use hrflow_core::domain::payload::{
    AllowanceRequest, LeaveRequest, LoanRequest, ProjectTransferRequest, RequestPayload,
};
use hrflow_core::domain::request_type::RequestType;
use hrflow_core::errors::DomainError;
use hrflow_core::flows::FinalizeEffect;
use hrflow_core::workflow::{ApprovalError, AuthorizationGrant};
use hrflow_db::repositories::{
    SqlApprovalChainRepository, SqlApprovalRequestRepository, SqlHrLedgerRepository,
    SqlOutboxRepository,
};
use hrflow_db::{
    connect_with_settings, migrations, ApprovalOutcome, ApprovalService, DbPool, DemoSeedDataset,
    ServiceError, SubmitRequest,
};

struct Harness {
    pool: DbPool,
    service: ApprovalService,
    audit: InMemoryAuditSink,
}

async fn seeded_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoSeedDataset::load(&pool).await.expect("seed");
    pool
}

async fn harness_with(pool: DbPool, workflow: WorkflowConfig) -> Harness {
    let catalog = SqlApprovalChainRepository::new(pool.clone()).load_catalog().await.expect("catalog");
    let audit = InMemoryAuditSink::default();
    let service =
        ApprovalService::new(pool.clone(), Arc::new(catalog), workflow, Arc::new(audit.clone()));
    Harness { pool, service, audit }
}

async fn harness() -> Harness {
    harness_with(seeded_pool().await, AppConfig::default().workflow).await
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("date")
}

fn employee(id: &str) -> EmployeeId {
    EmployeeId::new(id)
}

fn leave_submission(employee_no: &str, project: &str, days: i64) -> SubmitRequest {
    SubmitRequest {
        employee_no: employee(employee_no),
        department_code: Some(DepartmentCode::new("5")),
        project_code: Some(ProjectCode::new(project)),
        payload: RequestPayload::Leave(LeaveRequest {
            leave_type: "annual".to_string(),
            start_date: date(2026, 11, 2),
            end_date: date(2026, 11, 4),
            days: Decimal::from(days),
        }),
        submitted_by: employee_no.to_string(),
        correlation_id: "corr-submit".to_string(),
    }
}

fn approval_error(error: &ServiceError) -> &ApprovalError {
    error.approval_error().expect("approval error")
}

async fn leave_balance(pool: &DbPool, employee_no: &str) -> Option<Decimal> {
    SqlHrLedgerRepository::new(pool.clone())
        .leave_balance(&employee(employee_no), "annual")
        .await
        .expect("balance")
}

#[tokio::test]
async fn leave_request_walks_project_manager_then_hr_and_deducts_balance() {
    let h = harness().await;

    let submitted = h.service.submit(leave_submission("100", "9", 3)).await.expect("submit");
    assert_eq!(
        submitted.record.state,
        ApprovalState::Pending {
            level: 1,
            approver: employee("PM-9"),
            level_name: Some("Project Manager".to_string()),
        }
    );
    let id = submitted.record.id.clone();

    let first = h.service.approve(&id, 1, &employee("PM-9"), "corr-1").await.expect("level 1");
    assert_eq!(first.record.state.next_approver(), Some(&employee("HR-1")));
    assert_eq!(first.record.state.next_level(), Some(2));
    assert_eq!(first.grant, Some(AuthorizationGrant::AssignedApprover));
    assert!(first.effect.is_none());

    let second = h.service.approve(&id, 2, &employee("HR-1"), "corr-2").await.expect("level 2");
    assert_eq!(second.record.state, ApprovalState::Approved);
    assert_eq!(second.record.state_version, 3);
    assert!(matches!(second.effect, Some(FinalizeEffect::DeductLeave { .. })));
    assert_eq!(leave_balance(&h.pool, "100").await, Some(Decimal::from(18)));

    let transitions =
        SqlApprovalRequestRepository::new(h.pool.clone()).transitions(&id).await.expect("audit");
    let statuses: Vec<TransStatus> = transitions.iter().map(|t| t.to_status).collect();
    assert_eq!(statuses, vec![TransStatus::Pending, TransStatus::Pending, TransStatus::Approved]);
    assert_eq!(transitions[2].actor, "HR-1");
    assert_eq!(transitions[2].correlation_id, "corr-2");

    let counts = SqlOutboxRepository::new(h.pool.clone()).count_by_status().await.expect("outbox");
    assert_eq!(counts.get("pending"), Some(&3));
    assert!(h.audit.events().iter().any(|event| event.event_type == "approval.finalized"));
}

#[tokio::test]
async fn single_level_loan_creates_schedule_summing_to_principal() {
    let h = harness().await;
    let principal = Decimal::new(1_000_000, 2);

    let submitted = h
        .service
        .submit(SubmitRequest {
            employee_no: employee("100"),
            department_code: Some(DepartmentCode::new("5")),
            project_code: None,
            payload: RequestPayload::Loan(LoanRequest {
                principal,
                installment_count: 3,
                first_due_date: date(2026, 11, 30),
            }),
            submitted_by: "100".to_string(),
            correlation_id: "corr-loan".to_string(),
        })
        .await
        .expect("submit");
    assert_eq!(submitted.record.state.next_approver(), Some(&employee("FIN-1")));

    let id = submitted.record.id.clone();
    let approved = h.service.approve(&id, 1, &employee("FIN-1"), "corr-loan-1").await.expect("approve");
    assert_eq!(approved.record.state, ApprovalState::Approved);

    let installments =
        SqlHrLedgerRepository::new(h.pool.clone()).installments(&id).await.expect("installments");
    assert_eq!(installments.len(), 3);
    assert_eq!(installments.iter().map(|i| i.amount).sum::<Decimal>(), principal);
    assert_eq!(installments[0].amount, Decimal::new(333_333, 2));
    assert_eq!(installments[2].amount, Decimal::new(333_334, 2));
}

#[tokio::test]
async fn project_transfer_switches_project_context_between_levels() {
    let h = harness().await;

    let submitted = h
        .service
        .submit(SubmitRequest {
            employee_no: employee("100"),
            department_code: Some(DepartmentCode::new("5")),
            project_code: Some(ProjectCode::new("9")),
            payload: RequestPayload::ProjectTransfer(ProjectTransferRequest {
                from_project: ProjectCode::new("9"),
                to_project: ProjectCode::new("12"),
                effective_date: date(2026, 12, 1),
            }),
            submitted_by: "100".to_string(),
            correlation_id: "corr-transfer".to_string(),
        })
        .await
        .expect("submit");
    let id = submitted.record.id.clone();
    assert_eq!(submitted.record.state.next_approver(), Some(&employee("PM-9")));

    let first = h.service.approve(&id, 1, &employee("PM-9"), "t-1").await.expect("source pm");
    assert_eq!(first.record.state.next_approver(), Some(&employee("PM-12")));

    let second = h.service.approve(&id, 2, &employee("PM-12"), "t-2").await.expect("dest pm");
    assert_eq!(second.record.state.next_approver(), Some(&employee("HR-1")));

    let last = h.service.approve(&id, 3, &employee("HR-1"), "t-3").await.expect("hr");
    assert_eq!(last.record.state, ApprovalState::Approved);
    let assignment = SqlHrLedgerRepository::new(h.pool.clone())
        .assignment(&employee("100"))
        .await
        .expect("assignment");
    assert_eq!(assignment, Some(ProjectCode::new("12")));
}

#[tokio::test]
async fn wrong_approver_is_unauthorized_and_state_is_unchanged() {
    let h = harness().await;
    let submitted = h.service.submit(leave_submission("100", "9", 2)).await.expect("submit");
    let id = submitted.record.id.clone();

    let error =
        h.service.approve(&id, 1, &employee("PM-12"), "corr-x").await.expect_err("not the approver");
    assert!(matches!(approval_error(&error), ApprovalError::Unauthorized { level: 1, .. }));

    let stale =
        h.service.approve(&id, 2, &employee("HR-1"), "corr-y").await.expect_err("level 2 not pending");
    assert!(matches!(approval_error(&stale), ApprovalError::AlreadyProcessed { .. }));

    let transitions =
        SqlApprovalRequestRepository::new(h.pool.clone()).transitions(&id).await.expect("audit");
    assert_eq!(transitions.len(), 1);
}

#[tokio::test]
async fn rejection_is_terminal_and_skips_finalize() {
    let h = harness().await;
    let submitted = h.service.submit(leave_submission("100", "9", 3)).await.expect("submit");
    let id = submitted.record.id.clone();
    h.service.approve(&id, 1, &employee("PM-9"), "r-1").await.expect("level 1");

    let rejected = h
        .service
        .reject(&id, 2, &employee("HR-1"), "peak season", "r-2")
        .await
        .expect("reject");
    assert_eq!(rejected.record.state, ApprovalState::Rejected { reason: "peak season".to_string() });
    assert!(rejected.effect.is_none());
    assert_eq!(leave_balance(&h.pool, "100").await, Some(Decimal::from(21)));

    let late = h.service.approve(&id, 2, &employee("HR-1"), "r-3").await.expect_err("terminal");
    assert!(matches!(approval_error(&late), ApprovalError::AlreadyProcessed { .. }));

    let blank = h.service.reject(&id, 2, &employee("HR-1"), "  ", "r-4").await.expect_err("blank");
    assert!(matches!(blank, ServiceError::Domain(DomainError::InvariantViolation(_))));
}

async fn race_approvals(
    service: &Arc<ApprovalService>,
    id: &ApprovalId,
    level: u32,
    approver: &str,
) -> ApprovalOutcome {
    let tasks = ["a", "b"].map(|side| {
        let service = Arc::clone(service);
        let id = id.clone();
        let approver = employee(approver);
        let correlation_id = format!("race-{level}-{side}");
        tokio::spawn(async move { service.approve(&id, level, &approver, &correlation_id).await })
    });

    let mut winners = Vec::new();
    let mut losers = Vec::new();
    for task in tasks {
        match task.await.expect("approval task") {
            Ok(outcome) => winners.push(outcome),
            Err(error) => losers.push(error),
        }
    }
    assert_eq!(winners.len(), 1, "exactly one approval should win, losers: {losers:?}");
    assert_eq!(losers.len(), 1);
    assert!(
        matches!(approval_error(&losers[0]), ApprovalError::AlreadyProcessed { .. }),
        "loser should see an already processed request, got {:?}",
        losers[0]
    );
    winners.remove(0)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_on_shared_file_database_advance_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("hrflow.db").display());
    let pool = connect_with_settings(&url, 5, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoSeedDataset::load(&pool).await.expect("seed");
    let h = harness_with(pool, AppConfig::default().workflow).await;
    let service = Arc::new(h.service);

    for round in 0..8 {
        let submitted = service.submit(leave_submission("100", "9", 1)).await.expect("submit");
        let id = submitted.record.id.clone();

        let first = race_approvals(&service, &id, 1, "PM-9").await;
        assert_eq!(first.record.state.next_level(), Some(2), "round {round}");
        let last = race_approvals(&service, &id, 2, "HR-1").await;
        assert_eq!(last.record.state, ApprovalState::Approved, "round {round}");

        let transitions =
            SqlApprovalRequestRepository::new(h.pool.clone()).transitions(&id).await.expect("audit");
        assert_eq!(transitions.len(), 3, "round {round}");
    }

    assert_eq!(leave_balance(&h.pool, "100").await, Some(Decimal::from(13)));
}

#[tokio::test]
async fn insufficient_balance_rolls_back_final_approval() {
    let h = harness().await;
    let submitted = h.service.submit(leave_submission("101", "9", 20)).await.expect("submit");
    let id = submitted.record.id.clone();
    h.service.approve(&id, 1, &employee("PM-9"), "b-1").await.expect("level 1");

    let error = h.service.approve(&id, 2, &employee("HR-1"), "b-2").await.expect_err("balance");
    assert!(matches!(error, ServiceError::Domain(DomainError::InsufficientLeaveBalance { .. })));

    let transitions =
        SqlApprovalRequestRepository::new(h.pool.clone()).transitions(&id).await.expect("audit");
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[1].to_level, Some(2));
    assert_eq!(leave_balance(&h.pool, "101").await, Some(Decimal::from(14)));
}

#[tokio::test]
async fn missing_project_manager_fails_submission_without_persisting() {
    let h = harness().await;

    let error = h.service.submit(leave_submission("100", "77", 1)).await.expect_err("no pm");
    assert!(matches!(
        approval_error(&error),
        ApprovalError::NoApproverResolved { request_type: RequestType::Leave, level: 1, .. }
    ));

    let rows = sqlx::query("SELECT COUNT(*) AS count FROM approval_request")
        .fetch_one(&h.pool)
        .await
        .expect("count");
    assert_eq!(rows.get::<i64, _>("count"), 0);
}

#[tokio::test]
async fn unknown_request_id_is_not_found() {
    let h = harness().await;
    let error = h
        .service
        .approve(&ApprovalId("REQ-404".to_string()), 1, &employee("PM-9"), "n-1")
        .await
        .expect_err("missing");
    assert!(matches!(error, ServiceError::RequestNotFound(_)));
}

#[tokio::test]
async fn administrator_override_requires_role_and_opt_in() {
    let pool = seeded_pool().await;
    let closed = harness_with(pool.clone(), AppConfig::default().workflow).await;
    let submitted = closed.service.submit(leave_submission("100", "9", 1)).await.expect("submit");
    let id = submitted.record.id.clone();

    let refused =
        closed.service.approve(&id, 1, &employee("ADM-1"), "a-1").await.expect_err("bypass off");
    assert!(matches!(approval_error(&refused), ApprovalError::Unauthorized { .. }));

    let workflow = WorkflowConfig {
        admin_bypass_request_types: vec![RequestType::Leave],
        ..AppConfig::default().workflow
    };
    let open = harness_with(pool, workflow).await;
    let not_admin =
        open.service.approve(&id, 1, &employee("PM-12"), "a-2").await.expect_err("no role");
    assert!(matches!(approval_error(&not_admin), ApprovalError::Unauthorized { .. }));

    let overridden = open.service.approve(&id, 1, &employee("ADM-1"), "a-3").await.expect("admin");
    assert_eq!(overridden.grant, Some(AuthorizationGrant::AdministratorOverride));
    assert!(open.audit.events().iter().any(|event| {
        event.event_type == "approval.authorized"
            && event.metadata_value("bypass") == Some("administrator")
    }));
}

#[tokio::test]
async fn chain_without_steps_auto_approves_on_submit() {
    let pool = seeded_pool().await;
    SqlApprovalChainRepository::new(pool.clone())
        .replace_chain(RequestType::Allowance, Some("auto"), &[])
        .await
        .expect("auto chain");
    let h = harness_with(pool, AppConfig::default().workflow).await;

    let submitted = h
        .service
        .submit(SubmitRequest {
            employee_no: employee("100"),
            department_code: Some(DepartmentCode::new("5")),
            project_code: None,
            payload: RequestPayload::Allowance(AllowanceRequest {
                allowance_type: "transport".to_string(),
                month: "2026-10".to_string(),
                amount: Decimal::new(25_000, 2),
            }),
            submitted_by: "100".to_string(),
            correlation_id: "auto-1".to_string(),
        })
        .await
        .expect("submit");

    assert_eq!(submitted.record.state, ApprovalState::Approved);
    assert!(matches!(submitted.effect, Some(FinalizeEffect::RecordAllowance { .. })));
    let rows = sqlx::query("SELECT COUNT(*) AS count FROM allowance_payable WHERE request_id = ?")
        .bind(&submitted.record.id.0)
        .fetch_one(&h.pool)
        .await
        .expect("count");
    assert_eq!(rows.get::<i64, _>("count"), 1);
}

#[tokio::test]
async fn sweep_advances_stale_levels_as_system_actor() {
    let h = harness().await;
    let submitted = h.service.submit(leave_submission("100", "9", 2)).await.expect("submit");
    let id = submitted.record.id.clone();

    let early = h.service.sweep_stale(Utc::now()).await.expect("early sweep");
    assert_eq!(early.examined, 0);

    let report = h.service.sweep_stale(Utc::now() + Duration::hours(49)).await.expect("sweep");
    assert_eq!(report.advanced, 1);
    assert_eq!(report.approved, 0);

    let transitions =
        SqlApprovalRequestRepository::new(h.pool.clone()).transitions(&id).await.expect("audit");
    let last = transitions.last().expect("transition");
    assert_eq!(last.actor, "SYSTEM");
    assert_eq!(last.grant, Some(AuthorizationGrant::AutoApproval));
    assert_eq!(last.to_approver, Some(employee("HR-1")));
}
