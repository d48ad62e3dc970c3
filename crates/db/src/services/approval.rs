use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use hrflow_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use hrflow_core::config::WorkflowConfig;
use hrflow_core::domain::approval::{
    ApprovalId, ApprovalRecord, ApprovalState, RequestContext, TransStatus,
};
use hrflow_core::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
use hrflow_core::domain::notification::NotificationEvent;
use hrflow_core::domain::payload::RequestPayload;
use hrflow_core::domain::request_type::RequestType;
use hrflow_core::errors::DomainError;
use hrflow_core::flows::{plan_finalize, FinalizeEffect};
use hrflow_core::workflow::{
    ApprovalChainCatalog, ApprovalError, ApprovalWorkflowEngine, AuthorizationBypass,
    AuthorizationGrant,
};

use super::{finalize, ServiceError};
use crate::repositories::approval::{
    append_transition, compare_and_swap_state, fetch_record, insert_record, ApprovalTransition,
};
use crate::repositories::{org, outbox, SqlApprovalRequestRepository};
use crate::{begin_write, DbPool};

const SWEEP_BATCH: u32 = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitRequest {
    pub employee_no: EmployeeId,
    pub department_code: Option<DepartmentCode>,
    pub project_code: Option<ProjectCode>,
    pub payload: RequestPayload,
    pub submitted_by: String,
    pub correlation_id: String,
}

/// Result of one committed transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub record: ApprovalRecord,
    pub grant: Option<AuthorizationGrant>,
    pub effect: Option<FinalizeEffect>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub advanced: usize,
    pub approved: usize,
    pub failed: usize,
}

#[derive(Clone, Copy)]
enum Actor<'a> {
    Employee(&'a EmployeeId),
    System,
}

#[derive(Clone, Copy)]
enum Decision<'a> {
    Approve,
    Reject { reason: &'a str },
}

/// Runs every flow's submit/approve/reject through the workflow engine, one
/// database transaction per call.
pub struct ApprovalService {
    pool: DbPool,
    catalog: Arc<ApprovalChainCatalog>,
    workflow: WorkflowConfig,
    audit: Arc<dyn AuditSink>,
}

impl ApprovalService {
    pub fn new(
        pool: DbPool,
        catalog: Arc<ApprovalChainCatalog>,
        workflow: WorkflowConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { pool, catalog, workflow, audit }
    }

    pub async fn submit(&self, request: SubmitRequest) -> Result<ApprovalOutcome, ServiceError> {
        request.payload.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        let directory = org::load_directory(&mut *tx).await?;
        let engine = ApprovalWorkflowEngine::new(self.catalog.as_ref(), &directory);

        let id = ApprovalId(Uuid::new_v4().to_string());
        let base = RequestContext::new(
            request.payload.request_type(),
            request.employee_no.clone(),
            request.department_code.clone(),
            request.project_code.clone(),
        );
        let context = request.payload.context_for_level(1, base);
        let audit = AuditContext::new(
            Some(id.clone()),
            request.correlation_id.clone(),
            request.submitted_by.clone(),
        );
        let state = engine.initialize_approval_with_audit(&context, self.audit.as_ref(), &audit)?;

        let now = Utc::now();
        let record = ApprovalRecord {
            id,
            employee_no: request.employee_no,
            department_code: request.department_code,
            project_code: request.project_code,
            payload: request.payload,
            state,
            state_version: 1,
            submitted_by: request.submitted_by,
            created_at: now,
            updated_at: now,
        };
        insert_record(&mut *tx, &record).await?;
        append_transition(
            &mut *tx,
            &transition(None, &record, &record.submitted_by, None, &request.correlation_id, now),
        )
        .await?;

        let effect = self.finalize_if_approved(&mut *tx, &record, &audit).await?;
        outbox::enqueue(&mut *tx, &NotificationEvent::for_transition(&record), now).await?;
        tx.commit().await?;

        info!(
            event_name = "approval.submitted",
            correlation_id = %request.correlation_id,
            request_id = %record.id,
            request_type = %record.request_type(),
            trans_status = %record.state.trans_status(),
            "approval request submitted"
        );
        Ok(ApprovalOutcome { record, grant: None, effect })
    }

    pub async fn approve(
        &self,
        id: &ApprovalId,
        acted_level: u32,
        approver: &EmployeeId,
        correlation_id: &str,
    ) -> Result<ApprovalOutcome, ServiceError> {
        self.act(id, acted_level, Actor::Employee(approver), Decision::Approve, correlation_id).await
    }

    pub async fn reject(
        &self,
        id: &ApprovalId,
        acted_level: u32,
        approver: &EmployeeId,
        reason: &str,
        correlation_id: &str,
    ) -> Result<ApprovalOutcome, ServiceError> {
        if reason.trim().is_empty() {
            return Err(
                DomainError::InvariantViolation("rejection reason must not be empty".into()).into()
            );
        }
        self.act(
            id,
            acted_level,
            Actor::Employee(approver),
            Decision::Reject { reason: reason.trim() },
            correlation_id,
        )
        .await
    }

    /// Signs off every level that has waited longer than
    /// `workflow.auto_approval_after_hours`, one level per request per sweep.
    pub async fn sweep_stale(&self, now: DateTime<Utc>) -> Result<SweepReport, ServiceError> {
        let cutoff = i64::try_from(self.workflow.auto_approval_after_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let stale = SqlApprovalRequestRepository::new(self.pool.clone())
            .list_stale_pending(cutoff, SWEEP_BATCH)
            .await?;

        let mut report = SweepReport { examined: stale.len(), ..SweepReport::default() };
        for record in stale {
            let Some(level) = record.state.next_level() else {
                continue;
            };
            let correlation_id = format!("sweep-{}", Uuid::new_v4());
            match self.act(&record.id, level, Actor::System, Decision::Approve, &correlation_id).await
            {
                Ok(outcome) => {
                    report.advanced += 1;
                    if outcome.record.state == ApprovalState::Approved {
                        report.approved += 1;
                    }
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        event_name = "approval.sweep.failed",
                        correlation_id = %correlation_id,
                        request_id = %record.id,
                        error = %error,
                        "auto-approval sweep could not advance request"
                    );
                }
            }
        }

        info!(
            event_name = "approval.sweep.completed",
            correlation_id = "sweep",
            examined = report.examined,
            advanced = report.advanced,
            approved = report.approved,
            failed = report.failed,
            "auto-approval sweep finished"
        );
        Ok(report)
    }

    async fn act(
        &self,
        id: &ApprovalId,
        acted_level: u32,
        actor: Actor<'_>,
        decision: Decision<'_>,
        correlation_id: &str,
    ) -> Result<ApprovalOutcome, ServiceError> {
        let mut tx = begin_write(&self.pool).await?;
        let record =
            fetch_record(&mut *tx, id).await?.ok_or_else(|| ServiceError::RequestNotFound(id.clone()))?;
        let request_type = record.request_type();
        let directory = org::load_directory(&mut *tx).await?;
        let engine = ApprovalWorkflowEngine::new(self.catalog.as_ref(), &directory);

        let (approver, bypass, actor_name) = match actor {
            Actor::Employee(employee) => {
                let bypass =
                    self.administrator_bypass(&mut *tx, request_type, employee, &record.state).await?;
                (Some(employee), bypass, employee.0.clone())
            }
            Actor::System => {
                (None, AuthorizationBypass::AutoApprovalSweep, self.workflow.system_actor_id.clone())
            }
        };
        let audit = AuditContext::new(Some(record.id.clone()), correlation_id, actor_name.clone());

        let grant = match engine.authorize(request_type, acted_level, approver, &record.state, bypass)
        {
            Ok(grant) => grant,
            Err(error) => {
                self.emit_authorization(&audit, request_type, acted_level, bypass, Err(&error));
                return Err(error.into());
            }
        };
        self.emit_authorization(&audit, request_type, acted_level, bypass, Ok(grant));

        let next_state = match decision {
            Decision::Approve => engine.move_to_next_level_with_audit(
                acted_level,
                &record.context_for_level(acted_level.saturating_add(1)),
                self.audit.as_ref(),
                &audit,
            )?,
            Decision::Reject { reason } => engine.reject(request_type, &record.state, reason)?,
        };

        let now = Utc::now();
        let swapped =
            compare_and_swap_state(&mut *tx, &record.id, record.state_version, &next_state, now)
                .await?;
        if !swapped {
            return Err(ApprovalError::AlreadyProcessed {
                request_type,
                detail: "request changed while this decision was being recorded".to_string(),
            }
            .into());
        }

        let previous = record;
        let record = ApprovalRecord {
            state: next_state,
            state_version: previous.state_version + 1,
            updated_at: now,
            ..previous.clone()
        };
        append_transition(
            &mut *tx,
            &transition(Some(&previous), &record, &actor_name, Some(grant), correlation_id, now),
        )
        .await?;

        let effect = self.finalize_if_approved(&mut *tx, &record, &audit).await?;
        outbox::enqueue(&mut *tx, &NotificationEvent::for_transition(&record), now).await?;
        tx.commit().await?;

        info!(
            event_name = "approval.transition.committed",
            correlation_id = %correlation_id,
            request_id = %record.id,
            request_type = %request_type,
            acted_level,
            grant = grant.as_str(),
            trans_status = %record.state.trans_status(),
            "approval transition committed"
        );
        Ok(ApprovalOutcome { record, grant: Some(grant), effect })
    }

    /// Administrator capability applies only when the actor is not already the
    /// assigned approver, holds the admin role, and the request type opts in.
    async fn administrator_bypass(
        &self,
        conn: &mut SqliteConnection,
        request_type: RequestType,
        employee: &EmployeeId,
        state: &ApprovalState,
    ) -> Result<AuthorizationBypass, ServiceError> {
        if state.next_approver() == Some(employee)
            || !self.workflow.admin_bypass_allowed(request_type)
        {
            return Ok(AuthorizationBypass::None);
        }
        if org::holds_role(conn, employee, &self.workflow.admin_role).await? {
            Ok(AuthorizationBypass::Administrator)
        } else {
            Ok(AuthorizationBypass::None)
        }
    }

    async fn finalize_if_approved(
        &self,
        conn: &mut SqliteConnection,
        record: &ApprovalRecord,
        audit: &AuditContext,
    ) -> Result<Option<FinalizeEffect>, ServiceError> {
        if record.state != ApprovalState::Approved {
            return Ok(None);
        }
        let effect = plan_finalize(record)?;
        finalize::apply_effect(conn, record, &effect).await?;

        self.audit.emit(
            audit
                .event(
                    "approval.finalized",
                    AuditCategory::Finalize,
                    record.request_type(),
                    AuditOutcome::Success,
                )
                .with_metadata("effect", effect.name()),
        );
        Ok(Some(effect))
    }

    fn emit_authorization(
        &self,
        audit: &AuditContext,
        request_type: RequestType,
        acted_level: u32,
        bypass: AuthorizationBypass,
        result: Result<AuthorizationGrant, &ApprovalError>,
    ) {
        let outcome = if result.is_ok() { AuditOutcome::Success } else { AuditOutcome::Rejected };
        let event = audit
            .event("approval.authorized", AuditCategory::Authorization, request_type, outcome)
            .with_metadata("acted_level", acted_level)
            .with_metadata("bypass", bypass.as_str());
        self.audit.emit(match result {
            Ok(grant) => event.with_metadata("grant", grant.as_str()),
            Err(error) => event.with_metadata("error", error),
        });
    }
}

fn transition(
    previous: Option<&ApprovalRecord>,
    record: &ApprovalRecord,
    actor: &str,
    grant: Option<AuthorizationGrant>,
    correlation_id: &str,
    occurred_at: DateTime<Utc>,
) -> ApprovalTransition {
    ApprovalTransition {
        id: Uuid::new_v4().to_string(),
        request_id: record.id.clone(),
        from_status: previous.map(|previous| previous.state.trans_status()),
        from_level: previous.and_then(|previous| previous.state.next_level()),
        to_status: record.state.trans_status(),
        to_level: record.state.next_level(),
        to_approver: record.state.next_approver().cloned(),
        actor: actor.to_string(),
        grant,
        reason: record.state.rejection_reason().map(str::to_string),
        correlation_id: correlation_id.to_string(),
        occurred_at,
    }
}

impl ApprovalOutcome {
    pub fn trans_status(&self) -> TransStatus {
        self.record.state.trans_status()
    }
}
