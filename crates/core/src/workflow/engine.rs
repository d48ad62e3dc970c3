use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::approval::{ApprovalState, RequestContext};
use crate::domain::employee::EmployeeId;
use crate::domain::request_type::RequestType;
use crate::workflow::chain::ApprovalChainConfig;
use crate::workflow::resolver::{ApproverResolver, OrgDirectory};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("no approval chain configured for request type {request_type}")]
    ConfigNotFound { request_type: RequestType },
    #[error("no approver resolved for {request_type} level {level}: {reason}")]
    NoApproverResolved { request_type: RequestType, level: u32, reason: String },
    #[error("`{approver}` is not authorized to approve {request_type} at level {level}")]
    Unauthorized { request_type: RequestType, level: u32, approver: String },
    #[error("{request_type} request was already processed: {detail}")]
    AlreadyProcessed { request_type: RequestType, detail: String },
    #[error("invalid approval chain for {request_type}: {reason}")]
    InvalidChain { request_type: RequestType, reason: String },
}

/// Capability a caller may layer on top of the identity check.
///
/// Never relaxes the pending/level checks, only the "is this the expected
/// approver" comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationBypass {
    #[default]
    None,
    Administrator,
    AutoApprovalSweep,
}

impl AuthorizationBypass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Administrator => "administrator",
            Self::AutoApprovalSweep => "auto_approval_sweep",
        }
    }
}

/// Why an authorization succeeded; persisted with every transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationGrant {
    AssignedApprover,
    AdministratorOverride,
    AutoApproval,
}

impl AuthorizationGrant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssignedApprover => "assigned_approver",
            Self::AdministratorOverride => "administrator_override",
            Self::AutoApproval => "auto_approval",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "assigned_approver" => Some(Self::AssignedApprover),
            "administrator_override" => Some(Self::AdministratorOverride),
            "auto_approval" => Some(Self::AutoApproval),
            _ => None,
        }
    }
}

/// Multi-level approval state machine.
///
/// Holds no state between calls and performs no I/O: callers feed it the
/// current context and persist whatever state it returns.
#[derive(Clone, Debug)]
pub struct ApprovalWorkflowEngine<C, D> {
    chains: C,
    resolver: ApproverResolver<D>,
}

impl<C, D> ApprovalWorkflowEngine<C, D>
where
    C: ApprovalChainConfig,
    D: OrgDirectory,
{
    pub fn new(chains: C, directory: D) -> Self {
        Self { chains, resolver: ApproverResolver::new(directory) }
    }

    pub fn chains(&self) -> &C {
        &self.chains
    }

    /// First state of a freshly submitted request.
    ///
    /// A configured chain without a level 1 step auto-approves; a request
    /// type with no chain at all is an error.
    pub fn initialize_approval(
        &self,
        context: &RequestContext,
    ) -> Result<ApprovalState, ApprovalError> {
        self.ensure_configured(context.request_type)?;
        self.state_for_level(1, context)
    }

    /// True iff `approver_no` is the expected approver of a request pending at
    /// `current_level`. No role lookups happen here.
    pub fn can_approve(
        &self,
        request_type: RequestType,
        current_level: u32,
        approver_no: Option<&EmployeeId>,
        expected: &ApprovalState,
    ) -> bool {
        let ApprovalState::Pending { level, approver, .. } = expected else {
            return false;
        };
        if *level != current_level || self.chains.lookup(request_type, current_level).is_none() {
            return false;
        }
        approver_no.is_some_and(|candidate| candidate == approver)
    }

    /// Caller-facing authorization: stale or terminal requests surface as
    /// `AlreadyProcessed`, identity mismatches as `Unauthorized` unless the
    /// caller passed an explicit bypass.
    pub fn authorize(
        &self,
        request_type: RequestType,
        acted_level: u32,
        approver_no: Option<&EmployeeId>,
        current: &ApprovalState,
        bypass: AuthorizationBypass,
    ) -> Result<AuthorizationGrant, ApprovalError> {
        let Some(pending_level) = current.next_level() else {
            return Err(ApprovalError::AlreadyProcessed {
                request_type,
                detail: format!("request is already {}", current.trans_status()),
            });
        };
        if pending_level != acted_level {
            return Err(ApprovalError::AlreadyProcessed {
                request_type,
                detail: format!(
                    "level {acted_level} is not the pending level (request is at level {pending_level})"
                ),
            });
        }

        if self.can_approve(request_type, acted_level, approver_no, current) {
            return Ok(AuthorizationGrant::AssignedApprover);
        }

        match bypass {
            AuthorizationBypass::Administrator if approver_no.is_some() => {
                Ok(AuthorizationGrant::AdministratorOverride)
            }
            AuthorizationBypass::AutoApprovalSweep => Ok(AuthorizationGrant::AutoApproval),
            AuthorizationBypass::None | AuthorizationBypass::Administrator => {
                Err(ApprovalError::Unauthorized {
                    request_type,
                    level: acted_level,
                    approver: approver_no
                        .map(|approver| approver.0.clone())
                        .unwrap_or_else(|| "<anonymous>".to_string()),
                })
            }
        }
    }

    /// State after `current_level` was signed off, resolved against the
    /// context supplied now rather than the one used at submission.
    pub fn move_to_next_level(
        &self,
        current_level: u32,
        context: &RequestContext,
    ) -> Result<ApprovalState, ApprovalError> {
        self.ensure_configured(context.request_type)?;
        let next_level = current_level.checked_add(1).ok_or_else(|| ApprovalError::InvalidChain {
            request_type: context.request_type,
            reason: format!("level {current_level} has no successor"),
        })?;
        self.state_for_level(next_level, context)
    }

    pub fn reject(
        &self,
        request_type: RequestType,
        current: &ApprovalState,
        reason: impl Into<String>,
    ) -> Result<ApprovalState, ApprovalError> {
        if current.is_terminal() {
            return Err(ApprovalError::AlreadyProcessed {
                request_type,
                detail: format!("request is already {}", current.trans_status()),
            });
        }
        Ok(ApprovalState::Rejected { reason: reason.into() })
    }

    pub fn initialize_approval_with_audit<S>(
        &self,
        context: &RequestContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<ApprovalState, ApprovalError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.initialize_approval(context);
        emit_transition(sink, audit, "approval.initialized", context.request_type, 0, &result);
        result
    }

    pub fn move_to_next_level_with_audit<S>(
        &self,
        current_level: u32,
        context: &RequestContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<ApprovalState, ApprovalError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.move_to_next_level(current_level, context);
        emit_transition(
            sink,
            audit,
            "approval.level_completed",
            context.request_type,
            current_level,
            &result,
        );
        result
    }

    fn ensure_configured(&self, request_type: RequestType) -> Result<(), ApprovalError> {
        if self.chains.is_configured(request_type) {
            Ok(())
        } else {
            Err(ApprovalError::ConfigNotFound { request_type })
        }
    }

    fn state_for_level(
        &self,
        level: u32,
        context: &RequestContext,
    ) -> Result<ApprovalState, ApprovalError> {
        let Some(step) = self.chains.lookup(context.request_type, level) else {
            return Ok(ApprovalState::Approved);
        };

        let approver = self.resolver.resolve(&step.rule, context).map_err(|failure| {
            ApprovalError::NoApproverResolved {
                request_type: context.request_type,
                level,
                reason: failure.to_string(),
            }
        })?;

        Ok(ApprovalState::Pending { level, approver, level_name: step.level_name.clone() })
    }
}

fn emit_transition<S>(
    sink: &S,
    audit: &AuditContext,
    event_type: &str,
    request_type: RequestType,
    completed_level: u32,
    result: &Result<ApprovalState, ApprovalError>,
) where
    S: AuditSink + ?Sized,
{
    let event = |outcome| {
        audit
            .event(event_type, AuditCategory::Transition, request_type, outcome)
            .with_metadata("completed_level", completed_level)
    };

    match result {
        Ok(state) => sink.emit(
            event(AuditOutcome::Success)
                .with_metadata("trans_status", state.trans_status().as_str())
                .with_optional("next_level", state.next_level())
                .with_optional("next_approver", state.next_approver().map(EmployeeId::as_str)),
        ),
        Err(error) => sink.emit(event(AuditOutcome::Failed).with_metadata("error", error)),
    }
}
