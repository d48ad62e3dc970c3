use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
use crate::domain::payload::RequestPayload;
use crate::domain::request_type::RequestType;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for TransStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of every engine call.
///
/// A pending state always carries the approver and the level it waits on;
/// both terminal states carry neither, so the mirrored columns on the
/// business entity can never disagree with the status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trans_status", rename_all = "snake_case")]
pub enum ApprovalState {
    Pending { level: u32, approver: EmployeeId, level_name: Option<String> },
    Approved,
    Rejected { reason: String },
}

impl ApprovalState {
    pub fn trans_status(&self) -> TransStatus {
        match self {
            Self::Pending { .. } => TransStatus::Pending,
            Self::Approved => TransStatus::Approved,
            Self::Rejected { .. } => TransStatus::Rejected,
        }
    }

    pub fn next_approver(&self) -> Option<&EmployeeId> {
        match self {
            Self::Pending { approver, .. } => Some(approver),
            Self::Approved | Self::Rejected { .. } => None,
        }
    }

    pub fn next_level(&self) -> Option<u32> {
        match self {
            Self::Pending { level, .. } => Some(*level),
            Self::Approved | Self::Rejected { .. } => None,
        }
    }

    pub fn next_level_name(&self) -> Option<&str> {
        match self {
            Self::Pending { level_name, .. } => level_name.as_deref(),
            Self::Approved | Self::Rejected { .. } => None,
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            Self::Rejected { reason } => Some(reason),
            Self::Pending { .. } | Self::Approved => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    /// Rebuilds a state from the mirrored status columns, refusing any
    /// combination that breaks the pending/terminal invariant.
    pub fn from_columns(
        status: TransStatus,
        next_approver: Option<EmployeeId>,
        next_level: Option<u32>,
        next_level_name: Option<String>,
        rejection_reason: Option<String>,
    ) -> Result<Self, String> {
        match (status, next_approver, next_level) {
            (TransStatus::Pending, Some(approver), Some(level)) if level >= 1 => {
                Ok(Self::Pending { level, approver, level_name: next_level_name })
            }
            (TransStatus::Pending, approver, level) => Err(format!(
                "pending state requires approver and level >= 1 (approver: {approver:?}, level: {level:?})"
            )),
            (TransStatus::Approved, None, None) => Ok(Self::Approved),
            (TransStatus::Rejected, None, None) => {
                Ok(Self::Rejected { reason: rejection_reason.unwrap_or_default() })
            }
            (status, approver, level) => Err(format!(
                "{status} state must not carry approver or level (approver: {approver:?}, level: {level:?})"
            )),
        }
    }
}

/// Inputs the resolver sees for one level. Built fresh at every engine call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_type: RequestType,
    pub employee_no: EmployeeId,
    pub department_code: Option<DepartmentCode>,
    pub project_code: Option<ProjectCode>,
}

impl RequestContext {
    pub fn new(
        request_type: RequestType,
        employee_no: EmployeeId,
        department_code: Option<DepartmentCode>,
        project_code: Option<ProjectCode>,
    ) -> Self {
        Self { request_type, employee_no, department_code, project_code }
    }

    pub fn with_project(mut self, project_code: ProjectCode) -> Self {
        self.project_code = Some(project_code);
        self
    }
}

/// Business transaction awaiting or past sign-off, with the last engine
/// state mirrored onto it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: ApprovalId,
    pub employee_no: EmployeeId,
    pub department_code: Option<DepartmentCode>,
    pub project_code: Option<ProjectCode>,
    pub payload: RequestPayload,
    pub state: ApprovalState,
    pub state_version: u32,
    pub submitted_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRecord {
    pub fn request_type(&self) -> RequestType {
        self.payload.request_type()
    }

    pub fn base_context(&self) -> RequestContext {
        RequestContext::new(
            self.request_type(),
            self.employee_no.clone(),
            self.department_code.clone(),
            self.project_code.clone(),
        )
    }

    /// Context the approver for `level` is resolved against.
    pub fn context_for_level(&self, level: u32) -> RequestContext {
        self.payload.context_for_level(level, self.base_context())
    }
}
