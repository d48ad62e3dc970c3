use rust_decimal::Decimal;
use thiserror::Error;

use crate::workflow::engine::ApprovalError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error("invalid request payload: {0}")]
    InvalidPayload(String),
    #[error("employee {employee_no} has {available} days of {leave_type} left, {requested} requested")]
    InsufficientLeaveBalance {
        employee_no: String,
        leave_type: String,
        requested: Decimal,
        available: Decimal,
    },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("request `{0}` not found")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<ApprovalError> for ApplicationError {
    fn from(value: ApprovalError) -> Self {
        Self::Domain(DomainError::Approval(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not the assigned approver for this request.",
            Self::NotFound { .. } => "The request does not exist.",
            Self::Conflict { .. } => {
                "The request was already processed. Refresh to see its current state."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Approval(approval)) => {
                let message = approval.to_string();
                match approval {
                    ApprovalError::Unauthorized { .. } => Self::Forbidden { message, correlation_id },
                    ApprovalError::AlreadyProcessed { .. } => {
                        Self::Conflict { message, correlation_id }
                    }
                    ApprovalError::NoApproverResolved { .. } => {
                        Self::Conflict { message, correlation_id }
                    }
                    ApprovalError::ConfigNotFound { .. } | ApprovalError::InvalidChain { .. } => {
                        Self::Internal { message, correlation_id }
                    }
                }
            }
            ApplicationError::Domain(DomainError::InsufficientLeaveBalance { .. }) => {
                Self::Conflict { message: "insufficient leave balance".to_owned(), correlation_id }
            }
            ApplicationError::Domain(DomainError::InvalidPayload(_))
            | ApplicationError::Domain(DomainError::InvariantViolation(_)) => {
                Self::BadRequest { message: "domain validation failed".to_owned(), correlation_id }
            }
            ApplicationError::NotFound(id) => {
                Self::NotFound { message: format!("request `{id}`"), correlation_id }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
