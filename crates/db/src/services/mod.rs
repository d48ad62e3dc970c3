use thiserror::Error;

use hrflow_core::domain::approval::ApprovalId;
use hrflow_core::errors::{ApplicationError, DomainError};
use hrflow_core::workflow::ApprovalError;

use crate::repositories::RepositoryError;

pub mod approval;
pub mod finalize;
pub mod outbox;
pub mod overtime;

pub use approval::{ApprovalOutcome, ApprovalService, SubmitRequest, SweepReport};
pub use outbox::{DispatchReport, OutboxDispatcher};
pub use overtime::{OvertimeAlertJob, OvertimeReport};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request `{0}` not found")]
    RequestNotFound(ApprovalId),
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(value: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(value))
    }
}

impl ServiceError {
    pub fn approval_error(&self) -> Option<&ApprovalError> {
        match self {
            Self::Approval(error) | Self::Domain(DomainError::Approval(error)) => Some(error),
            _ => None,
        }
    }
}

impl From<ServiceError> for ApplicationError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::RequestNotFound(id) => Self::NotFound(id.0),
            ServiceError::Approval(error) => Self::from(error),
            ServiceError::Domain(error) => Self::Domain(error),
            ServiceError::Repository(error) => Self::Persistence(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use hrflow_core::domain::approval::ApprovalId;
    use hrflow_core::domain::request_type::RequestType;
    use hrflow_core::errors::{ApplicationError, InterfaceError};
    use hrflow_core::workflow::ApprovalError;

    use super::ServiceError;
    use crate::repositories::RepositoryError;

    #[test]
    fn service_errors_map_onto_interface_classes() {
        let missing: ApplicationError =
            ServiceError::RequestNotFound(ApprovalId("REQ-404".to_string())).into();
        assert!(matches!(missing.into_interface("c-1"), InterfaceError::NotFound { .. }));

        let raced: ApplicationError = ServiceError::from(ApprovalError::AlreadyProcessed {
            request_type: RequestType::Leave,
            detail: "state changed".to_string(),
        })
        .into();
        assert!(matches!(raced.into_interface("c-2"), InterfaceError::Conflict { .. }));

        let storage: ApplicationError =
            ServiceError::Repository(RepositoryError::Decode("bad row".to_string())).into();
        assert!(matches!(storage.into_interface("c-3"), InterfaceError::ServiceUnavailable { .. }));
    }
}
