pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod notification;
pub mod workflow;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::approval::{
    ApprovalId, ApprovalRecord, ApprovalState, RequestContext, TransStatus,
};
pub use domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
pub use domain::notification::{NotificationEvent, NotificationPriority, OutboxEntry};
pub use domain::payload::RequestPayload;
pub use domain::request_type::RequestType;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{plan_finalize, FinalizeEffect};
pub use notification::{NotificationError, NotificationPublisher};
pub use workflow::{
    ApprovalChainCatalog, ApprovalChainConfig, ApprovalChainStep, ApprovalError,
    ApprovalWorkflowEngine, ApproverRule, AuthorizationBypass, AuthorizationGrant,
    InMemoryOrgDirectory, OrgDirectory,
};
