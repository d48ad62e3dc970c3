pub mod chain;
pub mod engine;
pub mod resolver;

pub use chain::{ApprovalChainCatalog, ApprovalChainConfig, ApprovalChainStep, ApproverRule};
pub use engine::{ApprovalError, ApprovalWorkflowEngine, AuthorizationBypass, AuthorizationGrant};
pub use resolver::{ApproverResolver, InMemoryOrgDirectory, OrgDirectory, ResolutionFailure};
