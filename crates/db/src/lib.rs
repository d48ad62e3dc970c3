pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod services;
pub mod telemetry;

pub use connection::{begin_write, connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{ChainSeedInfo, DemoSeedDataset, SeedResult, VerificationResult};
pub use services::{
    ApprovalOutcome, ApprovalService, DispatchReport, OutboxDispatcher, OvertimeAlertJob,
    OvertimeReport, ServiceError, SubmitRequest, SweepReport,
};
pub use telemetry::{TracingAuditSink, TracingNotificationPublisher};
