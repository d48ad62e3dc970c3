use std::sync::Arc;

use chrono::Utc;

use crate::commands::{service_failure, with_database, CommandResult};
use hrflow_db::repositories::SqlApprovalChainRepository;
use hrflow_db::{ApprovalService, TracingAuditSink};

pub fn run() -> CommandResult {
    let result = with_database("sweep", |config, pool| async move {
        let catalog = SqlApprovalChainRepository::new(pool.clone())
            .load_catalog()
            .await
            .map_err(|error| ("catalog_load", error.to_string(), 6u8))?;
        let service =
            ApprovalService::new(pool, Arc::new(catalog), config.workflow, Arc::new(TracingAuditSink));
        let report = service
            .sweep_stale(Utc::now())
            .await
            .map_err(|error| service_failure("sweep", error))?;
        Ok(report)
    });

    match result {
        Ok(report) => CommandResult::success(
            "sweep",
            format!(
                "examined {} stale request(s): {} advanced, {} fully approved, {} failed",
                report.examined, report.advanced, report.approved, report.failed
            ),
        ),
        Err(failure) => failure,
    }
}
