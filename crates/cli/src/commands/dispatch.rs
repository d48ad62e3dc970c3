use crate::commands::{service_failure, with_database, CommandResult};
use hrflow_db::repositories::SqlOutboxRepository;
use hrflow_db::{OutboxDispatcher, TracingNotificationPublisher};

pub fn run() -> CommandResult {
    let result = with_database("dispatch", |config, pool| async move {
        let dispatcher = OutboxDispatcher::new(
            SqlOutboxRepository::new(pool),
            TracingNotificationPublisher,
            &config.outbox,
        );
        let report = dispatcher
            .dispatch_once()
            .await
            .map_err(|error| service_failure("dispatch", error))?;
        Ok(report)
    });

    match result {
        Ok(report) => CommandResult::success(
            "dispatch",
            format!(
                "outbox batch: {} delivered, {} retried, {} dead",
                report.delivered, report.retried, report.dead
            ),
        ),
        Err(failure) => failure,
    }
}
