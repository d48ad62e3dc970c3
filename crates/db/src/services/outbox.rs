use chrono::Utc;
use tracing::{info, warn};

use hrflow_core::config::OutboxConfig;
use hrflow_core::notification::NotificationPublisher;

use crate::repositories::{OutboxRepository, OutboxStatus, RepositoryError};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead: usize,
}

/// Drains pending outbox rows into a publisher. Publish failures are logged
/// and counted against the row, never propagated.
pub struct OutboxDispatcher<R, P> {
    repository: R,
    publisher: P,
    batch_size: u32,
    max_attempts: u32,
}

impl<R, P> OutboxDispatcher<R, P>
where
    R: OutboxRepository,
    P: NotificationPublisher,
{
    pub fn new(repository: R, publisher: P, config: &OutboxConfig) -> Self {
        Self {
            repository,
            publisher,
            batch_size: config.batch_size,
            max_attempts: config.max_attempts,
        }
    }

    pub async fn dispatch_once(&self) -> Result<DispatchReport, RepositoryError> {
        let mut report = DispatchReport::default();

        for entry in self.repository.fetch_pending(self.batch_size).await? {
            match self.publisher.publish(&entry.event).await {
                Ok(()) => {
                    self.repository.mark_delivered(&entry.id, Utc::now()).await?;
                    report.delivered += 1;
                }
                Err(error) => {
                    let status = self
                        .repository
                        .record_failure(&entry.id, &error.to_string(), self.max_attempts)
                        .await?;
                    warn!(
                        event_name = "notification.delivery_failed",
                        correlation_id = %entry.event.entity_id,
                        outbox_id = %entry.id.0,
                        event_type = %entry.event.event_type,
                        attempts = entry.attempts + 1,
                        parked = status == OutboxStatus::Dead,
                        error = %error,
                        "notification delivery failed"
                    );
                    match status {
                        OutboxStatus::Dead => report.dead += 1,
                        OutboxStatus::Pending | OutboxStatus::Delivered => report.retried += 1,
                    }
                }
            }
        }

        if report != DispatchReport::default() {
            info!(
                event_name = "notification.dispatch.completed",
                correlation_id = "outbox",
                delivered = report.delivered,
                retried = report.retried,
                dead = report.dead,
                "outbox batch dispatched"
            );
        }
        Ok(report)
    }
}
