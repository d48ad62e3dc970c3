use async_trait::async_trait;
use tracing::{info, warn};

use hrflow_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use hrflow_core::domain::notification::NotificationEvent;
use hrflow_core::notification::{NotificationError, NotificationPublisher};

/// Writes audit events to the structured log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let request_id = event.request_id.as_ref().map(|id| id.0.as_str()).unwrap_or("none");
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        match event.outcome {
            AuditOutcome::Success => info!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                request_id,
                request_type = event.request_type.as_str(),
                actor = %event.actor,
                category = ?event.category,
                metadata = %metadata,
                "audit event"
            ),
            AuditOutcome::Rejected | AuditOutcome::Failed => warn!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                request_id,
                request_type = event.request_type.as_str(),
                actor = %event.actor,
                category = ?event.category,
                outcome = ?event.outcome,
                metadata = %metadata,
                "audit event"
            ),
        }
    }
}

/// Delivery channel that only logs. Stands in until a mail or push channel
/// is wired behind `NotificationPublisher`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotificationPublisher;

#[async_trait]
impl NotificationPublisher for TracingNotificationPublisher {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        info!(
            event_name = "notification.published",
            correlation_id = %event.entity_id,
            notification_type = %event.event_type,
            recipient = %event.recipient_employee_no,
            priority = event.priority.as_str(),
            entity_type = %event.entity_type,
            "notification delivered to log channel"
        );
        Ok(())
    }
}
