use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalRecord, ApprovalState};
use crate::domain::employee::EmployeeId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboxEntryId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub event_type: String,
    pub recipient_employee_no: EmployeeId,
    pub priority: NotificationPriority,
    pub entity_type: String,
    pub entity_id: String,
    pub variables: BTreeMap<String, String>,
}

impl NotificationEvent {
    pub fn new(
        event_type: impl Into<String>,
        recipient_employee_no: EmployeeId,
        priority: NotificationPriority,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            recipient_employee_no,
            priority,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Notification owed after `record` reached its current state: the next
    /// approver when pending, the requester once terminal.
    pub fn for_transition(record: &ApprovalRecord) -> Self {
        let request_type = record.request_type();
        let (event_type, recipient, priority) = match &record.state {
            ApprovalState::Pending { approver, .. } => {
                ("approval.pending", approver.clone(), NotificationPriority::Normal)
            }
            ApprovalState::Approved => {
                ("approval.approved", record.employee_no.clone(), NotificationPriority::Normal)
            }
            ApprovalState::Rejected { .. } => {
                ("approval.rejected", record.employee_no.clone(), NotificationPriority::High)
            }
        };

        let mut event = Self::new(
            event_type,
            recipient,
            priority,
            request_type.entity_type(),
            record.id.0.clone(),
        )
        .with_variable("request_type", request_type.as_str())
        .with_variable("requester", record.employee_no.as_str());

        if let Some(level) = record.state.next_level() {
            event = event.with_variable("level", level.to_string());
        }
        if let Some(level_name) = record.state.next_level_name() {
            event = event.with_variable("level_name", level_name);
        }
        if let Some(reason) = record.state.rejection_reason() {
            event = event.with_variable("reason", reason);
        }
        event
    }
}

/// Durable "state changed" fact written in the business transaction and
/// drained later by the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: OutboxEntryId,
    pub event: NotificationEvent,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}
