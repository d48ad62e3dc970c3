use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use hrflow_core::domain::notification::{NotificationEvent, OutboxEntry, OutboxEntryId};

use super::{OutboxRepository, OutboxStatus, RepositoryError};

#[derive(Default)]
pub struct InMemoryOutboxRepository {
    entries: RwLock<Vec<(OutboxEntry, OutboxStatus)>>,
}

impl InMemoryOutboxRepository {
    pub async fn status_of(&self, id: &OutboxEntryId) -> Option<OutboxStatus> {
        let entries = self.entries.read().await;
        entries.iter().find(|(entry, _)| &entry.id == id).map(|(_, status)| *status)
    }
}

#[async_trait::async_trait]
impl OutboxRepository for InMemoryOutboxRepository {
    async fn enqueue(
        &self,
        event: &NotificationEvent,
        created_at: DateTime<Utc>,
    ) -> Result<OutboxEntryId, RepositoryError> {
        let id = OutboxEntryId(Uuid::new_v4().to_string());
        let entry = OutboxEntry {
            id: id.clone(),
            event: event.clone(),
            attempts: 0,
            last_error: None,
            created_at,
            delivered_at: None,
        };
        self.entries.write().await.push((entry, OutboxStatus::Pending));
        Ok(id)
    }

    async fn fetch_pending(&self, limit: u32) -> Result<Vec<OutboxEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(_, status)| *status == OutboxStatus::Pending)
            .take(limit as usize)
            .map(|(entry, _)| entry.clone())
            .collect())
    }

    async fn mark_delivered(
        &self,
        id: &OutboxEntryId,
        delivered_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        if let Some((entry, status)) = entries.iter_mut().find(|(entry, _)| &entry.id == id) {
            entry.attempts += 1;
            entry.delivered_at = Some(delivered_at);
            entry.last_error = None;
            *status = OutboxStatus::Delivered;
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: &OutboxEntryId,
        error: &str,
        max_attempts: u32,
    ) -> Result<OutboxStatus, RepositoryError> {
        let mut entries = self.entries.write().await;
        let Some((entry, status)) = entries.iter_mut().find(|(entry, _)| &entry.id == id) else {
            return Err(RepositoryError::Decode(format!("unknown outbox entry {}", id.0)));
        };
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        if entry.attempts >= max_attempts {
            *status = OutboxStatus::Dead;
        }
        Ok(*status)
    }
}
