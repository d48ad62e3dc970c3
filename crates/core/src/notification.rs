use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::notification::NotificationEvent;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
    #[error("notification rejected by channel: {0}")]
    Rejected(String),
}

/// Delivery side of the outbox. Failures are retried by the dispatcher and
/// never reach the approval transaction.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotificationError>;
}

#[async_trait]
impl<T> NotificationPublisher for Arc<T>
where
    T: NotificationPublisher + ?Sized,
{
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        (**self).publish(event).await
    }
}

/// Records published events; can be told to fail the next N publishes.
#[derive(Clone, Default)]
pub struct InMemoryNotificationPublisher {
    published: Arc<Mutex<Vec<NotificationEvent>>>,
    failures_remaining: Arc<Mutex<u32>>,
}

impl InMemoryNotificationPublisher {
    pub fn failing(times: u32) -> Self {
        let publisher = Self::default();
        publisher.fail_next(times);
        publisher
    }

    pub fn fail_next(&self, times: u32) {
        match self.failures_remaining.lock() {
            Ok(mut remaining) => *remaining = times,
            Err(poisoned) => *poisoned.into_inner() = times,
        }
    }

    pub fn published(&self) -> Vec<NotificationEvent> {
        match self.published.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn take_failure(&self) -> bool {
        let mut remaining = match self.failures_remaining.lock() {
            Ok(remaining) => remaining,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *remaining == 0 {
            return false;
        }
        *remaining -= 1;
        true
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryNotificationPublisher {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        if self.take_failure() {
            return Err(NotificationError::Unavailable("simulated outage".to_string()));
        }
        match self.published.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(())
    }
}
