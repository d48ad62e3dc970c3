use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use hrflow_core::domain::notification::{NotificationEvent, OutboxEntry, OutboxEntryId};
use hrflow_core::workflow::ApprovalError;

pub mod alert;
pub mod approval;
pub mod chain;
pub mod ledger;
pub mod memory;
pub mod org;
pub mod outbox;

pub use alert::{OvertimeAlert, SqlAlertLedgerRepository};
pub use approval::{ApprovalTransition, SqlApprovalRequestRepository};
pub use chain::SqlApprovalChainRepository;
pub use ledger::{SqlHrLedgerRepository, StoredInstallment};
pub use memory::InMemoryOutboxRepository;
pub use org::{DepartmentRow, ProjectRow, SqlOrgDirectoryRepository};
pub use outbox::{OutboxStatus, SqlOutboxRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Invalid(#[from] ApprovalError),
}

impl From<sqlx::Error> for CatalogLoadError {
    fn from(value: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(value))
    }
}

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(
        &self,
        event: &NotificationEvent,
        created_at: DateTime<Utc>,
    ) -> Result<OutboxEntryId, RepositoryError>;

    async fn fetch_pending(&self, limit: u32) -> Result<Vec<OutboxEntry>, RepositoryError>;

    async fn mark_delivered(
        &self,
        id: &OutboxEntryId,
        delivered_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Bumps the attempt counter; the entry is parked as dead once it reaches
    /// `max_attempts`.
    async fn record_failure(
        &self,
        id: &OutboxEntryId,
        error: &str,
        max_attempts: u32,
    ) -> Result<OutboxStatus, RepositoryError>;
}

pub(crate) fn decode_error(column: &str, error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(format!("invalid {column}: {error}"))
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| decode_error(column, error))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|raw| parse_timestamp(column, &raw)).transpose()
}

pub(crate) fn parse_date(column: &str, value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| decode_error(column, error))
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| decode_error(column, error))
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|error| decode_error(column, error))
}
