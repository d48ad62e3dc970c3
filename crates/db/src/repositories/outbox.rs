use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use uuid::Uuid;

use hrflow_core::domain::employee::EmployeeId;
use hrflow_core::domain::notification::{
    NotificationEvent, NotificationPriority, OutboxEntry, OutboxEntryId,
};

use super::{
    decode_error, parse_optional_timestamp, parse_timestamp, parse_u32, OutboxRepository,
    RepositoryError,
};
use crate::DbPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Delivered,
    Dead,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Dead => "dead",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "delivered" => Some(Self::Delivered),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }
}

pub struct SqlOutboxRepository {
    pool: DbPool,
}

impl SqlOutboxRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn count_by_status(&self) -> Result<BTreeMap<String, i64>, RepositoryError> {
        let rows =
            sqlx::query("SELECT status, COUNT(*) AS count FROM notification_outbox GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| -> Result<(String, i64), RepositoryError> {
                Ok((row.try_get("status")?, row.try_get("count")?))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl OutboxRepository for SqlOutboxRepository {
    async fn enqueue(
        &self,
        event: &NotificationEvent,
        created_at: DateTime<Utc>,
    ) -> Result<OutboxEntryId, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        enqueue(&mut conn, event, created_at).await
    }

    async fn fetch_pending(&self, limit: u32) -> Result<Vec<OutboxEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, event_type, recipient_employee_no, priority, entity_type, entity_id,
                    variables_json, attempts, last_error, created_at, delivered_at
             FROM notification_outbox
             WHERE status = 'pending'
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn mark_delivered(
        &self,
        id: &OutboxEntryId,
        delivered_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE notification_outbox
             SET status = 'delivered', delivered_at = ?, attempts = attempts + 1, last_error = NULL
             WHERE id = ?",
        )
        .bind(delivered_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_failure(
        &self,
        id: &OutboxEntryId,
        error: &str,
        max_attempts: u32,
    ) -> Result<OutboxStatus, RepositoryError> {
        let row = sqlx::query(
            "UPDATE notification_outbox
             SET attempts = attempts + 1,
                 last_error = ?,
                 status = CASE WHEN attempts + 1 >= ? THEN 'dead' ELSE 'pending' END
             WHERE id = ?
             RETURNING status",
        )
        .bind(error)
        .bind(i64::from(max_attempts))
        .bind(&id.0)
        .fetch_one(&self.pool)
        .await?;

        let status: String = row.try_get("status")?;
        OutboxStatus::parse(&status).ok_or_else(|| decode_error("status", status))
    }
}

/// Writes a notification fact on the caller's connection, so it commits or
/// rolls back with the surrounding business transaction.
pub(crate) async fn enqueue(
    conn: &mut SqliteConnection,
    event: &NotificationEvent,
    created_at: DateTime<Utc>,
) -> Result<OutboxEntryId, RepositoryError> {
    let id = OutboxEntryId(Uuid::new_v4().to_string());
    let variables_json = serde_json::to_string(&event.variables)
        .map_err(|error| decode_error("variables", error))?;

    sqlx::query(
        "INSERT INTO notification_outbox (
            id, event_type, recipient_employee_no, priority, entity_type, entity_id,
            variables_json, status, attempts, created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?)",
    )
    .bind(&id.0)
    .bind(&event.event_type)
    .bind(&event.recipient_employee_no.0)
    .bind(event.priority.as_str())
    .bind(&event.entity_type)
    .bind(&event.entity_id)
    .bind(variables_json)
    .bind(created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

fn entry_from_row(row: &SqliteRow) -> Result<OutboxEntry, RepositoryError> {
    let priority_raw: String = row.try_get("priority")?;
    let priority = NotificationPriority::parse(&priority_raw)
        .ok_or_else(|| decode_error("priority", &priority_raw))?;
    let variables_json: String = row.try_get("variables_json")?;
    let variables: BTreeMap<String, String> = serde_json::from_str(&variables_json)
        .map_err(|error| decode_error("variables_json", error))?;
    let created_at: String = row.try_get("created_at")?;

    Ok(OutboxEntry {
        id: OutboxEntryId(row.try_get("id")?),
        event: NotificationEvent {
            event_type: row.try_get("event_type")?,
            recipient_employee_no: EmployeeId(row.try_get("recipient_employee_no")?),
            priority,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            variables,
        },
        attempts: parse_u32("attempts", row.try_get("attempts")?)?,
        last_error: row.try_get("last_error")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        delivered_at: parse_optional_timestamp("delivered_at", row.try_get("delivered_at")?)?,
    })
}
