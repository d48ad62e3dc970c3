use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use hrflow_core::domain::approval::{ApprovalId, ApprovalRecord, ApprovalState, TransStatus};
use hrflow_core::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
use hrflow_core::domain::payload::RequestPayload;
use hrflow_core::domain::request_type::RequestType;
use hrflow_core::workflow::AuthorizationGrant;

use super::{decode_error, parse_timestamp, parse_u32, RepositoryError};
use crate::DbPool;

const RECORD_COLUMNS: &str = "id, request_type, employee_no, department_code, project_code,
    payload_json, trans_status, next_approver, next_app_level, next_app_level_name,
    rejection_reason, state_version, submitted_by, created_at, updated_at";

/// One persisted state change of a request, including how it was authorized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalTransition {
    pub id: String,
    pub request_id: ApprovalId,
    pub from_status: Option<TransStatus>,
    pub from_level: Option<u32>,
    pub to_status: TransStatus,
    pub to_level: Option<u32>,
    pub to_approver: Option<EmployeeId>,
    pub actor: String,
    pub grant: Option<AuthorizationGrant>,
    pub reason: Option<String>,
    pub correlation_id: String,
    pub occurred_at: DateTime<Utc>,
}

pub struct SqlApprovalRequestRepository {
    pool: DbPool,
}

impl SqlApprovalRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn transitions(
        &self,
        request_id: &ApprovalId,
    ) -> Result<Vec<ApprovalTransition>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, request_id, from_status, from_level, to_status, to_level, to_approver,
                    actor, grant_kind, reason, correlation_id, occurred_at
             FROM approval_transition_audit
             WHERE request_id = ?
             ORDER BY occurred_at ASC, rowid ASC",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transition_from_row).collect()
    }

    /// Pending requests whose current level has not moved since `updated_before`,
    /// oldest first.
    pub async fn list_stale_pending(
        &self,
        updated_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM approval_request
             WHERE trans_status = 'pending' AND updated_at < ?
             ORDER BY updated_at ASC
             LIMIT ?"
        ))
        .bind(updated_before.to_rfc3339())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

pub(crate) async fn fetch_record(
    conn: &mut SqliteConnection,
    id: &ApprovalId,
) -> Result<Option<ApprovalRecord>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM approval_request WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(record_from_row).transpose()
}

pub(crate) async fn insert_record(
    conn: &mut SqliteConnection,
    record: &ApprovalRecord,
) -> Result<(), RepositoryError> {
    let payload_json =
        serde_json::to_string(&record.payload).map_err(|error| decode_error("payload", error))?;

    sqlx::query(
        "INSERT INTO approval_request (
            id, request_type, employee_no, department_code, project_code,
            payload_json, trans_status, next_approver, next_app_level, next_app_level_name,
            rejection_reason, state_version, submitted_by, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id.0)
    .bind(record.request_type().as_str())
    .bind(&record.employee_no.0)
    .bind(record.department_code.as_ref().map(|code| code.0.as_str()))
    .bind(record.project_code.as_ref().map(|code| code.0.as_str()))
    .bind(payload_json)
    .bind(record.state.trans_status().as_str())
    .bind(record.state.next_approver().map(EmployeeId::as_str))
    .bind(record.state.next_level().map(i64::from))
    .bind(record.state.next_level_name())
    .bind(record.state.rejection_reason())
    .bind(i64::from(record.state_version))
    .bind(&record.submitted_by)
    .bind(record.created_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn compare_and_swap_state(
    conn: &mut SqliteConnection,
    id: &ApprovalId,
    expected_version: u32,
    state: &ApprovalState,
    updated_at: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE approval_request
         SET trans_status = ?,
             next_approver = ?,
             next_app_level = ?,
             next_app_level_name = ?,
             rejection_reason = ?,
             state_version = state_version + 1,
             updated_at = ?
         WHERE id = ? AND state_version = ?",
    )
    .bind(state.trans_status().as_str())
    .bind(state.next_approver().map(EmployeeId::as_str))
    .bind(state.next_level().map(i64::from))
    .bind(state.next_level_name())
    .bind(state.rejection_reason())
    .bind(updated_at.to_rfc3339())
    .bind(&id.0)
    .bind(i64::from(expected_version))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn append_transition(
    conn: &mut SqliteConnection,
    transition: &ApprovalTransition,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO approval_transition_audit (
            id, request_id, from_status, from_level, to_status, to_level, to_approver,
            actor, grant_kind, reason, correlation_id, occurred_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&transition.id)
    .bind(&transition.request_id.0)
    .bind(transition.from_status.map(|status| status.as_str()))
    .bind(transition.from_level.map(i64::from))
    .bind(transition.to_status.as_str())
    .bind(transition.to_level.map(i64::from))
    .bind(transition.to_approver.as_ref().map(EmployeeId::as_str))
    .bind(&transition.actor)
    .bind(transition.grant.map(|grant| grant.as_str()))
    .bind(transition.reason.as_deref())
    .bind(&transition.correlation_id)
    .bind(transition.occurred_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) fn record_from_row(row: &SqliteRow) -> Result<ApprovalRecord, RepositoryError> {
    let request_type_code: String = row.try_get("request_type")?;
    let request_type = RequestType::parse(&request_type_code)
        .ok_or_else(|| decode_error("request_type", &request_type_code))?;

    let payload_json: String = row.try_get("payload_json")?;
    let payload: RequestPayload =
        serde_json::from_str(&payload_json).map_err(|error| decode_error("payload_json", error))?;
    if payload.request_type() != request_type {
        return Err(RepositoryError::Decode(format!(
            "payload kind {} does not match request_type {request_type}",
            payload.request_type()
        )));
    }

    let status_raw: String = row.try_get("trans_status")?;
    let status =
        TransStatus::parse(&status_raw).ok_or_else(|| decode_error("trans_status", &status_raw))?;
    let next_level = row
        .try_get::<Option<i64>, _>("next_app_level")?
        .map(|level| parse_u32("next_app_level", level))
        .transpose()?;
    let state = ApprovalState::from_columns(
        status,
        row.try_get::<Option<String>, _>("next_approver")?.map(EmployeeId),
        next_level,
        row.try_get("next_app_level_name")?,
        row.try_get("rejection_reason")?,
    )
    .map_err(RepositoryError::Decode)?;

    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ApprovalRecord {
        id: ApprovalId(row.try_get("id")?),
        employee_no: EmployeeId(row.try_get("employee_no")?),
        department_code: row.try_get::<Option<String>, _>("department_code")?.map(DepartmentCode),
        project_code: row.try_get::<Option<String>, _>("project_code")?.map(ProjectCode),
        payload,
        state,
        state_version: parse_u32("state_version", row.try_get("state_version")?)?,
        submitted_by: row.try_get("submitted_by")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn transition_from_row(row: &SqliteRow) -> Result<ApprovalTransition, RepositoryError> {
    let parse_status = |column: &str, raw: String| {
        TransStatus::parse(&raw).ok_or_else(|| decode_error(column, &raw))
    };
    let from_status = row
        .try_get::<Option<String>, _>("from_status")?
        .map(|raw| parse_status("from_status", raw))
        .transpose()?;
    let grant = row
        .try_get::<Option<String>, _>("grant_kind")?
        .map(|raw| AuthorizationGrant::parse(&raw).ok_or_else(|| decode_error("grant_kind", &raw)))
        .transpose()?;
    let occurred_at: String = row.try_get("occurred_at")?;

    Ok(ApprovalTransition {
        id: row.try_get("id")?,
        request_id: ApprovalId(row.try_get("request_id")?),
        from_status,
        from_level: row
            .try_get::<Option<i64>, _>("from_level")?
            .map(|level| parse_u32("from_level", level))
            .transpose()?,
        to_status: parse_status("to_status", row.try_get("to_status")?)?,
        to_level: row
            .try_get::<Option<i64>, _>("to_level")?
            .map(|level| parse_u32("to_level", level))
            .transpose()?,
        to_approver: row.try_get::<Option<String>, _>("to_approver")?.map(EmployeeId),
        actor: row.try_get("actor")?,
        grant,
        reason: row.try_get("reason")?,
        correlation_id: row.try_get("correlation_id")?,
        occurred_at: parse_timestamp("occurred_at", &occurred_at)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use hrflow_core::domain::approval::{ApprovalId, ApprovalRecord, ApprovalState};
    use hrflow_core::domain::employee::{DepartmentCode, EmployeeId, ProjectCode};
    use hrflow_core::domain::payload::{LeaveRequest, RequestPayload};

    use super::{compare_and_swap_state, fetch_record, insert_record, SqlApprovalRequestRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn leave_record(id: &str, approver: &str, hours_ago: i64) -> ApprovalRecord {
        let at = Utc.with_ymd_and_hms(2026, 10, 10, 12, 0, 0).single().expect("timestamp")
            - Duration::hours(hours_ago);
        ApprovalRecord {
            id: ApprovalId(id.to_string()),
            employee_no: EmployeeId::new("100"),
            department_code: Some(DepartmentCode::new("5")),
            project_code: Some(ProjectCode::new("9")),
            payload: RequestPayload::Leave(LeaveRequest {
                leave_type: "annual".to_string(),
                start_date: NaiveDate::from_ymd_opt(2026, 11, 2).expect("date"),
                end_date: NaiveDate::from_ymd_opt(2026, 11, 4).expect("date"),
                days: Decimal::from(3),
            }),
            state: ApprovalState::Pending {
                level: 1,
                approver: EmployeeId::new(approver),
                level_name: Some("Project Manager".to_string()),
            },
            state_version: 1,
            submitted_by: "100".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_preserve_state_columns() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.expect("conn");
        let record = leave_record("REQ-1", "PM-9", 0);

        insert_record(&mut conn, &record).await.expect("insert");
        let loaded = fetch_record(&mut conn, &record.id).await.expect("fetch").expect("exists");

        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn stale_version_write_is_refused() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.expect("conn");
        let record = leave_record("REQ-2", "PM-9", 0);
        insert_record(&mut conn, &record).await.expect("insert");

        let now = Utc::now();
        let first = compare_and_swap_state(&mut conn, &record.id, 1, &ApprovalState::Approved, now)
            .await
            .expect("first write");
        let second = compare_and_swap_state(
            &mut conn,
            &record.id,
            1,
            &ApprovalState::Rejected { reason: "late".to_string() },
            now,
        )
        .await
        .expect("second write");

        assert!(first);
        assert!(!second);
        let stored = fetch_record(&mut conn, &record.id).await.expect("fetch").expect("exists");
        assert_eq!(stored.state, ApprovalState::Approved);
        assert_eq!(stored.state_version, 2);
    }

    #[tokio::test]
    async fn stale_query_returns_only_requests_older_than_cutoff() {
        let pool = setup().await;
        {
            let mut conn = pool.acquire().await.expect("conn");
            for (id, approver, hours_ago) in
                [("REQ-OLD", "PM-9", 72), ("REQ-NEW", "PM-9", 1), ("REQ-OTHER", "HR-1", 1)]
            {
                insert_record(&mut conn, &leave_record(id, approver, hours_ago))
                    .await
                    .expect("insert");
            }
        }

        let cutoff = Utc.with_ymd_and_hms(2026, 10, 10, 12, 0, 0).single().expect("timestamp")
            - Duration::hours(48);
        let stale = SqlApprovalRequestRepository::new(pool)
            .list_stale_pending(cutoff, 10)
            .await
            .expect("list stale");
        assert_eq!(stale.iter().map(|r| r.id.0.as_str()).collect::<Vec<_>>(), vec!["REQ-OLD"]);
    }
}
