use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqliteConnection};

use hrflow_core::domain::employee::EmployeeId;
use hrflow_core::flows::WorkedDay;

use super::{decode_error, RepositoryError};
use crate::DbPool;

pub(crate) const TIME_FORMAT: &str = "%H:%M:%S";

/// One overtime threshold crossed by one employee in one `YYYY-MM` month.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OvertimeAlert {
    pub employee_no: EmployeeId,
    pub month: String,
    pub threshold_hours: u32,
    pub total_hours: Decimal,
}

/// Dedup ledger for overtime alerts plus the attendance reads that feed it.
pub struct SqlAlertLedgerRepository {
    pool: DbPool,
}

impl SqlAlertLedgerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record_attendance(
        &self,
        employee_no: &EmployeeId,
        work_date: NaiveDate,
        check_in: NaiveTime,
        check_out: NaiveTime,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_attendance(&mut conn, employee_no, work_date, check_in, check_out, "device", None)
            .await
    }

    pub async fn attendance_for_month(
        &self,
        month: &str,
    ) -> Result<Vec<WorkedDay>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        attendance_for_month(&mut conn, month).await
    }

    pub async fn alerts_for_month(&self, month: &str) -> Result<Vec<OvertimeAlert>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT employee_no, month, threshold_hours, total_hours
             FROM alert_ledger
             WHERE month = ?
             ORDER BY employee_no ASC, threshold_hours ASC",
        )
        .bind(month)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let total: String = row.try_get("total_hours")?;
                Ok(OvertimeAlert {
                    employee_no: EmployeeId(row.try_get("employee_no")?),
                    month: row.try_get("month")?,
                    threshold_hours: super::parse_u32(
                        "threshold_hours",
                        row.try_get("threshold_hours")?,
                    )?,
                    total_hours: super::parse_decimal("total_hours", &total)?,
                })
            })
            .collect()
    }
}

/// Inserts the ledger row unless this (employee, month, threshold) was already
/// alerted. Returns `true` only for the first caller.
pub(crate) async fn record_if_new(
    conn: &mut SqliteConnection,
    alert: &OvertimeAlert,
    raised_at: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO alert_ledger (employee_no, month, threshold_hours, total_hours, raised_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(alert.employee_no.as_str())
    .bind(&alert.month)
    .bind(i64::from(alert.threshold_hours))
    .bind(alert.total_hours.to_string())
    .bind(raised_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn insert_attendance(
    conn: &mut SqliteConnection,
    employee_no: &EmployeeId,
    work_date: NaiveDate,
    check_in: NaiveTime,
    check_out: NaiveTime,
    source: &str,
    request_id: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO attendance_record (
            id, employee_no, work_date, check_in, check_out, source, request_id, created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(employee_no.as_str())
    .bind(work_date.format("%Y-%m-%d").to_string())
    .bind(check_in.format(TIME_FORMAT).to_string())
    .bind(check_out.format(TIME_FORMAT).to_string())
    .bind(source)
    .bind(request_id)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn attendance_for_month(
    conn: &mut SqliteConnection,
    month: &str,
) -> Result<Vec<WorkedDay>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT employee_no, check_in, check_out
         FROM attendance_record
         WHERE substr(work_date, 1, 7) = ?
         ORDER BY work_date ASC, employee_no ASC",
    )
    .bind(month)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let check_in: String = row.try_get("check_in")?;
            let check_out: String = row.try_get("check_out")?;
            Ok(WorkedDay {
                employee_no: EmployeeId(row.try_get("employee_no")?),
                check_in: parse_time("check_in", &check_in)?,
                check_out: parse_time("check_out", &check_out)?,
            })
        })
        .collect()
}

fn parse_time(column: &str, value: &str) -> Result<NaiveTime, RepositoryError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|error| decode_error(column, error))
}
