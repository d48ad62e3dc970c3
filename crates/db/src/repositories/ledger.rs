use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqliteConnection};

use hrflow_core::domain::approval::ApprovalId;
use hrflow_core::domain::employee::{EmployeeId, ProjectCode};
use hrflow_core::flows::Installment;

use super::{parse_date, parse_decimal, parse_u32, RepositoryError};
use crate::DbPool;

/// Installment row as stored, including whether it was already paid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredInstallment {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub paid: bool,
}

/// HR ledger tables written by finalize effects: leave balances, loan
/// schedules and project assignments.
pub struct SqlHrLedgerRepository {
    pool: DbPool,
}

impl SqlHrLedgerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn set_leave_balance(
        &self,
        employee_no: &EmployeeId,
        leave_type: &str,
        days: Decimal,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        write_leave_balance(&mut conn, employee_no, leave_type, days).await
    }

    pub async fn leave_balance(
        &self,
        employee_no: &EmployeeId,
        leave_type: &str,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        read_leave_balance(&mut conn, employee_no, leave_type).await
    }

    pub async fn installments(
        &self,
        loan_id: &ApprovalId,
    ) -> Result<Vec<StoredInstallment>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        read_installments(&mut conn, loan_id).await
    }

    pub async fn assignment(
        &self,
        employee_no: &EmployeeId,
    ) -> Result<Option<ProjectCode>, RepositoryError> {
        let row = sqlx::query("SELECT project_code FROM employee_assignment WHERE employee_no = ?")
            .bind(employee_no.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get("project_code").map(ProjectCode))
            .transpose()
            .map_err(RepositoryError::from)
    }
}

pub(crate) async fn read_leave_balance(
    conn: &mut SqliteConnection,
    employee_no: &EmployeeId,
    leave_type: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    let row = sqlx::query(
        "SELECT days_remaining FROM leave_balance WHERE employee_no = ? AND leave_type = ?",
    )
    .bind(employee_no.as_str())
    .bind(leave_type)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let raw: String = row.try_get("days_remaining")?;
            parse_decimal("days_remaining", &raw).map(Some)
        }
        None => Ok(None),
    }
}

pub(crate) async fn write_leave_balance(
    conn: &mut SqliteConnection,
    employee_no: &EmployeeId,
    leave_type: &str,
    days: Decimal,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO leave_balance (employee_no, leave_type, days_remaining, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(employee_no, leave_type) DO UPDATE SET
            days_remaining = excluded.days_remaining,
            updated_at = excluded.updated_at",
    )
    .bind(employee_no.as_str())
    .bind(leave_type)
    .bind(days.to_string())
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_loan(
    conn: &mut SqliteConnection,
    loan_id: &ApprovalId,
    employee_no: &EmployeeId,
    principal: Decimal,
    installments: &[Installment],
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO loan (id, employee_no, principal, installment_count, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&loan_id.0)
    .bind(employee_no.as_str())
    .bind(principal.to_string())
    .bind(installments.len() as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    for installment in installments {
        sqlx::query(
            "INSERT INTO loan_installment (loan_id, sequence, due_date, amount, paid)
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(&loan_id.0)
        .bind(i64::from(installment.sequence))
        .bind(installment.due_date.format("%Y-%m-%d").to_string())
        .bind(installment.amount.to_string())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub(crate) async fn read_installments(
    conn: &mut SqliteConnection,
    loan_id: &ApprovalId,
) -> Result<Vec<StoredInstallment>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT sequence, due_date, amount, paid
         FROM loan_installment
         WHERE loan_id = ?
         ORDER BY sequence ASC",
    )
    .bind(&loan_id.0)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let due_date: String = row.try_get("due_date")?;
            let amount: String = row.try_get("amount")?;
            let paid: i64 = row.try_get("paid")?;
            Ok(StoredInstallment {
                sequence: parse_u32("sequence", row.try_get("sequence")?)?,
                due_date: parse_date("due_date", &due_date)?,
                amount: parse_decimal("amount", &amount)?,
                paid: paid != 0,
            })
        })
        .collect()
}

pub(crate) async fn reschedule_installment(
    conn: &mut SqliteConnection,
    loan_id: &ApprovalId,
    sequence: u32,
    due_date: NaiveDate,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE loan_installment SET due_date = ? WHERE loan_id = ? AND sequence = ?")
        .bind(due_date.format("%Y-%m-%d").to_string())
        .bind(&loan_id.0)
        .bind(i64::from(sequence))
        .execute(&mut *conn)
        .await?;

    Ok(())
}
