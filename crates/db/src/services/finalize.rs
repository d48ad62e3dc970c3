use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Row, SqliteConnection};

use hrflow_core::domain::approval::ApprovalRecord;
use hrflow_core::errors::DomainError;
use hrflow_core::flows::{shift_months, FinalizeEffect};

use super::ServiceError;
use crate::repositories::{alert, ledger};

/// Applies the business side effect of an approved request on the caller's
/// transaction. Any error aborts the whole approval.
pub(crate) async fn apply_effect(
    conn: &mut SqliteConnection,
    record: &ApprovalRecord,
    effect: &FinalizeEffect,
) -> Result<(), ServiceError> {
    let now = Utc::now().to_rfc3339();

    match effect {
        FinalizeEffect::DeductLeave { employee_no, leave_type, days } => {
            let available = ledger::read_leave_balance(conn, employee_no, leave_type)
                .await?
                .unwrap_or(Decimal::ZERO);
            if available < *days {
                return Err(DomainError::InsufficientLeaveBalance {
                    employee_no: employee_no.0.clone(),
                    leave_type: leave_type.clone(),
                    requested: *days,
                    available,
                }
                .into());
            }
            ledger::write_leave_balance(conn, employee_no, leave_type, available - *days).await?;
        }
        FinalizeEffect::CreateLoanSchedule { loan_id, employee_no, principal, installments } => {
            ledger::insert_loan(conn, loan_id, employee_no, *principal, installments).await?;
        }
        FinalizeEffect::PostponeInstallments { loan_id, from_due_date, months } => {
            let unpaid: Vec<_> = ledger::read_installments(conn, loan_id)
                .await?
                .into_iter()
                .filter(|installment| !installment.paid)
                .collect();
            let Some(first) = unpaid.iter().find(|installment| installment.due_date == *from_due_date)
            else {
                return Err(DomainError::InvariantViolation(format!(
                    "loan {loan_id} has no unpaid installment due {from_due_date}"
                ))
                .into());
            };
            let first_sequence = first.sequence;

            for installment in unpaid.iter().filter(|i| i.sequence >= first_sequence) {
                let due_date = shift_months(installment.due_date, *months)?;
                ledger::reschedule_installment(conn, loan_id, installment.sequence, due_date)
                    .await?;
            }
        }
        FinalizeEffect::RecordAllowance { employee_no, allowance_type, month, amount } => {
            sqlx::query(
                "INSERT INTO allowance_payable (request_id, employee_no, allowance_type, month, amount, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.id.0)
            .bind(employee_no.as_str())
            .bind(allowance_type)
            .bind(month)
            .bind(amount.to_string())
            .bind(&now)
            .execute(&mut *conn)
            .await?;
        }
        FinalizeEffect::PostPayroll { period, net_total, employee_count } => {
            let row = sqlx::query("SELECT COUNT(*) AS postings FROM payroll_posting WHERE period = ?")
                .bind(period)
                .fetch_one(&mut *conn)
                .await?;
            let postings: i64 = row.try_get("postings")?;
            if postings > 0 {
                return Err(DomainError::InvariantViolation(format!(
                    "payroll for period {period} was already posted"
                ))
                .into());
            }

            sqlx::query(
                "INSERT INTO payroll_posting (request_id, period, net_total, employee_count, posted_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.id.0)
            .bind(period)
            .bind(net_total.to_string())
            .bind(i64::from(*employee_count))
            .bind(&now)
            .execute(&mut *conn)
            .await?;
        }
        FinalizeEffect::RecordAttendance { employee_no, work_date, check_in, check_out } => {
            alert::insert_attendance(
                conn,
                employee_no,
                *work_date,
                *check_in,
                *check_out,
                "manual",
                Some(&record.id.0),
            )
            .await?;
        }
        FinalizeEffect::AllocateLabor { project_code, trade, headcount, start_date, end_date } => {
            sqlx::query(
                "INSERT INTO labor_allocation (request_id, project_code, trade, headcount, start_date, end_date, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.id.0)
            .bind(project_code.as_str())
            .bind(trade)
            .bind(i64::from(*headcount))
            .bind(start_date.format("%Y-%m-%d").to_string())
            .bind(end_date.format("%Y-%m-%d").to_string())
            .bind(&now)
            .execute(&mut *conn)
            .await?;
        }
        FinalizeEffect::MoveAssignment { employee_no, to_project, effective_date, .. } => {
            sqlx::query(
                "INSERT INTO employee_assignment (employee_no, project_code, effective_date, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(employee_no) DO UPDATE SET
                    project_code = excluded.project_code,
                    effective_date = excluded.effective_date,
                    updated_at = excluded.updated_at",
            )
            .bind(employee_no.as_str())
            .bind(to_project.as_str())
            .bind(effective_date.format("%Y-%m-%d").to_string())
            .bind(&now)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use hrflow_core::domain::approval::{ApprovalId, ApprovalRecord, ApprovalState};
    use hrflow_core::domain::employee::EmployeeId;
    use hrflow_core::domain::payload::{LoanPostponementRequest, PayrollRequest, RequestPayload};
    use hrflow_core::errors::DomainError;
    use hrflow_core::flows::{installment_schedule, plan_finalize};

    use super::apply_effect;
    use crate::repositories::{ledger, SqlHrLedgerRepository};
    use crate::services::ServiceError;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn approved(id: &str, payload: RequestPayload) -> ApprovalRecord {
        let now = Utc::now();
        ApprovalRecord {
            id: ApprovalId(id.to_string()),
            employee_no: EmployeeId::new("100"),
            department_code: None,
            project_code: None,
            payload,
            state: ApprovalState::Approved,
            state_version: 2,
            submitted_by: "100".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn postponement_shifts_target_and_later_unpaid_installments() {
        let pool = pool().await;
        let loan_id = ApprovalId("LOAN-1".to_string());
        let schedule =
            installment_schedule(Decimal::from(900), 3, date(2026, 11, 15)).expect("schedule");
        let mut conn = pool.acquire().await.expect("conn");
        ledger::insert_loan(&mut conn, &loan_id, &EmployeeId::new("100"), Decimal::from(900), &schedule)
            .await
            .expect("loan");

        let record = approved(
            "POST-1",
            RequestPayload::LoanPostponement(LoanPostponementRequest {
                loan_id: loan_id.clone(),
                installment_due_date: date(2026, 12, 15),
                months: 2,
            }),
        );
        let effect = plan_finalize(&record).expect("plan");
        apply_effect(&mut conn, &record, &effect).await.expect("apply");
        drop(conn);

        let stored = SqlHrLedgerRepository::new(pool).installments(&loan_id).await.expect("read");
        let due_dates: Vec<NaiveDate> = stored.iter().map(|i| i.due_date).collect();
        assert_eq!(due_dates, vec![date(2026, 11, 15), date(2027, 2, 15), date(2027, 3, 15)]);
    }

    #[tokio::test]
    async fn postponement_of_unknown_installment_fails() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.expect("conn");
        let record = approved(
            "POST-2",
            RequestPayload::LoanPostponement(LoanPostponementRequest {
                loan_id: ApprovalId("LOAN-404".to_string()),
                installment_due_date: date(2026, 12, 15),
                months: 1,
            }),
        );
        let effect = plan_finalize(&record).expect("plan");

        let error = apply_effect(&mut conn, &record, &effect).await.expect_err("no such loan");
        assert!(matches!(error, ServiceError::Domain(DomainError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn payroll_period_is_posted_once() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.expect("conn");
        let payroll = |id: &str| {
            approved(
                id,
                RequestPayload::Payroll(PayrollRequest {
                    period: "2026-10".to_string(),
                    net_total: Decimal::new(12_500_000, 2),
                    employee_count: 42,
                }),
            )
        };

        let first = payroll("PAY-1");
        apply_effect(&mut conn, &first, &plan_finalize(&first).expect("plan"))
            .await
            .expect("first posting");
        let second = payroll("PAY-2");
        let error = apply_effect(&mut conn, &second, &plan_finalize(&second).expect("plan"))
            .await
            .expect_err("duplicate period");

        assert!(matches!(error, ServiceError::Domain(DomainError::InvariantViolation(_))));
    }
}
