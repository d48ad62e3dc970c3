pub mod loan;
pub mod overtime;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalId, ApprovalRecord};
use crate::domain::employee::{EmployeeId, ProjectCode};
use crate::domain::payload::RequestPayload;
use crate::errors::DomainError;

pub use loan::{installment_schedule, shift_months, Installment};
pub use overtime::{crossed_thresholds, daily_overtime, monthly_overtime, WorkedDay};

/// Business side effect owed once a request reaches `Approved`.
///
/// Planning is pure; the persistence layer applies the plan inside the same
/// transaction that wrote the terminal state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum FinalizeEffect {
    DeductLeave {
        employee_no: EmployeeId,
        leave_type: String,
        days: Decimal,
    },
    CreateLoanSchedule {
        loan_id: ApprovalId,
        employee_no: EmployeeId,
        principal: Decimal,
        installments: Vec<Installment>,
    },
    PostponeInstallments {
        loan_id: ApprovalId,
        from_due_date: NaiveDate,
        months: u32,
    },
    RecordAllowance {
        employee_no: EmployeeId,
        allowance_type: String,
        month: String,
        amount: Decimal,
    },
    PostPayroll {
        period: String,
        net_total: Decimal,
        employee_count: u32,
    },
    RecordAttendance {
        employee_no: EmployeeId,
        work_date: NaiveDate,
        check_in: NaiveTime,
        check_out: NaiveTime,
    },
    AllocateLabor {
        project_code: ProjectCode,
        trade: String,
        headcount: u32,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    MoveAssignment {
        employee_no: EmployeeId,
        from_project: ProjectCode,
        to_project: ProjectCode,
        effective_date: NaiveDate,
    },
}

impl FinalizeEffect {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeductLeave { .. } => "deduct_leave",
            Self::CreateLoanSchedule { .. } => "create_loan_schedule",
            Self::PostponeInstallments { .. } => "postpone_installments",
            Self::RecordAllowance { .. } => "record_allowance",
            Self::PostPayroll { .. } => "post_payroll",
            Self::RecordAttendance { .. } => "record_attendance",
            Self::AllocateLabor { .. } => "allocate_labor",
            Self::MoveAssignment { .. } => "move_assignment",
        }
    }
}

pub fn plan_finalize(record: &ApprovalRecord) -> Result<FinalizeEffect, DomainError> {
    let employee_no = record.employee_no.clone();
    let effect = match &record.payload {
        RequestPayload::Leave(leave) => FinalizeEffect::DeductLeave {
            employee_no,
            leave_type: leave.leave_type.clone(),
            days: leave.days,
        },
        RequestPayload::Loan(loan) => FinalizeEffect::CreateLoanSchedule {
            loan_id: record.id.clone(),
            employee_no,
            principal: loan.principal,
            installments: installment_schedule(
                loan.principal,
                loan.installment_count,
                loan.first_due_date,
            )?,
        },
        RequestPayload::LoanPostponement(postponement) => FinalizeEffect::PostponeInstallments {
            loan_id: postponement.loan_id.clone(),
            from_due_date: postponement.installment_due_date,
            months: postponement.months,
        },
        RequestPayload::Allowance(allowance) => FinalizeEffect::RecordAllowance {
            employee_no,
            allowance_type: allowance.allowance_type.clone(),
            month: allowance.month.clone(),
            amount: allowance.amount,
        },
        RequestPayload::Payroll(payroll) => FinalizeEffect::PostPayroll {
            period: payroll.period.clone(),
            net_total: payroll.net_total,
            employee_count: payroll.employee_count,
        },
        RequestPayload::ManualAttendance(attendance) => FinalizeEffect::RecordAttendance {
            employee_no,
            work_date: attendance.work_date,
            check_in: attendance.check_in,
            check_out: attendance.check_out,
        },
        RequestPayload::LaborRequest(labor) => FinalizeEffect::AllocateLabor {
            project_code: labor.requesting_project.clone(),
            trade: labor.trade.clone(),
            headcount: labor.headcount,
            start_date: labor.start_date,
            end_date: labor.end_date,
        },
        RequestPayload::ProjectTransfer(transfer) => FinalizeEffect::MoveAssignment {
            employee_no,
            from_project: transfer.from_project.clone(),
            to_project: transfer.to_project.clone(),
            effective_date: transfer.effective_date,
        },
    };
    Ok(effect)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{plan_finalize, FinalizeEffect};
    use crate::domain::approval::{ApprovalId, ApprovalRecord, ApprovalState};
    use crate::domain::employee::{EmployeeId, ProjectCode};
    use crate::domain::payload::{LoanRequest, ProjectTransferRequest, RequestPayload};

    fn record(payload: RequestPayload) -> ApprovalRecord {
        let now = Utc::now();
        ApprovalRecord {
            id: ApprovalId("REQ-9".to_string()),
            employee_no: EmployeeId::new("100"),
            department_code: None,
            project_code: Some(ProjectCode::new("9")),
            payload,
            state: ApprovalState::Approved,
            state_version: 3,
            submitted_by: "100".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn loan_plan_carries_exact_schedule() {
        let effect = plan_finalize(&record(RequestPayload::Loan(LoanRequest {
            principal: Decimal::new(1_000_000, 2),
            installment_count: 3,
            first_due_date: NaiveDate::from_ymd_opt(2026, 11, 1).expect("date"),
        })))
        .expect("plan");

        let FinalizeEffect::CreateLoanSchedule { loan_id, installments, principal, .. } = effect
        else {
            panic!("expected loan schedule");
        };
        assert_eq!(loan_id, ApprovalId("REQ-9".to_string()));
        assert_eq!(installments.iter().map(|i| i.amount).sum::<Decimal>(), principal);
    }

    #[test]
    fn transfer_plan_moves_to_destination_project() {
        let effect = plan_finalize(&record(RequestPayload::ProjectTransfer(ProjectTransferRequest {
            from_project: ProjectCode::new("9"),
            to_project: ProjectCode::new("12"),
            effective_date: NaiveDate::from_ymd_opt(2026, 12, 1).expect("date"),
        })))
        .expect("plan");

        assert_eq!(effect.name(), "move_assignment");
        assert!(matches!(
            effect,
            FinalizeEffect::MoveAssignment { ref to_project, .. } if to_project.as_str() == "12"
        ));
    }
}
