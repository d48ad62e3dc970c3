use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalId, RequestContext};
use crate::domain::employee::ProjectCode;
use crate::domain::request_type::RequestType;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub principal: Decimal,
    pub installment_count: u32,
    pub first_due_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPostponementRequest {
    pub loan_id: ApprovalId,
    pub installment_due_date: NaiveDate,
    pub months: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceRequest {
    pub allowance_type: String,
    /// Payroll month as `YYYY-MM`.
    pub month: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRequest {
    /// Payroll month as `YYYY-MM`.
    pub period: String,
    pub net_total: Decimal,
    pub employee_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAttendanceRequest {
    pub work_date: NaiveDate,
    pub check_in: NaiveTime,
    pub check_out: NaiveTime,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaborRequest {
    pub requesting_project: ProjectCode,
    pub trade: String,
    pub headcount: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTransferRequest {
    pub from_project: ProjectCode,
    pub to_project: ProjectCode,
    pub effective_date: NaiveDate,
}

/// Flow-specific body of a request. The variant decides the request type,
/// the per-level resolution context, and the finalize-effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestPayload {
    Leave(LeaveRequest),
    Loan(LoanRequest),
    LoanPostponement(LoanPostponementRequest),
    Allowance(AllowanceRequest),
    Payroll(PayrollRequest),
    ManualAttendance(ManualAttendanceRequest),
    LaborRequest(LaborRequest),
    ProjectTransfer(ProjectTransferRequest),
}

impl RequestPayload {
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Leave(_) => RequestType::Leave,
            Self::Loan(_) => RequestType::Loan,
            Self::LoanPostponement(_) => RequestType::LoanPostponement,
            Self::Allowance(_) => RequestType::Allowance,
            Self::Payroll(_) => RequestType::Payroll,
            Self::ManualAttendance(_) => RequestType::ManualAttendance,
            Self::LaborRequest(_) => RequestType::LaborRequest,
            Self::ProjectTransfer(_) => RequestType::ProjectTransfer,
        }
    }

    /// A project transfer is signed off by the source project at level 1 and
    /// by the destination project afterwards; labor requests always route
    /// through the requesting project.
    pub fn context_for_level(&self, level: u32, base: RequestContext) -> RequestContext {
        match self {
            Self::ProjectTransfer(transfer) if level <= 1 => {
                base.with_project(transfer.from_project.clone())
            }
            Self::ProjectTransfer(transfer) => base.with_project(transfer.to_project.clone()),
            Self::LaborRequest(labor) => base.with_project(labor.requesting_project.clone()),
            _ => base,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::Leave(leave) => {
                require(!leave.leave_type.trim().is_empty(), "leave_type must not be empty")?;
                require(leave.end_date >= leave.start_date, "leave end_date precedes start_date")?;
                require(leave.days > Decimal::ZERO, "leave days must be positive")
            }
            Self::Loan(loan) => {
                require(loan.principal > Decimal::ZERO, "loan principal must be positive")?;
                require(loan.installment_count >= 1, "loan needs at least one installment")?;
                require(
                    loan.principal.scale() <= 2,
                    "loan principal must not have more than two decimal places",
                )
            }
            Self::LoanPostponement(postponement) => {
                require(
                    !postponement.loan_id.0.trim().is_empty(),
                    "postponement must reference a loan",
                )?;
                require(postponement.months >= 1, "postponement must be at least one month")
            }
            Self::Allowance(allowance) => {
                require(
                    !allowance.allowance_type.trim().is_empty(),
                    "allowance_type must not be empty",
                )?;
                require(is_month(&allowance.month), "allowance month must be YYYY-MM")?;
                require(allowance.amount > Decimal::ZERO, "allowance amount must be positive")
            }
            Self::Payroll(payroll) => {
                require(is_month(&payroll.period), "payroll period must be YYYY-MM")?;
                require(payroll.net_total >= Decimal::ZERO, "payroll net total must not be negative")
            }
            Self::ManualAttendance(attendance) => {
                require(
                    attendance.check_out > attendance.check_in,
                    "check_out must be after check_in",
                )?;
                require(!attendance.reason.trim().is_empty(), "manual attendance needs a reason")
            }
            Self::LaborRequest(labor) => {
                require(labor.headcount >= 1, "labor request headcount must be positive")?;
                require(labor.end_date >= labor.start_date, "labor end_date precedes start_date")
            }
            Self::ProjectTransfer(transfer) => require(
                transfer.from_project != transfer.to_project,
                "transfer source and destination projects must differ",
            ),
        }
    }
}

fn require(condition: bool, message: &str) -> Result<(), DomainError> {
    if condition {
        Ok(())
    } else {
        Err(DomainError::InvalidPayload(message.to_string()))
    }
}

fn is_month(value: &str) -> bool {
    NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok() && value.len() == 7
}
