use std::fmt;

use serde::{Deserialize, Serialize};

/// Business process an approval chain belongs to.
///
/// The storage codes are the identifiers callers and the chain configuration
/// table use, so they must stay stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "ALLOW")]
    Allowance,
    #[serde(rename = "VAC")]
    Leave,
    #[serde(rename = "LOAN")]
    Loan,
    #[serde(rename = "POSTLOAN")]
    LoanPostponement,
    #[serde(rename = "PAYROLL")]
    Payroll,
    #[serde(rename = "MANUAL_ATTENDANCE")]
    ManualAttendance,
    #[serde(rename = "LABOR_REQ")]
    LaborRequest,
    #[serde(rename = "PROJ_TRANSFER")]
    ProjectTransfer,
}

impl RequestType {
    pub const ALL: [RequestType; 8] = [
        Self::Allowance,
        Self::Leave,
        Self::Loan,
        Self::LoanPostponement,
        Self::Payroll,
        Self::ManualAttendance,
        Self::LaborRequest,
        Self::ProjectTransfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowance => "ALLOW",
            Self::Leave => "VAC",
            Self::Loan => "LOAN",
            Self::LoanPostponement => "POSTLOAN",
            Self::Payroll => "PAYROLL",
            Self::ManualAttendance => "MANUAL_ATTENDANCE",
            Self::LaborRequest => "LABOR_REQ",
            Self::ProjectTransfer => "PROJ_TRANSFER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ALLOW" => Some(Self::Allowance),
            "VAC" => Some(Self::Leave),
            "LOAN" => Some(Self::Loan),
            "POSTLOAN" => Some(Self::LoanPostponement),
            "PAYROLL" => Some(Self::Payroll),
            "MANUAL_ATTENDANCE" => Some(Self::ManualAttendance),
            "LABOR_REQ" => Some(Self::LaborRequest),
            "PROJ_TRANSFER" => Some(Self::ProjectTransfer),
            _ => None,
        }
    }

    /// Entity name used in notification and audit payloads.
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::Allowance => "monthly_allowance",
            Self::Leave => "employee_leave",
            Self::Loan => "loan",
            Self::LoanPostponement => "loan_postponement",
            Self::Payroll => "payroll_run",
            Self::ManualAttendance => "manual_attendance_request",
            Self::LaborRequest => "labor_request",
            Self::ProjectTransfer => "project_transfer",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
