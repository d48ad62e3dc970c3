use std::collections::BTreeMap;

use chrono::NaiveTime;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::employee::EmployeeId;

/// One worked day as recorded in attendance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkedDay {
    pub employee_no: EmployeeId,
    pub check_in: NaiveTime,
    pub check_out: NaiveTime,
}

/// Hours worked beyond `standard_daily_hours`, in hours to two decimals.
/// A check-out at or before check-in yields zero.
pub fn daily_overtime(
    check_in: NaiveTime,
    check_out: NaiveTime,
    standard_daily_hours: Decimal,
) -> Decimal {
    let minutes = (check_out - check_in).num_minutes();
    if minutes <= 0 {
        return Decimal::ZERO;
    }
    let worked = (Decimal::from(minutes) / Decimal::from(60))
        .round_dp_with_strategy(2, RoundingStrategy::ToZero);
    (worked - standard_daily_hours).max(Decimal::ZERO)
}

pub fn monthly_overtime(
    days: &[WorkedDay],
    standard_daily_hours: Decimal,
) -> BTreeMap<EmployeeId, Decimal> {
    let mut totals = BTreeMap::new();
    for day in days {
        let overtime = daily_overtime(day.check_in, day.check_out, standard_daily_hours);
        *totals.entry(day.employee_no.clone()).or_insert(Decimal::ZERO) += overtime;
    }
    totals
}

/// Thresholds (in hours) that `total` has reached, ascending.
pub fn crossed_thresholds(total: Decimal, thresholds: &[u32]) -> Vec<u32> {
    let mut crossed: Vec<u32> =
        thresholds.iter().copied().filter(|threshold| total >= Decimal::from(*threshold)).collect();
    crossed.sort_unstable();
    crossed.dedup();
    crossed
}
