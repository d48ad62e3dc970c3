use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

/// Splits `principal` into `count` monthly installments.
///
/// Every installment but the last is the even share truncated to cents; the
/// last one absorbs the remainder so the schedule sums exactly to `principal`.
pub fn installment_schedule(
    principal: Decimal,
    count: u32,
    first_due_date: NaiveDate,
) -> Result<Vec<Installment>, DomainError> {
    if count == 0 {
        return Err(DomainError::InvalidPayload("loan needs at least one installment".to_string()));
    }
    if principal <= Decimal::ZERO {
        return Err(DomainError::InvalidPayload("loan principal must be positive".to_string()));
    }

    let share =
        (principal / Decimal::from(count)).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let leading_total = share * Decimal::from(count - 1);
    let last = principal - leading_total;

    (0..count)
        .map(|index| {
            let due_date = shift_months(first_due_date, index)?;
            let amount = if index + 1 == count { last } else { share };
            Ok(Installment { sequence: index + 1, due_date, amount })
        })
        .collect()
}

/// Due date after postponing by `months`, clamped to month end the way
/// `chrono` does (Jan 31 + 1 month = Feb 28/29).
pub fn shift_months(date: NaiveDate, months: u32) -> Result<NaiveDate, DomainError> {
    date.checked_add_months(Months::new(months)).ok_or_else(|| {
        DomainError::InvariantViolation(format!("{date} + {months} months is out of range"))
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{installment_schedule, shift_months};
    use crate::errors::DomainError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn schedule_sums_exactly_to_principal_with_remainder_last() {
        let principal = Decimal::new(1_000_000, 2);
        let schedule = installment_schedule(principal, 3, date(2026, 11, 1)).expect("schedule");

        let amounts: Vec<_> = schedule.iter().map(|installment| installment.amount).collect();
        assert_eq!(
            amounts,
            vec![Decimal::new(333_333, 2), Decimal::new(333_333, 2), Decimal::new(333_334, 2)]
        );
        assert_eq!(amounts.iter().copied().sum::<Decimal>(), principal);
        assert_eq!(schedule[2].due_date, date(2027, 1, 1));
        assert_eq!(schedule[2].sequence, 3);
    }

    #[test]
    fn single_installment_carries_whole_principal() {
        let schedule =
            installment_schedule(Decimal::new(250_075, 2), 1, date(2026, 12, 15)).expect("schedule");

        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].amount, Decimal::new(250_075, 2));
    }

    #[test]
    fn zero_installments_is_invalid() {
        assert!(matches!(
            installment_schedule(Decimal::ONE, 0, date(2026, 1, 1)),
            Err(DomainError::InvalidPayload(_))
        ));
    }

    #[test]
    fn month_shift_clamps_to_month_end() {
        assert_eq!(shift_months(date(2026, 1, 31), 1).expect("shift"), date(2026, 2, 28));
        assert_eq!(shift_months(date(2026, 11, 30), 3).expect("shift"), date(2027, 2, 28));
    }
}
