use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use hrflow_core::config::AlertsConfig;
use hrflow_core::domain::notification::{NotificationEvent, NotificationPriority};
use hrflow_core::errors::DomainError;
use hrflow_core::flows::{crossed_thresholds, monthly_overtime};

use super::ServiceError;
use crate::repositories::{alert, outbox, OvertimeAlert};
use crate::{begin_write, DbPool};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OvertimeReport {
    pub employees_over_standard: usize,
    pub alerts_raised: usize,
}

/// Raises one notification per employee, month and crossed threshold. The
/// ledger row and its outbox event commit together, so reruns stay silent.
pub struct OvertimeAlertJob {
    pool: DbPool,
    alerts: AlertsConfig,
}

impl OvertimeAlertJob {
    pub fn new(pool: DbPool, alerts: AlertsConfig) -> Self {
        Self { pool, alerts }
    }

    /// `month` is `YYYY-MM`.
    pub async fn run_for_month(
        &self,
        month: &str,
        now: DateTime<Utc>,
    ) -> Result<OvertimeReport, ServiceError> {
        if NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").is_err() {
            return Err(DomainError::InvariantViolation(format!(
                "overtime month `{month}` must be formatted YYYY-MM"
            ))
            .into());
        }

        let mut tx = begin_write(&self.pool).await?;
        let days = alert::attendance_for_month(&mut *tx, month).await?;
        let totals = monthly_overtime(&days, Decimal::from(self.alerts.standard_daily_hours));

        let mut report = OvertimeReport::default();
        for (employee_no, total) in totals {
            if total <= Decimal::ZERO {
                continue;
            }
            report.employees_over_standard += 1;

            for threshold_hours in crossed_thresholds(total, &self.alerts.overtime_thresholds_hours) {
                let entry = OvertimeAlert {
                    employee_no: employee_no.clone(),
                    month: month.to_string(),
                    threshold_hours,
                    total_hours: total,
                };
                if !alert::record_if_new(&mut *tx, &entry, now).await? {
                    continue;
                }

                let event = NotificationEvent::new(
                    "overtime.threshold_crossed",
                    employee_no.clone(),
                    NotificationPriority::High,
                    "attendance",
                    format!("{employee_no}:{month}"),
                )
                .with_variable("month", month)
                .with_variable("threshold_hours", threshold_hours.to_string())
                .with_variable("total_hours", total.to_string());
                outbox::enqueue(&mut *tx, &event, now).await?;
                report.alerts_raised += 1;
            }
        }
        tx.commit().await?;

        info!(
            event_name = "overtime.alerts.completed",
            correlation_id = "overtime",
            month,
            employees_over_standard = report.employees_over_standard,
            alerts_raised = report.alerts_raised,
            "overtime alert run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};

    use hrflow_core::config::AppConfig;
    use hrflow_core::domain::employee::EmployeeId;

    use super::{OvertimeAlertJob, OvertimeReport};
    use crate::repositories::{OutboxRepository, SqlAlertLedgerRepository, SqlOutboxRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn thresholds_alert_once_per_month() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let ledger = SqlAlertLedgerRepository::new(pool.clone());
        let employee = EmployeeId::new("100");

        // 12h days give 4h overtime each: 6 days = 24h, past the 20h threshold only.
        for day in 1..=6 {
            ledger
                .record_attendance(
                    &employee,
                    NaiveDate::from_ymd_opt(2026, 10, day).expect("date"),
                    NaiveTime::from_hms_opt(7, 0, 0).expect("time"),
                    NaiveTime::from_hms_opt(19, 0, 0).expect("time"),
                )
                .await
                .expect("attendance");
        }

        let job = OvertimeAlertJob::new(pool.clone(), AppConfig::default().alerts);
        let first = job.run_for_month("2026-10", Utc::now()).await.expect("first run");
        let second = job.run_for_month("2026-10", Utc::now()).await.expect("second run");

        assert_eq!(first, OvertimeReport { employees_over_standard: 1, alerts_raised: 1 });
        assert_eq!(second, OvertimeReport { employees_over_standard: 1, alerts_raised: 0 });
        let pending = SqlOutboxRepository::new(pool).fetch_pending(10).await.expect("outbox");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event.event_type, "overtime.threshold_crossed");
        assert_eq!(pending[0].event.variables.get("threshold_hours"), Some(&"20".to_string()));
    }

    #[tokio::test]
    async fn malformed_month_is_rejected() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let job = OvertimeAlertJob::new(pool, AppConfig::default().alerts);

        assert!(job.run_for_month("October", Utc::now()).await.is_err());
    }
}
