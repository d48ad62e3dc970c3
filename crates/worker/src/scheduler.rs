use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use hrflow_db::repositories::SqlOutboxRepository;
use hrflow_db::{
    ApprovalService, DispatchReport, OutboxDispatcher, OvertimeAlertJob, OvertimeReport,
    SweepReport, TracingAuditSink, TracingNotificationPublisher,
};

use crate::bootstrap::Application;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Periods {
    dispatch: Duration,
    sweep: Duration,
    overtime: Duration,
}

/// Runs the background jobs on their own intervals. A failing job logs and
/// waits for its next tick; it never stops the loop.
pub struct Scheduler {
    approvals: ApprovalService,
    dispatcher: OutboxDispatcher<SqlOutboxRepository, TracingNotificationPublisher>,
    overtime: OvertimeAlertJob,
    periods: Periods,
}

impl Scheduler {
    pub fn new(app: &Application) -> Self {
        let config = &app.config;
        Self {
            approvals: ApprovalService::new(
                app.db_pool.clone(),
                Arc::clone(&app.catalog),
                config.workflow.clone(),
                Arc::new(TracingAuditSink),
            ),
            dispatcher: OutboxDispatcher::new(
                SqlOutboxRepository::new(app.db_pool.clone()),
                TracingNotificationPublisher,
                &config.outbox,
            ),
            overtime: OvertimeAlertJob::new(app.db_pool.clone(), config.alerts.clone()),
            periods: Periods {
                dispatch: seconds(config.outbox.poll_interval_secs),
                sweep: seconds(config.workflow.sweep_interval_secs),
                overtime: seconds(config.alerts.sweep_interval_secs),
            },
        }
    }

    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut dispatch = interval(self.periods.dispatch);
        let mut sweep = interval(self.periods.sweep);
        let mut overtime = interval(self.periods.overtime);
        for ticker in [&mut dispatch, &mut sweep, &mut overtime] {
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }
        tokio::pin!(shutdown);

        info!(
            event_name = "system.worker.started",
            correlation_id = "worker",
            dispatch_secs = self.periods.dispatch.as_secs(),
            sweep_secs = self.periods.sweep.as_secs(),
            overtime_secs = self.periods.overtime.as_secs(),
            "background jobs scheduled"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = dispatch.tick() => {
                    self.dispatch_outbox().await;
                }
                _ = sweep.tick() => {
                    self.sweep_stale(Utc::now()).await;
                }
                _ = overtime.tick() => {
                    self.raise_overtime_alerts(Utc::now()).await;
                }
            }
        }
    }

    pub async fn dispatch_outbox(&self) -> Option<DispatchReport> {
        match self.dispatcher.dispatch_once().await {
            Ok(report) => Some(report),
            Err(error) => {
                job_failed("outbox_dispatch", &error);
                None
            }
        }
    }

    pub async fn sweep_stale(&self, now: DateTime<Utc>) -> Option<SweepReport> {
        match self.approvals.sweep_stale(now).await {
            Ok(report) => Some(report),
            Err(error) => {
                job_failed("auto_approval_sweep", &error);
                None
            }
        }
    }

    /// Runs the alert job for the calendar month containing `now`.
    pub async fn raise_overtime_alerts(&self, now: DateTime<Utc>) -> Option<OvertimeReport> {
        let month = now.format("%Y-%m").to_string();
        match self.overtime.run_for_month(&month, now).await {
            Ok(report) => Some(report),
            Err(error) => {
                job_failed("overtime_alerts", &error);
                None
            }
        }
    }
}

fn seconds(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

fn job_failed(job: &'static str, error: &dyn std::error::Error) {
    warn!(
        event_name = "system.worker.job_failed",
        correlation_id = "worker",
        job,
        error = %error,
        "background job failed; retrying on next tick"
    );
}
