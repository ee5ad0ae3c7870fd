//! # Fixed-Rate Scheduler
//!
//! Background task that launches the job once per period, the first time
//! immediately on spawn. A tick that lands while the previous run is still
//! going is skipped rather than queued, and a launch rejected by the overlap
//! guard (another trigger got there first) is logged and skipped.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::launcher::JobLauncher;
use crate::models::JobParameters;

#[derive(Debug)]
pub struct JobScheduler {
    launcher: Arc<JobLauncher>,
    job_name: String,
    period: Duration,
}

/// Running scheduler; dropping it leaves the task running
#[derive(Debug)]
pub struct SchedulerHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop ticking and wait for the task to exit.
    ///
    /// A launch already in progress runs to its terminal status first; use
    /// [`JobLauncher::shutdown`] to stop it sooner.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.join.await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl JobScheduler {
    pub fn new(launcher: Arc<JobLauncher>, job_name: impl Into<String>, period: Duration) -> Self {
        Self {
            launcher,
            job_name: job_name.into(),
            period,
        }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let token = CancellationToken::new();
        let join = tokio::spawn(self.run(token.clone()));
        SchedulerHandle { token, join }
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            job_name = %self.job_name,
            period_seconds = self.period.as_secs(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.fire().await;
        }

        info!(job_name = %self.job_name, "Scheduler stopped");
    }

    async fn fire(&self) {
        let parameters = JobParameters::scheduled(Utc::now());

        match self.launcher.launch(&self.job_name, parameters).await {
            Ok(execution) => debug!(
                job_execution_id = %execution.id,
                status = %execution.status,
                "Scheduled run finished"
            ),
            Err(e) if e.is_launch_conflict() => {
                info!(job_name = %self.job_name, reason = %e, "Skipping scheduled run");
            }
            Err(e) => error!(job_name = %self.job_name, error = %e, "Scheduled launch failed"),
        }
    }
}
