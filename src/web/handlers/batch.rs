//! # Manual Trigger Handler
//!
//! `GET /batch/run` launches the job with a `manualRunTime` parameter and
//! waits for the run to finish. The answer is always a one-line string.

use axum::extract::State;
use chrono::Utc;
use tracing::{info, warn};

use crate::constants::messages::{TRIGGER_FAILURE_PREFIX, TRIGGER_SUCCESS};
use crate::models::JobParameters;
use crate::state_machine::BatchStatus;
use crate::web::state::AppState;

pub async fn run_job(State(state): State<AppState>) -> String {
    let parameters = JobParameters::manual(Utc::now());

    match state.launcher().launch(state.job_name(), parameters).await {
        Ok(execution) if execution.status == BatchStatus::Failed => {
            let cause = execution
                .exit_message
                .unwrap_or_else(|| "execution failed".to_string());
            warn!(job_execution_id = %execution.id, cause = %cause, "Manual run failed");
            format!("{TRIGGER_FAILURE_PREFIX}{cause}")
        }
        Ok(execution) => {
            info!(
                job_execution_id = %execution.id,
                status = %execution.status,
                "Manual run finished"
            );
            TRIGGER_SUCCESS.to_string()
        }
        Err(e) => {
            warn!(error = %e, "Manual trigger rejected");
            format!("{TRIGGER_FAILURE_PREFIX}{e}")
        }
    }
}
