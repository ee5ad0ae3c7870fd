//! # Execution History Handlers
//!
//! Read access to job execution records and a stop request for a running
//! execution.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::system::MAX_HISTORY_LIMIT;
use crate::error::BatchError;
use crate::models::{JobExecution, StepExecution};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub job_name: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionDetail {
    pub job_execution: JobExecution,
    pub step_execution: Option<StepExecution>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub job_execution_id: Uuid,
    pub stopping: bool,
}

/// List executions, newest first: GET /batch/executions
pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<JobExecution>>> {
    let limit = query.limit.unwrap_or(state.history_limit());
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let executions = state
        .repository()
        .list_job_executions(query.job_name.as_deref(), limit)
        .await
        .map_err(BatchError::from)?;

    Ok(Json(executions))
}

/// One execution with its step: GET /batch/executions/{id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExecutionDetail>> {
    let repository = state.repository();

    let job_execution = repository
        .find_job_execution(id)
        .await
        .map_err(BatchError::from)?
        .ok_or(BatchError::ExecutionNotFound(id))?;
    let step_execution = repository
        .find_step_execution(id)
        .await
        .map_err(BatchError::from)?;

    Ok(Json(ExecutionDetail {
        job_execution,
        step_execution,
    }))
}

/// Request a running execution to stop: POST /batch/executions/{id}/stop
///
/// Answers 202 when the stop was signalled. Only executions driven by this
/// process can be stopped; anything else is a conflict.
pub async fn stop_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<StopResponse>)> {
    if state.launcher().stop(id) {
        return Ok((
            StatusCode::ACCEPTED,
            Json(StopResponse {
                job_execution_id: id,
                stopping: true,
            }),
        ));
    }

    let execution = state
        .repository()
        .find_job_execution(id)
        .await
        .map_err(BatchError::from)?
        .ok_or(BatchError::ExecutionNotFound(id))?;

    let message = if execution.status.is_terminal() {
        format!("Job execution {id} already finished as {}", execution.status)
    } else {
        format!("Job execution {id} is {} but not running in this process", execution.status)
    };
    Err(ApiError::conflict(message))
}
