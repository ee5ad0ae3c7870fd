//! Route definitions grouped by functionality.

use axum::{
    routing::{get, post},
    Router,
};

use crate::web::{handlers, state::AppState};

/// Health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health_check))
}

/// Manual trigger and execution history
pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/batch/run", get(handlers::batch::run_job))
        .route("/batch/executions", get(handlers::executions::list_executions))
        .route(
            "/batch/executions/{id}",
            get(handlers::executions::get_execution),
        )
        .route(
            "/batch/executions/{id}/stop",
            post(handlers::executions::stop_execution),
        )
}
