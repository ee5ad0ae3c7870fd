//! # Web API
//!
//! HTTP surface of the batch server: manual trigger, execution history, stop
//! requests and a health check.

pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

/// Build the application router
pub fn create_app(state: AppState) -> Router {
    let app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::batch_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Web application created with all routes");
    app
}
