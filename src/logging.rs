//! # Logging
//!
//! Environment-aware structured logging that outputs to both console and a
//! JSON log file, so a batch run can be traced chunk by chunk after the fact.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

/// Keeps the file writer flushing for the life of the process
static LOG_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Install the console and JSON file subscriber once per process
pub fn init_structured_logging() {
    LOG_GUARD.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from("log");
        let file_output = match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let pid = process::id();
                let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
                let file_name = format!("{environment}.{pid}.{timestamp}.log");
                let appender = tracing_appender::rolling::never(&log_dir, &file_name);
                Some((tracing_appender::non_blocking(appender), log_dir.join(file_name)))
            }
            Err(e) => {
                eprintln!("Log directory unavailable, logging to console only: {e}");
                None
            }
        };

        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(build_filter(&log_level));

        let (file_layer, guard, log_path) = match file_output {
            Some(((writer, guard), path)) => (
                Some(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(build_filter(&log_level)),
                ),
                Some(guard),
                Some(path),
            ),
            None => (None, None, None),
        };

        if tracing_subscriber::registry()
            .with(console)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized, keeping it");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            log_file = ?log_path,
            "Structured logging initialized"
        );

        guard
    });
}

/// `RUST_LOG` wins over the environment-derived level
fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// `BATCH_ENV`, then `APP_ENV`, defaulting to development
pub fn get_environment() -> String {
    std::env::var("BATCH_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    if environment == "production" {
        "info".to_string()
    } else {
        "debug".to_string()
    }
}

/// Log structured data for job lifecycle operations
pub fn log_job_operation(
    operation: &str,
    job_execution_id: Option<Uuid>,
    job_name: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        job_execution_id = ?job_execution_id,
        job_name = job_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "JOB_OPERATION"
    );
}

/// Log structured data for chunk commits
pub fn log_chunk_operation(
    operation: &str,
    job_execution_id: Uuid,
    sequence: u64,
    written: usize,
    checkpoint: &str,
    status: &str,
) {
    tracing::info!(
        operation = %operation,
        job_execution_id = %job_execution_id,
        sequence = sequence,
        written = written,
        checkpoint = %checkpoint,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "CHUNK_OPERATION"
    );
}

/// Log a component failure with optional context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
