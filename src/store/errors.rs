use thiserror::Error;
use uuid::Uuid;

use crate::state_machine::BatchStatus;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Raised by the atomic check-and-create of a job execution
    #[error("Active execution {execution_id} already exists for job '{job_name}'")]
    ActiveExecutionExists { job_name: String, execution_id: Uuid },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A chunk whose sequence number was already applied, or is out of order
    #[error("Stale chunk for step execution {step_execution_id}: expected sequence {expected}, got {actual}")]
    StaleChunk {
        step_execution_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid status transition for execution {execution_id}: {from} -> {to}")]
    InvalidTransition {
        execution_id: Uuid,
        from: BatchStatus,
        to: BatchStatus,
    },

    #[error("Execution {execution_id} is {status}, chunks can only be committed while STARTED")]
    NotAcceptingChunks {
        execution_id: Uuid,
        status: BatchStatus,
    },

    #[error("Corrupt record in {entity}: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    /// Failure raised on purpose by the in-memory store's fault plan
    #[error("Injected failure: {0}")]
    Injected(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
