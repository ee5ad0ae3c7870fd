//! Error types for the batch engine.

use thiserror::Error;
use uuid::Uuid;

use crate::batch::errors::{ReaderError, WriterError};
use crate::config::ConfigurationError;
use crate::state_machine::StateMachineError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum BatchError {
    /// An execution of the same job name is still STARTING or STARTED
    #[error("job '{job_name}' already has an active execution {active_execution_id}")]
    LaunchConflict {
        job_name: String,
        active_execution_id: Uuid,
    },
    #[error("Job execution not found: {0}")]
    ExecutionNotFound(Uuid),
    #[error("Source read error: {0}")]
    SourceRead(#[from] ReaderError),
    #[error("Write commit error: {0}")]
    WriteCommit(#[from] WriterError),
    #[error("Store error: {0}")]
    Store(StoreError),
    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// The task driving an execution panicked or was aborted
    #[error("Execution task for {job_execution_id} ended abnormally: {reason}")]
    ExecutionTask {
        job_execution_id: Uuid,
        reason: String,
    },
}

impl From<StoreError> for BatchError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ActiveExecutionExists {
                job_name,
                execution_id,
            } => BatchError::LaunchConflict {
                job_name,
                active_execution_id: execution_id,
            },
            other => BatchError::Store(other),
        }
    }
}

impl BatchError {
    /// Whether the launch was rejected by the overlap guard
    pub fn is_launch_conflict(&self) -> bool {
        matches!(self, Self::LaunchConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_execution_becomes_launch_conflict() {
        let id = Uuid::new_v4();
        let err: BatchError = StoreError::ActiveExecutionExists {
            job_name: "memberActivityJob".to_string(),
            execution_id: id,
        }
        .into();

        assert!(err.is_launch_conflict());
        assert_eq!(
            err.to_string(),
            format!("job 'memberActivityJob' already has an active execution {id}")
        );
    }

    #[test]
    fn test_other_store_errors_stay_store_errors() {
        let err: BatchError = StoreError::NotFound {
            entity: "job_execution",
            id: "42".to_string(),
        }
        .into();

        assert!(!err.is_launch_conflict());
        assert!(matches!(err, BatchError::Store(_)));
    }
}
