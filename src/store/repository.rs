use async_trait::async_trait;
use uuid::Uuid;

use super::errors::StoreResult;
use crate::models::{JobExecution, NewJobExecution, StepExecution};
use crate::state_machine::BatchStatus;

/// Persistence of job and step execution records.
///
/// Counter updates are not part of this trait: they only ever happen inside
/// [`super::ChunkSink::commit_chunk`], in the same transaction as the writes
/// they describe.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Create a STARTING job execution and its step execution.
    ///
    /// Fails with `StoreError::ActiveExecutionExists` when an execution of the
    /// same job name is STARTING or STARTED. The check and the insert are one
    /// atomic operation in every backend.
    async fn create_job_execution(
        &self,
        new_execution: NewJobExecution,
    ) -> StoreResult<(JobExecution, StepExecution)>;

    /// Move the job execution and its step to `status`.
    ///
    /// Sets `start_time` on STARTED and `end_time` on terminal states. Rejects
    /// transitions the status graph does not allow.
    async fn update_status(
        &self,
        job_execution_id: Uuid,
        status: BatchStatus,
        exit_message: Option<String>,
    ) -> StoreResult<JobExecution>;

    async fn find_active(&self, job_name: &str) -> StoreResult<Option<JobExecution>>;

    async fn find_job_execution(&self, job_execution_id: Uuid)
        -> StoreResult<Option<JobExecution>>;

    async fn find_step_execution(
        &self,
        job_execution_id: Uuid,
    ) -> StoreResult<Option<StepExecution>>;

    /// Most recently created execution of `job_name`
    async fn find_last_execution(&self, job_name: &str) -> StoreResult<Option<JobExecution>>;

    /// Newest first, optionally restricted to one job name
    async fn list_job_executions(
        &self,
        job_name: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<JobExecution>>;

    /// Last execution of `job_name` with its step, when it ended FAILED or
    /// STOPPED and therefore carries a checkpoint worth resuming from
    async fn find_restartable(
        &self,
        job_name: &str,
    ) -> StoreResult<Option<(JobExecution, StepExecution)>> {
        let Some(last) = self.find_last_execution(job_name).await? else {
            return Ok(None);
        };
        if !last.status.is_restartable() {
            return Ok(None);
        }
        Ok(self
            .find_step_execution(last.id)
            .await?
            .map(|step| (last, step)))
    }

    async fn mark_started(&self, job_execution_id: Uuid) -> StoreResult<JobExecution> {
        self.update_status(job_execution_id, BatchStatus::Started, None)
            .await
    }

    async fn mark_completed(&self, job_execution_id: Uuid) -> StoreResult<JobExecution> {
        self.update_status(job_execution_id, BatchStatus::Completed, None)
            .await
    }

    async fn mark_failed(&self, job_execution_id: Uuid, cause: String) -> StoreResult<JobExecution> {
        self.update_status(job_execution_id, BatchStatus::Failed, Some(cause))
            .await
    }

    async fn mark_stopped(&self, job_execution_id: Uuid, reason: String) -> StoreResult<JobExecution> {
        self.update_status(job_execution_id, BatchStatus::Stopped, Some(reason))
            .await
    }
}
