//! # Chunk Executor
//!
//! Drives one job execution from STARTING to a terminal status:
//!
//! 1. STARTING → STARTED
//! 2. Read a page, process each member, buffer activities
//! 3. When the buffer reaches the chunk size, commit the chunk together with
//!    the read/filter/skip deltas and the checkpoint cursor
//! 4. On exhaustion commit whatever is pending, then STARTED → COMPLETED
//!
//! A chunk boundary is defined by emitted activities only. Pages that are
//! entirely filtered advance the cursor and counters without a commit and
//! never stall the loop.
//!
//! Read and commit failures end the run as FAILED with the cause recorded.
//! A failed commit leaves nothing behind: the store rolls the chunk back and
//! the writer has already dropped its buffer. There are no automatic retries;
//! the next launch is the retry.
//!
//! Cancellation is observed between items and between pages, never inside a
//! commit. On stop, uncommitted work is dropped and the checkpoint stays at
//! the last committed chunk.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::processor::MemberProcessor;
use super::reader::MemberReader;
use super::writer::{ChunkWriter, FlushContext};
use crate::constants::messages::STOPPED_BY_REQUEST;
use crate::error::BatchError;
use crate::logging::{log_chunk_operation, log_error, log_job_operation};
use crate::models::{ExecutionCounters, JobExecution, PageCursor, StepExecution};
use crate::state_machine::{BatchStatus, JobEvent, JobStateMachine};
use crate::store::{JobRepository, StoreError};

/// How the step loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepOutcome {
    Completed,
    Stopped,
    Failed(String),
}

impl StepOutcome {
    fn event(&self) -> JobEvent {
        match self {
            Self::Completed => JobEvent::Complete,
            Self::Stopped => JobEvent::Stop,
            Self::Failed(cause) => JobEvent::failed(cause.clone()),
        }
    }
}

/// Position and uncommitted work of a running step
#[derive(Debug)]
struct StepProgress {
    job_execution_id: Uuid,
    step_execution_id: Uuid,
    /// Last committed chunk sequence
    sequence: u64,
    pending: ExecutionCounters,
    /// Cursor covering every item counted in `pending`
    pending_checkpoint: PageCursor,
}

pub struct ChunkExecutor {
    reader: MemberReader,
    processor: MemberProcessor,
    writer: ChunkWriter,
    repository: Arc<dyn JobRepository>,
    cancel: CancellationToken,
}

impl ChunkExecutor {
    pub fn new(
        reader: MemberReader,
        processor: MemberProcessor,
        writer: ChunkWriter,
        repository: Arc<dyn JobRepository>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            reader,
            processor,
            writer,
            repository,
            cancel,
        }
    }

    /// Run the execution to a terminal status and return the final record.
    ///
    /// A run that ends FAILED or STOPPED is still `Ok`; the outcome is in the
    /// returned status and exit message. `Err` means the status itself could
    /// not be recorded.
    #[instrument(skip_all, fields(job_execution_id = %job.id, job_name = %job.job_name))]
    pub async fn execute(
        mut self,
        job: JobExecution,
        step: StepExecution,
    ) -> Result<JobExecution, BatchError> {
        let mut machine = JobStateMachine::new(job.id, job.status);

        if self.cancel.is_cancelled() {
            return self.finish(&mut machine, &job, StepOutcome::Stopped).await;
        }

        machine.transition(&JobEvent::Start)?;
        if let Err(e) = self.repository.mark_started(job.id).await {
            self.record_failure(job.id, "start", &e).await;
            return Err(e.into());
        }
        log_job_operation(
            "start",
            Some(job.id),
            Some(&job.job_name),
            machine.current_state().as_str(),
            Some(&format!("checkpoint={}", step.checkpoint)),
        );

        let mut progress = StepProgress {
            job_execution_id: job.id,
            step_execution_id: step.id,
            sequence: step.counters.commit_count,
            pending: ExecutionCounters::default(),
            pending_checkpoint: step.checkpoint.clone(),
        };

        let outcome = self.run_step(&mut progress, step.checkpoint).await;
        self.finish(&mut machine, &job, outcome).await
    }

    async fn run_step(&mut self, progress: &mut StepProgress, start: PageCursor) -> StepOutcome {
        let mut cursor = start;

        loop {
            if self.cancel.is_cancelled() {
                return self.stop(progress);
            }

            let page = match self.reader.read_page(&cursor).await {
                Ok(page) => page,
                Err(e) => {
                    self.writer.discard();
                    return StepOutcome::Failed(e.to_string());
                }
            };

            if page.exhausted {
                break;
            }

            for (index, member) in page.items.iter().enumerate() {
                progress.pending.read_count += 1;

                match self.processor.process(member) {
                    Ok(Some(activity)) => self.writer.add(activity),
                    Ok(None) => progress.pending.filter_count += 1,
                    Err(e) => {
                        warn!(member_id = %member.id, error = %e, "Skipping member");
                        progress.pending.skip_count += 1;
                    }
                }

                if let Some(checkpoint) = page.cursor_after(index) {
                    progress.pending_checkpoint = checkpoint;
                }

                if self.writer.is_full() {
                    if let Err(cause) = self.commit(progress).await {
                        return StepOutcome::Failed(cause);
                    }
                }

                if self.cancel.is_cancelled() {
                    return self.stop(progress);
                }
            }

            cursor = page.next_cursor;
        }

        // Final partial chunk, or a counter-only commit for trailing filtered items
        if !self.writer.is_empty() || !progress.pending.is_empty() {
            if let Err(cause) = self.commit(progress).await {
                return StepOutcome::Failed(cause);
            }
        }

        StepOutcome::Completed
    }

    async fn commit(&mut self, progress: &mut StepProgress) -> Result<(), String> {
        let sequence = progress.sequence + 1;
        let ctx = FlushContext {
            job_execution_id: progress.job_execution_id,
            step_execution_id: progress.step_execution_id,
            sequence,
            contribution: progress.pending,
            checkpoint: progress.pending_checkpoint.clone(),
        };
        let checkpoint = ctx.checkpoint.to_string();

        match self.writer.flush(ctx).await {
            Ok(written) => {
                progress.sequence = sequence;
                progress.pending = ExecutionCounters::default();
                log_chunk_operation(
                    "commit",
                    progress.job_execution_id,
                    sequence,
                    written,
                    &checkpoint,
                    "committed",
                );
                Ok(())
            }
            Err(e) => {
                log_error(
                    "chunk_executor",
                    "commit",
                    &e.to_string(),
                    Some(&format!("job_execution_id={}", progress.job_execution_id)),
                );
                Err(e.to_string())
            }
        }
    }

    fn stop(&mut self, progress: &StepProgress) -> StepOutcome {
        let dropped = self.writer.discard();
        info!(
            job_execution_id = %progress.job_execution_id,
            dropped_activities = dropped,
            uncommitted_reads = progress.pending.read_count,
            "Stop requested, dropping uncommitted work"
        );
        StepOutcome::Stopped
    }

    /// A status write failed; try to leave the record FAILED instead of
    /// active, where it would block every later launch of the job
    async fn record_failure(&self, job_execution_id: Uuid, operation: &str, error: &StoreError) {
        log_error(
            "chunk_executor",
            operation,
            &error.to_string(),
            Some(&format!("job_execution_id={job_execution_id}")),
        );

        let cause = format!("failed to record {operation}: {error}");
        if let Err(e) = self.repository.mark_failed(job_execution_id, cause).await {
            log_error(
                "chunk_executor",
                "mark_failed",
                &e.to_string(),
                Some(&format!("job_execution_id={job_execution_id}")),
            );
        }
    }

    async fn finish(
        &self,
        machine: &mut JobStateMachine,
        job: &JobExecution,
        outcome: StepOutcome,
    ) -> Result<JobExecution, BatchError> {
        machine.transition(&outcome.event())?;

        let recorded = match outcome {
            StepOutcome::Completed => self.repository.mark_completed(job.id).await,
            StepOutcome::Stopped => {
                self.repository
                    .mark_stopped(job.id, STOPPED_BY_REQUEST.to_string())
                    .await
            }
            StepOutcome::Failed(cause) => self.repository.mark_failed(job.id, cause).await,
        };
        let finished = match recorded {
            Ok(finished) => finished,
            Err(e) => {
                if machine.current_state() != BatchStatus::Failed {
                    self.record_failure(job.id, "finish", &e).await;
                }
                return Err(e.into());
            }
        };

        log_job_operation(
            "finish",
            Some(finished.id),
            Some(&finished.job_name),
            finished.status.as_str(),
            finished.exit_message.as_deref(),
        );

        Ok(finished)
    }
}
