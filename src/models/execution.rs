//! # Execution Records
//!
//! Job and step execution metadata: the system of record operators inspect
//! for run history. Records are created at launch, advanced only by chunk
//! commits and status transitions, and never deleted by the engine.
//!
//! ## Counters
//!
//! - `read_count`: qualifying members consumed from the source
//! - `write_count`: activities upserted
//! - `filter_count`: members dropped by the processor's policy predicate
//! - `skip_count`: members skipped because a required field was missing
//! - `commit_count`: committed chunks; doubles as the chunk sequence marker
//!
//! `write_count + filter_count + skip_count == read_count` holds for every
//! committed state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job_parameters::JobParameters;
use super::page_cursor::PageCursor;
use crate::state_machine::BatchStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionCounters {
    pub read_count: u64,
    pub write_count: u64,
    pub filter_count: u64,
    pub skip_count: u64,
    pub commit_count: u64,
}

impl ExecutionCounters {
    /// Add a chunk contribution; `commit_count` advances by exactly one
    pub fn apply_commit(&mut self, contribution: &ExecutionCounters) {
        self.read_count += contribution.read_count;
        self.write_count += contribution.write_count;
        self.filter_count += contribution.filter_count;
        self.skip_count += contribution.skip_count;
        self.commit_count += 1;
    }

    /// True when no item has been read since the last commit
    pub fn is_empty(&self) -> bool {
        self.read_count == 0
            && self.write_count == 0
            && self.filter_count == 0
            && self.skip_count == 0
    }

    /// Items accounted for by the processor outcome counters
    pub fn processed_count(&self) -> u64 {
        self.write_count + self.filter_count + self.skip_count
    }
}

/// One launch attempt of a named job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_name: String,
    pub parameters: JobParameters,
    pub status: BatchStatus,
    #[serde(flatten)]
    pub counters: ExecutionCounters,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Failure cause or stop reason
    pub exit_message: Option<String>,
    /// Execution whose checkpoint this one resumed from
    pub restarted_from: Option<Uuid>,
}

/// The single read-process-write phase of a job execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: Uuid,
    pub job_execution_id: Uuid,
    pub step_name: String,
    pub status: BatchStatus,
    #[serde(flatten)]
    pub counters: ExecutionCounters,
    /// Reader position after the last committed chunk
    pub checkpoint: PageCursor,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub exit_message: Option<String>,
}

/// Everything the repository needs to create a job execution and its step
#[derive(Debug, Clone)]
pub struct NewJobExecution {
    pub job_name: String,
    pub parameters: JobParameters,
    pub step_name: String,
    /// Starting position; `PageCursor::Start` unless resuming
    pub checkpoint: PageCursor,
    pub restarted_from: Option<Uuid>,
}

impl NewJobExecution {
    pub fn new(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        parameters: JobParameters,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            parameters,
            step_name: step_name.into(),
            checkpoint: PageCursor::Start,
            restarted_from: None,
        }
    }

    pub fn resuming(mut self, from_execution: Uuid, checkpoint: PageCursor) -> Self {
        self.restarted_from = Some(from_execution);
        self.checkpoint = checkpoint;
        self
    }

    /// Build the in-memory records; backends assign ids and timestamps here
    pub fn into_records(self, now: DateTime<Utc>) -> (JobExecution, StepExecution) {
        let job = JobExecution {
            id: Uuid::new_v4(),
            job_name: self.job_name,
            parameters: self.parameters,
            status: BatchStatus::Starting,
            counters: ExecutionCounters::default(),
            created_at: now,
            start_time: None,
            end_time: None,
            exit_message: None,
            restarted_from: self.restarted_from,
        };
        let step = StepExecution {
            id: Uuid::new_v4(),
            job_execution_id: job.id,
            step_name: self.step_name,
            status: BatchStatus::Starting,
            counters: ExecutionCounters::default(),
            checkpoint: self.checkpoint,
            start_time: None,
            end_time: None,
            exit_message: None,
        };
        (job, step)
    }
}
