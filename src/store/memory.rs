//! # In-Memory Batch Store
//!
//! Single-process backend holding members, activities and execution records
//! behind one lock. Every trait operation takes the lock exactly once, which
//! makes the overlap guard's check-and-create and each chunk commit atomic.
//!
//! The store also carries a [`FaultPlan`] so tests can fail a page fetch or a
//! chunk commit part-way through and observe that nothing leaked.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tracing::debug;
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use super::repository::JobRepository;
use super::{ChunkCommit, ChunkSink, MemberQuery, MemberSource};
use crate::models::{Activity, JobExecution, Member, NewJobExecution, PageCursor, StepExecution};
use crate::state_machine::BatchStatus;

/// Failure to raise while committing one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitFault {
    /// Chunk sequence the failure applies to
    pub sequence: u64,
    /// Items staged before the failure; at or past the chunk length the
    /// failure hits the counter update instead
    pub after_items: usize,
}

/// One-shot failures to inject; each fires once and then clears itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Fail the fetch that follows this many successful fetches
    pub fail_fetch_after: Option<usize>,
    pub fail_commit: Option<CommitFault>,
}

/// Record of an applied chunk commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedChunk {
    pub job_execution_id: Uuid,
    pub sequence: u64,
    pub written: usize,
    pub checkpoint: PageCursor,
}

#[derive(Debug, Default)]
struct MemoryState {
    members: BTreeMap<String, Member>,
    activities: BTreeMap<String, Activity>,
    /// Creation order
    jobs: Vec<JobExecution>,
    /// Keyed by job execution id
    steps: HashMap<Uuid, StepExecution>,
    commit_log: Vec<CommittedChunk>,
    fetches: usize,
    faults: FaultPlan,
}

#[derive(Debug, Default)]
pub struct InMemoryBatchStore {
    state: Mutex<MemoryState>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(members: impl IntoIterator<Item = Member>) -> Self {
        let store = Self::new();
        store.insert_members(members);
        store
    }

    pub fn insert_members(&self, members: impl IntoIterator<Item = Member>) {
        let mut state = self.state.lock();
        for member in members {
            state.members.insert(member.id.clone(), member);
        }
    }

    pub fn remove_member(&self, id: &str) -> Option<Member> {
        self.state.lock().members.remove(id)
    }

    /// All stored activities ordered by member id
    pub fn activities(&self) -> Vec<Activity> {
        self.state.lock().activities.values().cloned().collect()
    }

    pub fn activity(&self, member_id: &str) -> Option<Activity> {
        self.state.lock().activities.get(member_id).cloned()
    }

    pub fn commit_log(&self) -> Vec<CommittedChunk> {
        self.state.lock().commit_log.clone()
    }

    /// Number of member fetches served, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        self.state.lock().faults = faults;
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = FaultPlan::default();
    }

    pub fn fail_fetch_after(&self, successful_fetches: usize) {
        self.state.lock().faults.fail_fetch_after = Some(successful_fetches);
    }

    pub fn fail_commit(&self, sequence: u64, after_items: usize) {
        self.state.lock().faults.fail_commit = Some(CommitFault {
            sequence,
            after_items,
        });
    }
}

#[async_trait]
impl MemberSource for InMemoryBatchStore {
    async fn fetch_members(&self, query: &MemberQuery) -> StoreResult<Vec<Member>> {
        let mut state = self.state.lock();
        state.fetches += 1;

        if let Some(remaining) = state.faults.fail_fetch_after {
            if remaining == 0 {
                state.faults.fail_fetch_after = None;
                return Err(StoreError::Injected(format!(
                    "member fetch at cursor {} failed",
                    query.cursor
                )));
            }
            state.faults.fail_fetch_after = Some(remaining - 1);
        }

        let lower = match &query.cursor {
            PageCursor::After { last_id } => Bound::Excluded(last_id.as_str()),
            PageCursor::Start | PageCursor::Offset { .. } => Bound::Unbounded,
        };
        let skip = usize::try_from(query.cursor.skip()).unwrap_or(usize::MAX);

        let page: Vec<Member> = state
            .members
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(_, member)| member)
            .filter(|member| member.has_status(&query.status))
            .skip(skip)
            .take(query.limit)
            .cloned()
            .collect();

        Ok(page)
    }
}

#[async_trait]
impl ChunkSink for InMemoryBatchStore {
    async fn commit_chunk(&self, commit: &ChunkCommit) -> StoreResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.id == commit.job_execution_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "job_execution",
                id: commit.job_execution_id.to_string(),
            })?;
        let step = state
            .steps
            .get_mut(&commit.job_execution_id)
            .filter(|step| step.id == commit.step_execution_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "step_execution",
                id: commit.step_execution_id.to_string(),
            })?;

        if job.status != BatchStatus::Started {
            return Err(StoreError::NotAcceptingChunks {
                execution_id: job.id,
                status: job.status,
            });
        }

        let expected = step.counters.commit_count + 1;
        if commit.sequence != expected {
            return Err(StoreError::StaleChunk {
                step_execution_id: step.id,
                expected,
                actual: commit.sequence,
            });
        }

        let fault = state
            .faults
            .fail_commit
            .filter(|fault| fault.sequence == commit.sequence);

        // Stage every write before touching stored state
        let mut staged = Vec::with_capacity(commit.items.len());
        for (index, item) in commit.items.iter().enumerate() {
            if fault.is_some_and(|fault| fault.after_items == index) {
                state.faults.fail_commit = None;
                return Err(StoreError::Injected(format!(
                    "chunk {} failed after {index} staged writes",
                    commit.sequence
                )));
            }
            staged.push(item.clone());
        }
        if fault.is_some() {
            state.faults.fail_commit = None;
            return Err(StoreError::Injected(format!(
                "chunk {} failed during counter update",
                commit.sequence
            )));
        }

        for activity in staged {
            state.activities.insert(activity.member_id.clone(), activity);
        }
        step.counters.apply_commit(&commit.contribution);
        step.checkpoint = commit.checkpoint.clone();
        job.counters.apply_commit(&commit.contribution);

        state.commit_log.push(CommittedChunk {
            job_execution_id: commit.job_execution_id,
            sequence: commit.sequence,
            written: commit.items.len(),
            checkpoint: commit.checkpoint.clone(),
        });

        debug!(
            job_execution_id = %commit.job_execution_id,
            sequence = commit.sequence,
            written = commit.items.len(),
            "Committed chunk to in-memory store"
        );

        Ok(())
    }
}

#[async_trait]
impl JobRepository for InMemoryBatchStore {
    async fn create_job_execution(
        &self,
        new_execution: NewJobExecution,
    ) -> StoreResult<(JobExecution, StepExecution)> {
        let mut state = self.state.lock();

        if let Some(active) = state
            .jobs
            .iter()
            .find(|job| job.job_name == new_execution.job_name && job.status.is_active())
        {
            return Err(StoreError::ActiveExecutionExists {
                job_name: new_execution.job_name,
                execution_id: active.id,
            });
        }

        let (job, step) = new_execution.into_records(Utc::now());
        state.jobs.push(job.clone());
        state.steps.insert(job.id, step.clone());

        Ok((job, step))
    }

    async fn update_status(
        &self,
        job_execution_id: Uuid,
        status: BatchStatus,
        exit_message: Option<String>,
    ) -> StoreResult<JobExecution> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.id == job_execution_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "job_execution",
                id: job_execution_id.to_string(),
            })?;

        if !job.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                execution_id: job_execution_id,
                from: job.status,
                to: status,
            });
        }

        let now = Utc::now();
        job.status = status;
        if status == BatchStatus::Started {
            job.start_time = Some(now);
        }
        if status.is_terminal() {
            job.end_time = Some(now);
        }
        if exit_message.is_some() {
            job.exit_message = exit_message.clone();
        }

        if let Some(step) = state.steps.get_mut(&job_execution_id) {
            step.status = status;
            if status == BatchStatus::Started {
                step.start_time = Some(now);
            }
            if status.is_terminal() {
                step.end_time = Some(now);
            }
            if exit_message.is_some() {
                step.exit_message = exit_message;
            }
        }

        Ok(job.clone())
    }

    async fn find_active(&self, job_name: &str) -> StoreResult<Option<JobExecution>> {
        Ok(self
            .state
            .lock()
            .jobs
            .iter()
            .find(|job| job.job_name == job_name && job.status.is_active())
            .cloned())
    }

    async fn find_job_execution(
        &self,
        job_execution_id: Uuid,
    ) -> StoreResult<Option<JobExecution>> {
        Ok(self
            .state
            .lock()
            .jobs
            .iter()
            .find(|job| job.id == job_execution_id)
            .cloned())
    }

    async fn find_step_execution(
        &self,
        job_execution_id: Uuid,
    ) -> StoreResult<Option<StepExecution>> {
        Ok(self.state.lock().steps.get(&job_execution_id).cloned())
    }

    async fn find_last_execution(&self, job_name: &str) -> StoreResult<Option<JobExecution>> {
        Ok(self
            .state
            .lock()
            .jobs
            .iter()
            .rev()
            .find(|job| job.job_name == job_name)
            .cloned())
    }

    async fn list_job_executions(
        &self,
        job_name: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<JobExecution>> {
        Ok(self
            .state
            .lock()
            .jobs
            .iter()
            .rev()
            .filter(|job| job_name.map_or(true, |name| job.job_name == name))
            .take(limit)
            .cloned()
            .collect())
    }
}
