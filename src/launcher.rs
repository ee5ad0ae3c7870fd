//! # Job Launcher
//!
//! Single entry point for starting a job execution, shared by the scheduler
//! and the HTTP trigger. A launch:
//!
//! 1. Resolves the starting cursor (fresh, or the checkpoint of the last
//!    FAILED/STOPPED execution when restart is enabled)
//! 2. Creates the execution through the repository's overlap guard; a
//!    concurrent active execution yields `BatchError::LaunchConflict` and
//!    nothing is created
//! 3. Builds a reader, processor and writer for this run and drives them to a
//!    terminal status
//!
//! The launcher also owns the cancellation tokens of running executions so
//! they can be stopped individually or all at once on shutdown.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::batch::{ChunkExecutor, ChunkWriter, MemberProcessor, MemberReader};
use crate::config::BatchSettings;
use crate::constants::messages::INTERRUPTED_BY_RESTART;
use crate::error::{BatchError, Result};
use crate::logging::log_job_operation;
use crate::models::{JobExecution, JobParameters, NewJobExecution, PageCursor};
use crate::store::{ChunkSink, JobRepository, MemberSource};

pub struct JobLauncher {
    source: Arc<dyn MemberSource>,
    sink: Arc<dyn ChunkSink>,
    repository: Arc<dyn JobRepository>,
    settings: BatchSettings,
    running: Arc<DashMap<Uuid, CancellationToken>>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for JobLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLauncher")
            .field("settings", &self.settings)
            .field("running", &self.running.len())
            .finish()
    }
}

impl JobLauncher {
    pub fn new(
        source: Arc<dyn MemberSource>,
        sink: Arc<dyn ChunkSink>,
        repository: Arc<dyn JobRepository>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            source,
            sink,
            repository,
            settings,
            running: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    pub fn repository(&self) -> Arc<dyn JobRepository> {
        Arc::clone(&self.repository)
    }

    /// Ids of executions this launcher is currently driving
    pub fn running_executions(&self) -> Vec<Uuid> {
        self.running.iter().map(|entry| *entry.key()).collect()
    }

    /// Launch `job_name` and run it to a terminal status.
    ///
    /// Returns the final execution record; a FAILED or STOPPED run is `Ok`.
    /// The run itself is a spawned task: dropping the returned future stops
    /// waiting for it but does not abandon it.
    #[instrument(skip(self, parameters), fields(parameters = %parameters.identity()))]
    pub async fn launch(&self, job_name: &str, parameters: JobParameters) -> Result<JobExecution> {
        let new_execution = self.prepare(job_name, parameters).await?;
        let (job, step) = self.repository.create_job_execution(new_execution).await?;

        log_job_operation(
            "launch",
            Some(job.id),
            Some(&job.job_name),
            job.status.as_str(),
            job.restarted_from
                .map(|from| format!("restarted_from={from}"))
                .as_deref(),
        );

        let cancel = self.shutdown.child_token();
        self.running.insert(job.id, cancel.clone());

        let executor = ChunkExecutor::new(
            MemberReader::new(
                Arc::clone(&self.source),
                self.settings.qualifying_status.clone(),
                self.settings.page_size,
                self.settings.paging,
            ),
            MemberProcessor::new(self.settings.action.clone(), Utc::now()),
            ChunkWriter::new(Arc::clone(&self.sink), self.settings.chunk_size),
            Arc::clone(&self.repository),
            cancel,
        );

        // Runs to a terminal status even when the caller stops waiting
        let running = Arc::clone(&self.running);
        let job_id = job.id;
        let run = tokio::spawn(async move {
            let outcome = executor.execute(job, step).await;
            running.remove(&job_id);
            outcome
        });

        match run.await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.running.remove(&job_id);
                Err(BatchError::ExecutionTask {
                    job_execution_id: job_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Decide where the new execution starts reading
    async fn prepare(&self, job_name: &str, parameters: JobParameters) -> Result<NewJobExecution> {
        let fresh = NewJobExecution::new(job_name, self.settings.step_name.clone(), parameters);

        if !self.settings.restart_from_checkpoint {
            return Ok(fresh);
        }

        let Some((previous, step)) = self.repository.find_restartable(job_name).await? else {
            return Ok(fresh);
        };

        if step.checkpoint.is_start() {
            return Ok(fresh);
        }

        if !self.settings.paging.accepts(&step.checkpoint) {
            warn!(
                previous_execution_id = %previous.id,
                checkpoint = %step.checkpoint,
                paging = %self.settings.paging,
                "Checkpoint was written under a different paging strategy, starting fresh"
            );
            return Ok(fresh);
        }

        info!(
            previous_execution_id = %previous.id,
            previous_status = %previous.status,
            checkpoint = %step.checkpoint,
            "Resuming from last committed chunk"
        );
        Ok(fresh.resuming(previous.id, step.checkpoint))
    }

    /// Request a running execution to stop after its in-flight commit.
    ///
    /// Returns false when this launcher is not driving that execution.
    pub fn stop(&self, job_execution_id: Uuid) -> bool {
        match self.running.get(&job_execution_id) {
            Some(token) => {
                token.cancel();
                info!(job_execution_id = %job_execution_id, "Stop requested");
                true
            }
            None => false,
        }
    }

    /// Stop every running execution
    pub fn shutdown(&self) {
        info!(running = self.running.len(), "Stopping all running executions");
        self.shutdown.cancel();
    }

    /// Mark executions of `job_name` still active in the store as FAILED.
    ///
    /// Meant for process start, before anything is launched: an active record
    /// at that point belongs to a process that died mid-run and would block
    /// every future launch. Returns the ids that were failed.
    #[instrument(skip(self))]
    pub async fn recover_interrupted(&self, job_name: &str) -> Result<Vec<Uuid>> {
        let mut recovered = Vec::new();

        while let Some(active) = self.repository.find_active(job_name).await? {
            if self.running.contains_key(&active.id) {
                break;
            }
            warn!(
                job_execution_id = %active.id,
                status = %active.status,
                "Failing execution interrupted by a previous process"
            );
            self.repository
                .mark_failed(active.id, INTERRUPTED_BY_RESTART.to_string())
                .await?;
            recovered.push(active.id);
        }

        Ok(recovered)
    }

    /// Checkpoint a relaunch of `job_name` would resume from, if any
    pub async fn resume_point(&self, job_name: &str) -> Result<Option<PageCursor>> {
        let prepared = self.prepare(job_name, JobParameters::new()).await?;
        Ok(prepared.restarted_from.map(|_| prepared.checkpoint))
    }
}
