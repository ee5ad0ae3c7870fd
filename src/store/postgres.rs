//! # PostgreSQL Batch Store
//!
//! sqlx-backed implementation of the store traits. Input and output
//! collections live in the same database as the execution metadata, so each
//! chunk commit (activity upserts, step and job counters, checkpoint, chunk
//! sequence) is a single transaction.
//!
//! ## Overlap Guard
//!
//! A partial unique index allows at most one STARTING/STARTED row per job
//! name. Two processes racing to launch the same job both attempt the insert;
//! the loser receives a unique violation (SQLSTATE 23505), which is reported
//! as `StoreError::ActiveExecutionExists`.
//!
//! ## Schema
//!
//! Table names come from configuration and are validated as plain SQL
//! identifiers before they reach this module. [`PgBatchStore::ensure_schema`]
//! creates missing tables and indexes; it never alters existing ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use super::repository::JobRepository;
use super::{ChunkCommit, ChunkSink, MemberQuery, MemberSource};
use crate::config::{CollectionsConfig, DatabaseConfig};
use crate::models::{
    ExecutionCounters, JobExecution, JobParameters, Member, NewJobExecution, PageCursor,
    StepExecution,
};
use crate::state_machine::BatchStatus;

const UNIQUE_VIOLATION: &str = "23505";

const JOB_COLUMNS: &str = "id, job_name, parameters, status, read_count, write_count, \
     filter_count, skip_count, commit_count, created_at, start_time, end_time, \
     exit_message, restarted_from";

const STEP_COLUMNS: &str = "id, job_execution_id, step_name, status, read_count, write_count, \
     filter_count, skip_count, commit_count, checkpoint, start_time, end_time, exit_message";

/// Physical table names for the four collections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub members: String,
    pub activities: String,
    pub job_executions: String,
    pub step_executions: String,
}

impl From<&CollectionsConfig> for TableNames {
    fn from(collections: &CollectionsConfig) -> Self {
        Self {
            members: collections.input.clone(),
            activities: collections.output.clone(),
            job_executions: collections.job_executions.clone(),
            step_executions: collections.step_executions.clone(),
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self::from(&CollectionsConfig::default())
    }
}

impl TableNames {
    fn single_active_index(&self) -> String {
        format!("{}_single_active_idx", self.job_executions)
    }

    /// DDL statements in dependency order
    pub fn schema_statements(&self) -> Vec<String> {
        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {members} (
                    id TEXT COLLATE \"C\" PRIMARY KEY,
                    name TEXT,
                    status TEXT,
                    policy_status TEXT
                )",
                members = self.members
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {members}_status_id_idx ON {members} (status, id)",
                members = self.members
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {activities} (
                    member_id TEXT PRIMARY KEY,
                    name TEXT,
                    action TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL
                )",
                activities = self.activities
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {jobs} (
                    id UUID PRIMARY KEY,
                    job_name TEXT NOT NULL,
                    parameters JSONB NOT NULL,
                    status TEXT NOT NULL,
                    read_count BIGINT NOT NULL DEFAULT 0,
                    write_count BIGINT NOT NULL DEFAULT 0,
                    filter_count BIGINT NOT NULL DEFAULT 0,
                    skip_count BIGINT NOT NULL DEFAULT 0,
                    commit_count BIGINT NOT NULL DEFAULT 0,
                    created_at TIMESTAMPTZ NOT NULL,
                    start_time TIMESTAMPTZ,
                    end_time TIMESTAMPTZ,
                    exit_message TEXT,
                    restarted_from UUID
                )",
                jobs = self.job_executions
            ),
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {index} ON {jobs} (job_name)
                 WHERE status IN ('STARTING', 'STARTED')",
                index = self.single_active_index(),
                jobs = self.job_executions
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {jobs}_name_created_idx ON {jobs} (job_name, created_at DESC)",
                jobs = self.job_executions
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {steps} (
                    id UUID PRIMARY KEY,
                    job_execution_id UUID NOT NULL UNIQUE REFERENCES {jobs} (id),
                    step_name TEXT NOT NULL,
                    status TEXT NOT NULL,
                    read_count BIGINT NOT NULL DEFAULT 0,
                    write_count BIGINT NOT NULL DEFAULT 0,
                    filter_count BIGINT NOT NULL DEFAULT 0,
                    skip_count BIGINT NOT NULL DEFAULT 0,
                    commit_count BIGINT NOT NULL DEFAULT 0,
                    checkpoint JSONB NOT NULL,
                    start_time TIMESTAMPTZ,
                    end_time TIMESTAMPTZ,
                    exit_message TEXT
                )",
                steps = self.step_executions,
                jobs = self.job_executions
            ),
        ]
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn parse_status(entity: &'static str, value: &str) -> StoreResult<BatchStatus> {
    value
        .parse()
        .map_err(|reason| StoreError::Corrupt { entity, reason })
}

#[derive(Debug, FromRow)]
struct JobExecutionRow {
    id: Uuid,
    job_name: String,
    parameters: Json<JobParameters>,
    status: String,
    read_count: i64,
    write_count: i64,
    filter_count: i64,
    skip_count: i64,
    commit_count: i64,
    created_at: DateTime<Utc>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    exit_message: Option<String>,
    restarted_from: Option<Uuid>,
}

impl TryFrom<JobExecutionRow> for JobExecution {
    type Error = StoreError;

    fn try_from(row: JobExecutionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            job_name: row.job_name,
            parameters: row.parameters.0,
            status: parse_status("job_execution", &row.status)?,
            counters: ExecutionCounters {
                read_count: to_u64(row.read_count),
                write_count: to_u64(row.write_count),
                filter_count: to_u64(row.filter_count),
                skip_count: to_u64(row.skip_count),
                commit_count: to_u64(row.commit_count),
            },
            created_at: row.created_at,
            start_time: row.start_time,
            end_time: row.end_time,
            exit_message: row.exit_message,
            restarted_from: row.restarted_from,
        })
    }
}

#[derive(Debug, FromRow)]
struct StepExecutionRow {
    id: Uuid,
    job_execution_id: Uuid,
    step_name: String,
    status: String,
    read_count: i64,
    write_count: i64,
    filter_count: i64,
    skip_count: i64,
    commit_count: i64,
    checkpoint: Json<PageCursor>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    exit_message: Option<String>,
}

impl TryFrom<StepExecutionRow> for StepExecution {
    type Error = StoreError;

    fn try_from(row: StepExecutionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            job_execution_id: row.job_execution_id,
            step_name: row.step_name,
            status: parse_status("step_execution", &row.status)?,
            counters: ExecutionCounters {
                read_count: to_u64(row.read_count),
                write_count: to_u64(row.write_count),
                filter_count: to_u64(row.filter_count),
                skip_count: to_u64(row.skip_count),
                commit_count: to_u64(row.commit_count),
            },
            checkpoint: row.checkpoint.0,
            start_time: row.start_time,
            end_time: row.end_time,
            exit_message: row.exit_message,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgBatchStore {
    pool: PgPool,
    tables: TableNames,
}

impl PgBatchStore {
    pub fn new(pool: PgPool, tables: TableNames) -> Self {
        Self { pool, tables }
    }

    /// Open a connection pool from configuration
    pub async fn connect(config: &DatabaseConfig, tables: TableNames) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected batch store to PostgreSQL"
        );

        Ok(Self::new(pool, tables))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Create any missing tables and indexes
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in self.tables.schema_statements() {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        debug!(tables = ?self.tables, "Batch schema ensured");
        Ok(())
    }

    /// Explain why a guarded step update touched no row
    async fn diagnose_rejected_commit(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        commit: &ChunkCommit,
    ) -> StoreResult<StoreError> {
        let row: Option<StepExecutionRow> = sqlx::query_as(&format!(
            "SELECT {STEP_COLUMNS} FROM {} WHERE id = $1 AND job_execution_id = $2",
            self.tables.step_executions
        ))
        .bind(commit.step_execution_id)
        .bind(commit.job_execution_id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else {
            return Ok(StoreError::NotFound {
                entity: "step_execution",
                id: commit.step_execution_id.to_string(),
            });
        };
        let step = StepExecution::try_from(row)?;

        if step.status != BatchStatus::Started {
            return Ok(StoreError::NotAcceptingChunks {
                execution_id: commit.job_execution_id,
                status: step.status,
            });
        }

        Ok(StoreError::StaleChunk {
            step_execution_id: step.id,
            expected: step.counters.commit_count + 1,
            actual: commit.sequence,
        })
    }
}

#[async_trait]
impl MemberSource for PgBatchStore {
    async fn fetch_members(&self, query: &MemberQuery) -> StoreResult<Vec<Member>> {
        let limit = to_i64(query.limit as u64);

        let members = match &query.cursor {
            PageCursor::Offset { skip } => {
                sqlx::query_as::<_, Member>(&format!(
                    "SELECT id, name, status, policy_status FROM {}
                     WHERE status = $1
                     ORDER BY id ASC
                     OFFSET $2 LIMIT $3",
                    self.tables.members
                ))
                .bind(&query.status)
                .bind(to_i64(*skip))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            cursor => {
                sqlx::query_as::<_, Member>(&format!(
                    "SELECT id, name, status, policy_status FROM {}
                     WHERE status = $1 AND ($2::TEXT IS NULL OR id > $2)
                     ORDER BY id ASC
                     LIMIT $3",
                    self.tables.members
                ))
                .bind(&query.status)
                .bind(cursor.last_id())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(members)
    }
}

#[async_trait]
impl ChunkSink for PgBatchStore {
    async fn commit_chunk(&self, commit: &ChunkCommit) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let contribution = &commit.contribution;

        // Guarded on the chunk sequence marker and the STARTED status
        let step_update = sqlx::query(&format!(
            "UPDATE {} SET
                read_count = read_count + $3,
                write_count = write_count + $4,
                filter_count = filter_count + $5,
                skip_count = skip_count + $6,
                commit_count = commit_count + 1,
                checkpoint = $7
             WHERE id = $1 AND job_execution_id = $2
               AND commit_count = $8 AND status = 'STARTED'",
            self.tables.step_executions
        ))
        .bind(commit.step_execution_id)
        .bind(commit.job_execution_id)
        .bind(to_i64(contribution.read_count))
        .bind(to_i64(contribution.write_count))
        .bind(to_i64(contribution.filter_count))
        .bind(to_i64(contribution.skip_count))
        .bind(Json(&commit.checkpoint))
        .bind(to_i64(commit.sequence.saturating_sub(1)))
        .execute(&mut *tx)
        .await?;

        if commit.sequence == 0 || step_update.rows_affected() == 0 {
            let error = self.diagnose_rejected_commit(&mut tx, commit).await?;
            tx.rollback().await?;
            return Err(error);
        }

        if !commit.items.is_empty() {
            let mut upsert: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} (member_id, name, action, status, created_at) ",
                self.tables.activities
            ));
            upsert.push_values(&commit.items, |mut row, activity| {
                row.push_bind(&activity.member_id)
                    .push_bind(&activity.name)
                    .push_bind(&activity.action)
                    .push_bind(&activity.status)
                    .push_bind(activity.created_at);
            });
            upsert.push(
                " ON CONFLICT (member_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    action = EXCLUDED.action,
                    status = EXCLUDED.status,
                    created_at = EXCLUDED.created_at",
            );
            upsert.build().execute(&mut *tx).await?;
        }

        sqlx::query(&format!(
            "UPDATE {} SET
                read_count = read_count + $2,
                write_count = write_count + $3,
                filter_count = filter_count + $4,
                skip_count = skip_count + $5,
                commit_count = commit_count + 1
             WHERE id = $1",
            self.tables.job_executions
        ))
        .bind(commit.job_execution_id)
        .bind(to_i64(contribution.read_count))
        .bind(to_i64(contribution.write_count))
        .bind(to_i64(contribution.filter_count))
        .bind(to_i64(contribution.skip_count))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            job_execution_id = %commit.job_execution_id,
            sequence = commit.sequence,
            written = commit.items.len(),
            "Committed chunk to PostgreSQL"
        );

        Ok(())
    }
}

#[async_trait]
impl JobRepository for PgBatchStore {
    async fn create_job_execution(
        &self,
        new_execution: NewJobExecution,
    ) -> StoreResult<(JobExecution, StepExecution)> {
        let (job, step) = new_execution.into_records(Utc::now());
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO {} (id, job_name, parameters, status, created_at, restarted_from)
             VALUES ($1, $2, $3, $4, $5, $6)",
            self.tables.job_executions
        ))
        .bind(job.id)
        .bind(&job.job_name)
        .bind(Json(&job.parameters))
        .bind(job.status.as_str())
        .bind(job.created_at)
        .bind(job.restarted_from)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(ref db_err))
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                    && db_err.constraint() == Some(self.tables.single_active_index().as_str()) =>
            {
                tx.rollback().await?;
                let active = self.find_active(&job.job_name).await?;
                return Err(StoreError::ActiveExecutionExists {
                    job_name: job.job_name,
                    // The blocking run may have finished between the two statements
                    execution_id: active.map(|a| a.id).unwrap_or_else(Uuid::nil),
                });
            }
            Err(e) => return Err(e.into()),
        }

        sqlx::query(&format!(
            "INSERT INTO {} (id, job_execution_id, step_name, status, checkpoint)
             VALUES ($1, $2, $3, $4, $5)",
            self.tables.step_executions
        ))
        .bind(step.id)
        .bind(step.job_execution_id)
        .bind(&step.step_name)
        .bind(step.status.as_str())
        .bind(Json(&step.checkpoint))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((job, step))
    }

    async fn update_status(
        &self,
        job_execution_id: Uuid,
        status: BatchStatus,
        exit_message: Option<String>,
    ) -> StoreResult<JobExecution> {
        let predecessors: Vec<String> = BatchStatus::predecessors(status)
            .iter()
            .map(|state| state.as_str().to_string())
            .collect();

        let mut tx = self.pool.begin().await?;

        let row: Option<JobExecutionRow> = sqlx::query_as(&format!(
            "UPDATE {} SET
                status = $2,
                start_time = CASE WHEN $2 = 'STARTED' THEN NOW() ELSE start_time END,
                end_time = CASE WHEN $3 THEN NOW() ELSE end_time END,
                exit_message = COALESCE($4, exit_message)
             WHERE id = $1 AND status = ANY($5)
             RETURNING {JOB_COLUMNS}",
            self.tables.job_executions
        ))
        .bind(job_execution_id)
        .bind(status.as_str())
        .bind(status.is_terminal())
        .bind(&exit_message)
        .bind(&predecessors)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return match self.find_job_execution(job_execution_id).await? {
                Some(current) => Err(StoreError::InvalidTransition {
                    execution_id: job_execution_id,
                    from: current.status,
                    to: status,
                }),
                None => Err(StoreError::NotFound {
                    entity: "job_execution",
                    id: job_execution_id.to_string(),
                }),
            };
        };

        sqlx::query(&format!(
            "UPDATE {} SET
                status = $2,
                start_time = CASE WHEN $2 = 'STARTED' THEN NOW() ELSE start_time END,
                end_time = CASE WHEN $3 THEN NOW() ELSE end_time END,
                exit_message = COALESCE($4, exit_message)
             WHERE job_execution_id = $1",
            self.tables.step_executions
        ))
        .bind(job_execution_id)
        .bind(status.as_str())
        .bind(status.is_terminal())
        .bind(&exit_message)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        JobExecution::try_from(row)
    }

    async fn find_active(&self, job_name: &str) -> StoreResult<Option<JobExecution>> {
        let row: Option<JobExecutionRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM {}
             WHERE job_name = $1 AND status IN ('STARTING', 'STARTED')
             LIMIT 1",
            self.tables.job_executions
        ))
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobExecution::try_from).transpose()
    }

    async fn find_job_execution(
        &self,
        job_execution_id: Uuid,
    ) -> StoreResult<Option<JobExecution>> {
        let row: Option<JobExecutionRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM {} WHERE id = $1",
            self.tables.job_executions
        ))
        .bind(job_execution_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobExecution::try_from).transpose()
    }

    async fn find_step_execution(
        &self,
        job_execution_id: Uuid,
    ) -> StoreResult<Option<StepExecution>> {
        let row: Option<StepExecutionRow> = sqlx::query_as(&format!(
            "SELECT {STEP_COLUMNS} FROM {} WHERE job_execution_id = $1",
            self.tables.step_executions
        ))
        .bind(job_execution_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StepExecution::try_from).transpose()
    }

    async fn find_last_execution(&self, job_name: &str) -> StoreResult<Option<JobExecution>> {
        let row: Option<JobExecutionRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM {}
             WHERE job_name = $1
             ORDER BY created_at DESC
             LIMIT 1",
            self.tables.job_executions
        ))
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobExecution::try_from).transpose()
    }

    async fn list_job_executions(
        &self,
        job_name: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<JobExecution>> {
        let rows: Vec<JobExecutionRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM {}
             WHERE ($1::TEXT IS NULL OR job_name = $1)
             ORDER BY created_at DESC
             LIMIT $2",
            self.tables.job_executions
        ))
        .bind(job_name)
        .bind(to_i64(limit as u64))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobExecution::try_from).collect()
    }
}
