#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Member Batch
//!
//! Chunk-oriented batch engine that turns qualifying member records into
//! activity records.
//!
//! ## Overview
//!
//! A run reads members whose status qualifies, page by page in id order,
//! transforms those with an active policy into activities, and upserts the
//! activities in fixed-size chunks. Each chunk commit also advances the run's
//! counters and checkpoint in the same transaction, so a crash never leaves a
//! half-written chunk and a restarted run resumes where the last one stopped.
//!
//! Runs are launched by a fixed-rate scheduler or a manual HTTP trigger. At
//! most one execution per job name is active at any time.
//!
//! ## Module Organization
//!
//! - [`batch`] - reader, processor, writer and the chunk executor
//! - [`store`] - storage traits with in-memory and PostgreSQL backends
//! - [`state_machine`] - job execution lifecycle
//! - [`launcher`] - overlap-guarded launch, restart and stop
//! - [`scheduler`] - fixed-rate background trigger
//! - [`web`] - manual trigger and execution history over HTTP
//! - [`bootstrap`] - explicit assembly from configuration
//! - [`config`] - layered configuration
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use member_batch::bootstrap::BatchContext;
//! use member_batch::config::BatchConfig;
//! use member_batch::models::JobParameters;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = BatchContext::from_config(BatchConfig::default()).await?;
//! let execution = context
//!     .launcher()
//!     .launch("memberActivityJob", JobParameters::manual(chrono::Utc::now()))
//!     .await?;
//! println!("{} wrote {} activities", execution.status, execution.counters.write_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests against the in-memory store
//! DATABASE_URL=postgres://... cargo test -- --ignored   # PostgreSQL store tests
//! ```

pub mod batch;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod state_machine;
pub mod store;
pub mod web;

pub use batch::{ChunkExecutor, ChunkWriter, MemberProcessor, MemberReader, PagingStrategy};
pub use bootstrap::BatchContext;
pub use config::{BatchConfig, ConfigManager};
pub use error::{BatchError, Result};
pub use launcher::JobLauncher;
pub use models::{Activity, JobExecution, JobParameters, Member, PageCursor, StepExecution};
pub use scheduler::{JobScheduler, SchedulerHandle};
pub use state_machine::BatchStatus;
pub use store::{BatchStore, InMemoryBatchStore, JobRepository, PgBatchStore};
