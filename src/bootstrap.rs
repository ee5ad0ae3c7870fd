//! # Bootstrap
//!
//! Assembles the engine from configuration: picks the store backend, builds
//! the launcher, and hands out the scheduler and web state. Everything is
//! constructed explicitly here; nothing else wires components together.

use std::sync::Arc;
use tracing::warn;

use crate::config::{BatchConfig, StoreBackend};
use crate::error::Result;
use crate::launcher::JobLauncher;
use crate::scheduler::JobScheduler;
use crate::store::postgres::TableNames;
use crate::store::{ChunkSink, InMemoryBatchStore, JobRepository, MemberSource, PgBatchStore};
use crate::web::AppState;

/// The backend chosen at startup, kept typed so callers can reach
/// backend-specific helpers
#[derive(Debug, Clone)]
pub enum StoreHandle {
    Memory(Arc<InMemoryBatchStore>),
    Postgres(Arc<PgBatchStore>),
}

impl StoreHandle {
    fn parts(
        &self,
    ) -> (
        Arc<dyn MemberSource>,
        Arc<dyn ChunkSink>,
        Arc<dyn JobRepository>,
    ) {
        match self {
            Self::Memory(store) => split(store),
            Self::Postgres(store) => split(store),
        }
    }
}

fn split<S>(
    store: &Arc<S>,
) -> (
    Arc<dyn MemberSource>,
    Arc<dyn ChunkSink>,
    Arc<dyn JobRepository>,
)
where
    S: MemberSource + ChunkSink + JobRepository + 'static,
{
    let source: Arc<dyn MemberSource> = store.clone();
    let sink: Arc<dyn ChunkSink> = store.clone();
    let repository: Arc<dyn JobRepository> = store.clone();
    (source, sink, repository)
}

#[derive(Debug, Clone)]
pub struct BatchContext {
    config: BatchConfig,
    store: StoreHandle,
    launcher: Arc<JobLauncher>,
}

impl BatchContext {
    /// Connect the configured backend and build the launcher
    pub async fn from_config(config: BatchConfig) -> Result<Self> {
        config.validate()?;

        let store = match config.database.backend {
            StoreBackend::Memory => {
                warn!("Using in-memory batch store; it starts with no members and keeps nothing across restarts");
                StoreHandle::Memory(Arc::new(InMemoryBatchStore::new()))
            }
            StoreBackend::Postgres => {
                let pg = PgBatchStore::connect(
                    &config.database,
                    TableNames::from(&config.collections),
                )
                .await?;
                if config.database.ensure_schema {
                    pg.ensure_schema().await?;
                }
                StoreHandle::Postgres(Arc::new(pg))
            }
        };

        Ok(Self::with_store(config, store))
    }

    /// Build around an existing store
    pub fn with_store(config: BatchConfig, store: StoreHandle) -> Self {
        let (source, sink, repository) = store.parts();
        let launcher = Arc::new(JobLauncher::new(
            source,
            sink,
            repository,
            config.batch.clone(),
        ));

        Self {
            config,
            store,
            launcher,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn launcher(&self) -> Arc<JobLauncher> {
        Arc::clone(&self.launcher)
    }

    /// Fail executions left active by a previous process, when configured
    pub async fn recover(&self) -> Result<usize> {
        if !self.config.batch.fail_interrupted_on_startup {
            return Ok(0);
        }
        let recovered = self
            .launcher
            .recover_interrupted(&self.config.batch.job_name)
            .await?;
        Ok(recovered.len())
    }

    pub fn scheduler(&self) -> JobScheduler {
        JobScheduler::new(
            self.launcher(),
            self.config.batch.job_name.clone(),
            self.config.scheduler.period(),
        )
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.launcher(),
            self.config.batch.job_name.clone(),
            self.config.batch.history_limit,
        )
    }
}
