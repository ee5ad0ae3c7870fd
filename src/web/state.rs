//! # Web API Application State

use std::sync::Arc;

use crate::launcher::JobLauncher;
use crate::store::JobRepository;

/// Shared by every handler; cheap to clone
#[derive(Debug, Clone)]
pub struct AppState {
    launcher: Arc<JobLauncher>,
    job_name: Arc<str>,
    history_limit: usize,
}

impl AppState {
    pub fn new(launcher: Arc<JobLauncher>, job_name: impl Into<String>, history_limit: usize) -> Self {
        Self {
            launcher,
            job_name: Arc::from(job_name.into()),
            history_limit,
        }
    }

    pub fn launcher(&self) -> &JobLauncher {
        &self.launcher
    }

    pub fn repository(&self) -> Arc<dyn JobRepository> {
        self.launcher.repository()
    }

    /// Job launched by the manual trigger
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// History page size when the request gives none
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }
}
