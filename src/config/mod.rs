//! # Batch Configuration System
//!
//! Layered configuration for the member batch engine, loaded with the
//! `config` crate in this order (later layers win):
//!
//! 1. Built-in defaults ([`BatchConfig::default`])
//! 2. `config/batch.toml`
//! 3. `config/batch.<environment>.toml`
//! 4. Environment variables prefixed `BATCH__`, nested with `__`
//!    (e.g. `BATCH__BATCH__CHUNK_SIZE=50`)
//! 5. `DATABASE_URL`, which overrides `database.url`
//!
//! Every layer is optional; a missing file is not an error. The merged result
//! is validated before use.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use member_batch::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let chunk_size = manager.config().batch.chunk_size;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::batch::PagingStrategy;
use crate::constants::{collections, jobs, records, system};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub database: DatabaseConfig,
    pub batch: BatchSettings,
    pub scheduler: SchedulerConfig,
    pub web: WebConfig,
    pub collections: CollectionsConfig,
}

/// Which store implementation backs the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// Create missing tables and indexes at startup
    pub ensure_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: String::new(),
            max_connections: 10,
            acquire_timeout_seconds: 30,
            ensure_schema: true,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL with credentials masked, safe to log
    pub fn redacted_url(&self) -> String {
        match (self.url.find("://"), self.url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***{}", &self.url[..scheme_end], &self.url[at..])
            }
            _ => self.url.clone(),
        }
    }
}

/// Job and step behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub job_name: String,
    pub step_name: String,
    /// Activities per committed chunk
    pub chunk_size: usize,
    /// Members fetched per page
    pub page_size: usize,
    pub paging: PagingStrategy,
    /// Primary status a member must carry to be read
    pub qualifying_status: String,
    /// Label written on every activity
    pub action: String,
    /// Resume a FAILED or STOPPED run from its last committed chunk
    pub restart_from_checkpoint: bool,
    /// Mark executions left active by a previous process as FAILED at startup
    pub fail_interrupted_on_startup: bool,
    /// Default number of executions returned by the history endpoint
    pub history_limit: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            job_name: jobs::MEMBER_ACTIVITY_JOB.to_string(),
            step_name: jobs::MEMBER_STEP.to_string(),
            chunk_size: system::DEFAULT_CHUNK_SIZE,
            page_size: system::DEFAULT_PAGE_SIZE,
            paging: PagingStrategy::Keyset,
            qualifying_status: records::QUALIFYING_STATUS.to_string(),
            action: records::DEFAULT_ACTION.to_string(),
            restart_from_checkpoint: true,
            fail_interrupted_on_startup: true,
            history_limit: system::DEFAULT_HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Fixed rate between launches; the first launch fires at startup
    pub period_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_seconds: system::DEFAULT_SCHEDULE_PERIOD_SECONDS,
        }
    }
}

impl SchedulerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: system::DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

/// Collection (table) names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Members are read from here
    pub input: String,
    /// Activities are upserted here
    pub output: String,
    pub job_executions: String,
    pub step_executions: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            input: collections::MEMBERS.to_string(),
            output: collections::ACTIVITIES.to_string(),
            job_executions: collections::JOB_EXECUTIONS.to_string(),
            step_executions: collections::STEP_EXECUTIONS.to_string(),
        }
    }
}

/// Plain unquoted SQL identifier: letter or underscore, then letters, digits,
/// underscores; at most 63 bytes
fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= 63
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl BatchConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        let batch = &self.batch;

        if batch.job_name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "batch.job_name",
                "batch settings",
            ));
        }
        if batch.step_name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "batch.step_name",
                "batch settings",
            ));
        }
        if batch.chunk_size == 0 || batch.chunk_size > system::MAX_CHUNK_SIZE {
            return Err(ConfigurationError::invalid_value(
                "batch.chunk_size",
                batch.chunk_size,
                format!("must be between 1 and {}", system::MAX_CHUNK_SIZE),
            ));
        }
        if batch.page_size == 0 || batch.page_size > system::MAX_PAGE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "batch.page_size",
                batch.page_size,
                format!("must be between 1 and {}", system::MAX_PAGE_SIZE),
            ));
        }
        if batch.history_limit == 0 || batch.history_limit > system::MAX_HISTORY_LIMIT {
            return Err(ConfigurationError::invalid_value(
                "batch.history_limit",
                batch.history_limit,
                format!("must be between 1 and {}", system::MAX_HISTORY_LIMIT),
            ));
        }
        if self.scheduler.period_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.period_seconds",
                0,
                "must be greater than zero",
            ));
        }
        if self.web.enabled && self.web.bind_address.parse::<SocketAddr>().is_err() {
            return Err(ConfigurationError::invalid_value(
                "web.bind_address",
                &self.web.bind_address,
                "must be a socket address such as 0.0.0.0:8080",
            ));
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "postgres backend (set DATABASE_URL)",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                0,
                "must be greater than zero",
            ));
        }

        let names = [
            ("collections.input", &self.collections.input),
            ("collections.output", &self.collections.output),
            ("collections.job_executions", &self.collections.job_executions),
            ("collections.step_executions", &self.collections.step_executions),
        ];
        for (index, (field, name)) in names.iter().enumerate() {
            if !is_sql_identifier(name) {
                return Err(ConfigurationError::invalid_value(
                    *field,
                    *name,
                    "must be a plain identifier (letters, digits, underscores)",
                ));
            }
            if names[..index].iter().any(|(_, other)| other == name) {
                return Err(ConfigurationError::invalid_value(
                    *field,
                    *name,
                    "collection names must be distinct",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BatchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch.chunk_size, 10);
        assert_eq!(config.batch.page_size, 100);
        assert_eq!(config.scheduler.period(), Duration::from_secs(900));
        assert_eq!(config.batch.job_name, "memberActivityJob");
        assert_eq!(config.database.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_rejects_bad_sizes() {
        let mut config = BatchConfig::default();
        config.batch.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { ref field, .. }) if field == "batch.chunk_size"
        ));

        let mut config = BatchConfig::default();
        config.batch.page_size = system::MAX_PAGE_SIZE + 1;
        assert!(config.validate().is_err());

        let mut config = BatchConfig::default();
        config.scheduler.period_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unsafe_collection_names() {
        let mut config = BatchConfig::default();
        config.collections.output = "activities; DROP TABLE members".to_string();
        assert!(config.validate().is_err());

        let mut config = BatchConfig::default();
        config.collections.output = config.collections.input.clone();
        assert!(config.validate().is_err());

        assert!(is_sql_identifier("_member_v2"));
        assert!(!is_sql_identifier("2members"));
        assert!(!is_sql_identifier(""));
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = BatchConfig::default();
        config.database.backend = StoreBackend::Postgres;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));

        config.database.url = "postgres://localhost/batch".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_redacted_url_hides_credentials() {
        let config = DatabaseConfig {
            url: "postgres://batch:s3cret@db:5432/batch".to_string(),
            ..Default::default()
        };
        assert_eq!(config.redacted_url(), "postgres://***@db:5432/batch");
    }
}
