//! Configuration Loader
//!
//! Environment-aware loading: file discovery, environment detection and layer
//! merging on top of the `config` crate.

use config::{Config, Environment, File, Map};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::ConfigResult;
use super::BatchConfig;

const ENV_PREFIX: &str = "BATCH";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug)]
pub struct ConfigManager {
    config: BatchConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::build(
            &config_directory,
            environment,
            None,
            env::var("DATABASE_URL").ok(),
        )?;
        config.validate()?;

        info!(
            environment = %environment,
            backend = ?config.database.backend,
            database_url = %config.database.redacted_url(),
            chunk_size = config.batch.chunk_size,
            page_size = config.batch.page_size,
            paging = %config.batch.paging,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Merge every layer into a `BatchConfig`.
    ///
    /// `env_vars` replaces the process environment for the `BATCH__` layer
    /// when given; `database_url` is the `DATABASE_URL` override.
    pub(crate) fn build(
        config_directory: &Path,
        environment: &str,
        env_vars: Option<Map<String, String>>,
        database_url: Option<String>,
    ) -> ConfigResult<BatchConfig> {
        let base_file = config_directory.join("batch.toml");
        let env_file = config_directory.join(format!("batch.{environment}.toml"));

        let settings = Config::builder()
            .add_source(Config::try_from(&BatchConfig::default())?)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env_vars),
            )
            .set_override_option("database.url", database_url)?
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// `BATCH_ENV`, then `APP_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var("BATCH_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `BATCH_CONFIG_DIR` when set, otherwise `./config`
    fn default_config_directory() -> PathBuf {
        env::var("BATCH_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
