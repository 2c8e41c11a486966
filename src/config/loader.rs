//! Configuration Loader
//!
//! Layers an optional configuration file (format inferred from its extension)
//! under environment variable overrides, deserializes into [`TimelineConfig`]
//! and validates the result.

use super::TimelineConfig;
use crate::error::{TimelineError, TimelineResult};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default prefix for environment overrides (`TIMELINE_PUBLISHER__MAX_RETRIES=5`)
pub const ENV_PREFIX: &str = "TIMELINE";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
    environment_overrides: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
            environment_overrides: true,
        }
    }

    pub fn with_file(mut self, path: Option<&Path>) -> Self {
        self.file = path.map(Path::to_path_buf);
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn without_environment(mut self) -> Self {
        self.environment_overrides = false;
        self
    }

    pub fn load(&self) -> TimelineResult<TimelineConfig> {
        let mut builder = Config::builder();

        if let Some(path) = &self.file {
            if !path.is_file() {
                return Err(TimelineError::Configuration(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        if self.environment_overrides {
            builder = builder.add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: TimelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            "Configuration loaded: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            backend = %config.store.backend,
            entity_type = %config.store.entity_type,
            max_batch_size = config.publisher.max_batch_size,
            queue_capacity = config.publisher.queue_capacity,
            "⚙️ CONFIG: timeline configuration loaded"
        );

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
