//! # Timeline Configuration
//!
//! Typed configuration for the publisher, the history provider and the store
//! backend. Every field has a default, so a partial file (or no file at all)
//! is valid input.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use timeline_history::config::TimelineConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // File values are overridden by TIMELINE_<SECTION>__<FIELD> variables
//! let config = TimelineConfig::load(Some("config/timeline.toml".as_ref()))?;
//! let batch_size = config.publisher.max_batch_size;
//! let ttl = config.provider.listing_cache_ttl();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::constants::{DEFAULT_ENTITY_TYPE, DEFAULT_STORE_BACKEND};
use crate::error::{TimelineError, TimelineResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::{ConfigLoader, ENV_PREFIX};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Write path: queue, batching, retry and flush settings
    pub publisher: PublisherConfig,

    /// Read path: query retry and listing cache settings
    pub provider: ProviderConfig,

    /// Backend selection
    pub store: StoreConfig,
}

impl TimelineConfig {
    /// Load from an optional file plus environment overrides
    pub fn load(path: Option<&std::path::Path>) -> TimelineResult<Self> {
        ConfigLoader::new().with_file(path).load()
    }

    /// Reject values the runtime cannot operate with
    pub fn validate(&self) -> TimelineResult<()> {
        let invalid = |field: &str, reason: &str| {
            Err(TimelineError::Configuration(format!("{field}: {reason}")))
        };

        if self.publisher.max_batch_size == 0 {
            return invalid("publisher.max_batch_size", "must be at least 1");
        }
        if self.publisher.queue_capacity == 0 {
            return invalid("publisher.queue_capacity", "must be at least 1");
        }
        if self.publisher.poll_interval_ms == 0 {
            return invalid("publisher.poll_interval_ms", "must be greater than zero");
        }
        if self.publisher.flush_timeout_ms == 0 {
            return invalid("publisher.flush_timeout_ms", "must be greater than zero");
        }
        if self.publisher.post_timeout_ms == 0 {
            return invalid("publisher.post_timeout_ms", "must be greater than zero");
        }
        if self.provider.query_timeout_ms == 0 {
            return invalid("provider.query_timeout_ms", "must be greater than zero");
        }
        if self.store.entity_type.trim().is_empty() {
            return invalid("store.entity_type", "must not be empty");
        }
        if self.store.backend.trim().is_empty() {
            return invalid("store.backend", "must not be empty");
        }
        Ok(())
    }
}

/// Batching publisher settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub max_batch_size: usize,
    pub max_batch_latency_ms: u64,
    /// Consecutive failed post attempts after which a batch is abandoned
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_retry_backoff_ms: u64,
    pub queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub flush_timeout_ms: u64,
    pub post_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            max_batch_latency_ms: 5_000,
            max_retries: 3,
            retry_backoff_ms: 100,
            max_retry_backoff_ms: 10_000,
            queue_capacity: 10_000,
            enqueue_timeout_ms: 1_000,
            poll_interval_ms: 250,
            flush_timeout_ms: 30_000,
            post_timeout_ms: 10_000,
        }
    }
}

impl PublisherConfig {
    pub fn max_batch_latency(&self) -> Duration {
        Duration::from_millis(self.max_batch_latency_ms)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn post_timeout(&self) -> Duration {
        Duration::from_millis(self.post_timeout_ms)
    }
}

/// History provider settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Zero disables the listing cache
    pub listing_cache_ttl_ms: u64,
    pub query_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            listing_cache_ttl_ms: 10_000,
            query_timeout_ms: 10_000,
            max_retries: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl ProviderConfig {
    pub fn listing_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.listing_cache_ttl_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// Remote store backend selection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Registry key of the backend constructor
    pub backend: String,
    pub entity_type: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_STORE_BACKEND.to_string(),
            entity_type: DEFAULT_ENTITY_TYPE.to_string(),
        }
    }
}
