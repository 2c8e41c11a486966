//! # Store Registry
//!
//! Factory keyed by backend name. Constructors are registered at compile time
//! and selected through `store.backend` in configuration.
//!
//! ```rust
//! use timeline_history::config::StoreConfig;
//! use timeline_history::registry::StoreRegistry;
//!
//! let registry = StoreRegistry::with_defaults();
//! let store = registry.create(&StoreConfig::default()).unwrap();
//! assert_eq!(store.backend_name(), "memory");
//! ```

use crate::config::StoreConfig;
use crate::error::{TimelineError, TimelineResult};
use crate::store::{InMemoryTimelineStore, TimelineStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Constructor for a store backend
pub type StoreConstructor =
    Arc<dyn Fn(&StoreConfig) -> TimelineResult<Arc<dyn TimelineStore>> + Send + Sync>;

pub struct StoreRegistry {
    constructors: RwLock<HashMap<String, StoreConstructor>>,
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("backends", &self.backends())
            .finish()
    }
}

impl StoreRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the built-in backends
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("memory", |_config| {
            Ok(Arc::new(InMemoryTimelineStore::new()) as Arc<dyn TimelineStore>)
        });
        registry
    }

    /// Register (or replace) a backend constructor
    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&StoreConfig) -> TimelineResult<Arc<dyn TimelineStore>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(backend = %name, "Registering timeline store backend");
        self.constructors.write().insert(name, Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.read().contains_key(name)
    }

    /// Registered backend names, sorted
    pub fn backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the backend named by `config.backend`
    pub fn create(&self, config: &StoreConfig) -> TimelineResult<Arc<dyn TimelineStore>> {
        let registered = self.constructors.read().get(&config.backend).cloned();
        let constructor = registered.ok_or_else(|| {
            TimelineError::Configuration(format!(
                "unknown timeline store backend '{}' (registered: {})",
                config.backend,
                self.backends().join(", ")
            ))
        })?;

        let store = constructor(config)?;
        info!(
            backend = %config.backend,
            entity_type = %config.entity_type,
            "📚 REGISTRY: timeline store created"
        );
        Ok(store)
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
