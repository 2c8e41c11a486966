//! # History Provider
//!
//! Read path. Queries the timeline store by entity type and primary filter,
//! reconstructs the application listing and per-application detail, and
//! caches listings with a short TTL to absorb repeated UI polling.
//!
//! The provider shares no in-process state with the publisher; both sides
//! meet only through the store's data.
//!
//! - Listing: most recent start first, ties broken by entity id. Entities
//!   that cannot be mapped are skipped with a warning.
//! - Detail: `Ok(None)` when the application was never posted.
//! - Concurrent cache misses for the same view coalesce onto one store
//!   refresh; other views and cache hits are never blocked by it.

pub mod cache;
pub mod detail;
pub mod listing;

pub use cache::{CacheLookup, CachedListing, ListingCache};
pub use detail::{
    ApplicationDetail, ExecutorSummary, JobStatus, JobSummary, StageStatus, StageSummary,
    StorageBlock,
};
pub use listing::{build_listing, ApplicationListingEntry};

use crate::config::{ProviderConfig, TimelineConfig};
use crate::error::{StoreError, StoreResult, TimelineResult};
use crate::logging::{log_error, log_listing_refresh};
use crate::registry::StoreRegistry;
use crate::resilience::RetryPolicy;
use crate::store::{PrimaryFilter, TimelineEntity, TimelineStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Which applications a listing includes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionFilter {
    #[default]
    All,
    /// Entities carrying the `hasEndEvent=true` filter
    Completed,
    /// Every entity not in the completed view
    Incomplete,
}

impl CompletionFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for CompletionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters describing the provider's interaction with the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDiagnostics {
    pub refreshes: u64,
    pub cache_hits: u64,
    pub entities_skipped: u64,
    pub cached_views: usize,
    pub last_refresh_error: Option<String>,
}

pub struct HistoryProvider {
    store: Arc<dyn TimelineStore>,
    config: ProviderConfig,
    entity_type: String,
    retry: RetryPolicy,
    cache: ListingCache,
    refreshes: AtomicU64,
    cache_hits: AtomicU64,
    entities_skipped: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl fmt::Debug for HistoryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryProvider")
            .field("backend", &self.store.backend_name())
            .field("entity_type", &self.entity_type)
            .field("cache_ttl", &self.cache.ttl())
            .finish()
    }
}

impl HistoryProvider {
    pub fn new(
        store: Arc<dyn TimelineStore>,
        config: ProviderConfig,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            store,
            retry: RetryPolicy::for_provider(&config),
            cache: ListingCache::new(config.listing_cache_ttl()),
            config,
            entity_type: entity_type.into(),
            refreshes: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            entities_skipped: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// Build with the store backend named in `config.store.backend`
    pub fn from_config(config: &TimelineConfig, registry: &StoreRegistry) -> TimelineResult<Self> {
        config.validate()?;
        let store = registry.create(&config.store)?;
        Ok(Self::new(
            store,
            config.provider.clone(),
            config.store.entity_type.clone(),
        ))
    }

    /// Every known application, most recent first
    pub async fn list_applications(&self) -> TimelineResult<Vec<ApplicationListingEntry>> {
        self.list_applications_filtered(CompletionFilter::All).await
    }

    pub async fn list_applications_filtered(
        &self,
        view: CompletionFilter,
    ) -> TimelineResult<Vec<ApplicationListingEntry>> {
        let lookup = self.cache.get_or_refresh(view, self.refresh(view)).await?;
        if lookup.hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(view = %view, entries = lookup.entries.len(), "listing served from cache");
        }
        Ok(lookup.entries.to_vec())
    }

    /// Detail for one application (entity id); `None` when never posted
    pub async fn get_application_detail(
        &self,
        id: &str,
    ) -> TimelineResult<Option<ApplicationDetail>> {
        let store = self.store.clone();
        let entity_type = self.entity_type.clone();
        let entity_id = id.to_string();

        let outcome = self
            .retry
            .execute("get_entity", self.config.query_timeout(), None, || {
                let store = store.clone();
                let entity_type = entity_type.clone();
                let entity_id = entity_id.clone();
                async move { store.get_entity(&entity_type, &entity_id).await }
            })
            .await;

        let entity = match outcome.result {
            Ok(entity) => entity,
            Err(e) => return Err(self.query_failed("get_entity", e).into()),
        };

        match entity {
            Some(entity) => Ok(Some(ApplicationDetail::from_entity(&entity)?)),
            None => {
                debug!(entity_id = %id, "application not found in timeline store");
                Ok(None)
            }
        }
    }

    /// Drop every cached listing
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    pub fn diagnostics(&self) -> ProviderDiagnostics {
        ProviderDiagnostics {
            refreshes: self.refreshes.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            entities_skipped: self.entities_skipped.load(Ordering::Relaxed),
            cached_views: self.cache.len(),
            last_refresh_error: self.last_error.lock().clone(),
        }
    }

    async fn refresh(&self, view: CompletionFilter) -> StoreResult<Vec<ApplicationListingEntry>> {
        let started = Instant::now();

        let entities = match view {
            CompletionFilter::All => self.query_entities(None).await?,
            CompletionFilter::Completed => {
                self.query_entities(Some(PrimaryFilter::completed())).await?
            }
            CompletionFilter::Incomplete => {
                let completed: HashSet<String> = self
                    .query_entities(Some(PrimaryFilter::completed()))
                    .await?
                    .into_iter()
                    .map(|entity| entity.entity_id)
                    .collect();
                self.query_entities(None)
                    .await?
                    .into_iter()
                    .filter(|entity| !completed.contains(&entity.entity_id))
                    .collect()
            }
        };

        let (mut entries, skipped) = build_listing(&entities);
        if view == CompletionFilter::Incomplete {
            // Completions landing between the two queries
            entries.retain(|entry| !entry.completed);
        }
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        self.entities_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);
        *self.last_error.lock() = None;

        log_listing_refresh(
            view.as_str(),
            entities.len(),
            entries.len(),
            skipped,
            started.elapsed().as_millis() as u64,
        );

        Ok(entries)
    }

    async fn query_entities(
        &self,
        filter: Option<PrimaryFilter>,
    ) -> StoreResult<Vec<TimelineEntity>> {
        let store = self.store.clone();
        let entity_type = self.entity_type.clone();

        let outcome = self
            .retry
            .execute("list_entities", self.config.query_timeout(), None, || {
                let store = store.clone();
                let entity_type = entity_type.clone();
                let filter = filter.clone();
                async move { store.list_entities(&entity_type, filter.as_ref()).await }
            })
            .await;

        if outcome.attempts > 1 && outcome.result.is_ok() {
            warn!(
                attempts = outcome.attempts,
                filter = ?filter.as_ref().map(ToString::to_string),
                "list_entities needed retries"
            );
        }

        outcome
            .result
            .map_err(|e| self.query_failed("list_entities", e))
    }

    fn query_failed(&self, operation: &str, error: StoreError) -> StoreError {
        *self.last_error.lock() = Some(error.to_string());
        log_error("provider", operation, &error.to_string(), None);
        error
    }
}
