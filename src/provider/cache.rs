//! Listing cache.
//!
//! Holds the most recent listing per view in a `moka` cache with a
//! time-to-live, so a just-completed application is never masked for longer
//! than one TTL. Concurrent misses for the same view coalesce onto a single
//! refresh; misses for other views and cache hits proceed independently.
//! A zero TTL disables caching.

use super::listing::ApplicationListingEntry;
use super::CompletionFilter;
use crate::error::StoreResult;
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One view's listing, shared between the cache and its readers
pub type CachedListing = Arc<Vec<ApplicationListingEntry>>;

/// Every [`CompletionFilter`] variant gets at most one entry
const MAX_VIEWS: u64 = 3;

/// A listing plus whether it was served without refreshing
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub entries: CachedListing,
    pub hit: bool,
}

#[derive(Clone)]
pub struct ListingCache {
    ttl: Duration,
    views: Option<Cache<CompletionFilter, CachedListing>>,
}

impl std::fmt::Debug for ListingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingCache")
            .field("ttl", &self.ttl)
            .field("entry_count", &self.len())
            .finish()
    }
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        let views = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(MAX_VIEWS)
                .time_to_live(ttl)
                .build()
        });

        debug!(
            ttl_ms = ttl.as_millis() as u64,
            enabled = views.is_some(),
            "listing cache created"
        );

        Self { ttl, views }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        self.views.is_some()
    }

    /// Fresh listing for `view`, if one is cached
    pub async fn get(&self, view: CompletionFilter) -> Option<CachedListing> {
        self.views.as_ref()?.get(&view).await
    }

    /// Cached listing for `view`, or the result of `refresh`
    ///
    /// `refresh` is only awaited on a miss. When several callers miss the same
    /// view at once, one of them runs its refresh and the rest receive that
    /// result as a hit. A failed refresh is not cached.
    pub async fn get_or_refresh<F>(&self, view: CompletionFilter, refresh: F) -> StoreResult<CacheLookup>
    where
        F: Future<Output = StoreResult<Vec<ApplicationListingEntry>>>,
    {
        let Some(views) = &self.views else {
            return Ok(CacheLookup {
                entries: Arc::new(refresh.await?),
                hit: false,
            });
        };

        let entry = views
            .entry(view)
            .or_try_insert_with(async move { refresh.await.map(Arc::new) })
            .await
            .map_err(|shared| (*shared).clone())?;

        Ok(CacheLookup {
            hit: !entry.is_fresh(),
            entries: entry.into_value(),
        })
    }

    /// Drop every cached view
    pub fn invalidate(&self) {
        if let Some(views) = &self.views {
            views.invalidate_all();
        }
    }

    /// Views currently held; may lag behind expiry and invalidation
    pub fn len(&self) -> usize {
        self.views
            .as_ref()
            .map_or(0, |views| views.entry_count() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
