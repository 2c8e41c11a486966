//! Fault-injecting store wrapper for publisher and provider tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timeline_history::error::{StoreError, StoreResult};
use timeline_history::store::{InMemoryTimelineStore, PrimaryFilter, TimelineEntity, TimelineStore};

/// Wraps the in-memory backend and fails calls on demand
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: Arc<InMemoryTimelineStore>,
    fail_posts: AtomicU32,
    false_negative_posts: AtomicU32,
    fail_lists: AtomicU32,
    reject_posts: AtomicU32,
    post_delay_ms: AtomicU64,
    post_calls: AtomicU64,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &Arc<InMemoryTimelineStore> {
        &self.inner
    }

    /// Next `n` posts fail without reaching the store
    pub fn fail_next_posts(&self, n: u32) {
        self.fail_posts.store(n, Ordering::SeqCst);
    }

    /// Next `n` posts are applied, then reported as failed
    pub fn false_negative_next_posts(&self, n: u32) {
        self.false_negative_posts.store(n, Ordering::SeqCst);
    }

    /// Next `n` posts are refused with a non-retryable error
    pub fn reject_next_posts(&self, n: u32) {
        self.reject_posts.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_lists(&self, n: u32) {
        self.fail_lists.store(n, Ordering::SeqCst);
    }

    pub fn delay_posts(&self, delay: Duration) {
        self.post_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Every post call, successful or not
    pub fn post_calls(&self) -> u64 {
        self.post_calls.load(Ordering::SeqCst)
    }

    /// Posts that reached the underlying store
    pub fn applied_posts(&self) -> u64 {
        self.inner.post_count()
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TimelineStore for FlakyStore {
    async fn post_entity(&self, entity: TimelineEntity) -> StoreResult<()> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.post_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if Self::take(&self.reject_posts) {
            return Err(StoreError::Rejected("entity too large".to_string()));
        }
        if Self::take(&self.fail_posts) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }

        self.inner.post_entity(entity).await?;

        if Self::take(&self.false_negative_posts) {
            return Err(StoreError::Unavailable("connection reset after write".to_string()));
        }
        Ok(())
    }

    async fn list_entities(
        &self,
        entity_type: &str,
        filter: Option<&PrimaryFilter>,
    ) -> StoreResult<Vec<TimelineEntity>> {
        if Self::take(&self.fail_lists) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        self.inner.list_entities(entity_type, filter).await
    }

    async fn get_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> StoreResult<Option<TimelineEntity>> {
        self.inner.get_entity(entity_type, entity_id).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
