//! In-process timeline store backend.
//!
//! Implements the remote store's merge semantics (merge by entity id,
//! de-duplicate by event id, union primary filters) over a `DashMap`. Used for
//! single-process deployments and as the reference backend in tests.

use super::{PrimaryFilter, TimelineEntity, TimelineStore};
use crate::error::StoreResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemoryTimelineStore {
    /// Keyed by `(entity_type, entity_id)`
    entities: DashMap<(String, String), TimelineEntity>,
    post_count: AtomicU64,
}

impl InMemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `post_entity` calls received
    pub fn post_count(&self) -> u64 {
        self.post_count.load(Ordering::Acquire)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Store an entity verbatim, replacing any existing one
    ///
    /// Bypasses merging; used to seed entities of arbitrary shape.
    pub fn insert_raw(&self, entity: TimelineEntity) {
        self.entities.insert(
            (entity.entity_type.clone(), entity.entity_id.clone()),
            entity,
        );
    }

    /// Synchronous snapshot of one entity
    pub fn snapshot(&self, entity_type: &str, entity_id: &str) -> Option<TimelineEntity> {
        self.entities
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl TimelineStore for InMemoryTimelineStore {
    async fn post_entity(&self, entity: TimelineEntity) -> StoreResult<()> {
        self.post_count.fetch_add(1, Ordering::AcqRel);

        let key = (entity.entity_type.clone(), entity.entity_id.clone());
        let mut stored = self
            .entities
            .entry(key)
            .or_insert_with(|| TimelineEntity::new(&entity.entity_id, &entity.entity_type));
        let applied = stored.merge(entity);

        debug!(
            entity_id = %stored.entity_id,
            applied = applied,
            total_events = stored.events.len(),
            "merged posted entity"
        );
        Ok(())
    }

    async fn list_entities(
        &self,
        entity_type: &str,
        filter: Option<&PrimaryFilter>,
    ) -> StoreResult<Vec<TimelineEntity>> {
        let mut matches: Vec<TimelineEntity> = self
            .entities
            .iter()
            .filter(|entry| entry.key().0 == entity_type)
            .filter(|entry| filter.map_or(true, |f| entry.value().has_filter(f)))
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        Ok(matches)
    }

    async fn get_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> StoreResult<Option<TimelineEntity>> {
        Ok(self.snapshot(entity_type, entity_id))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
