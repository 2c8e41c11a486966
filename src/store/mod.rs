//! # Remote Timeline Store
//!
//! Boundary to the remote, persistent timeline store. The wire protocol is
//! owned by the backend; the core only relies on three operations:
//!
//! - `post_entity` merges posted events onto an entity keyed by id
//! - `list_entities` returns entities of a type, optionally restricted to
//!   those carrying an exact-match primary filter
//! - `get_entity` fetches one entity, `None` when it was never posted
//!
//! Backends are resolved by name through [`crate::registry::StoreRegistry`].

pub mod memory;

use crate::constants::filters;
use crate::error::StoreResult;
use crate::events::TimelineEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

pub use memory::InMemoryTimelineStore;

/// Derive the stable entity id for an application (attempt)
///
/// Components are joined with `_`; a literal `_` or `%` inside a component is
/// percent-escaped so distinct (application, attempt) pairs never share an id.
pub fn entity_id_for(application_id: &str, attempt_id: Option<&str>) -> String {
    match attempt_id {
        Some(attempt) => format!(
            "{}_{}",
            escape_id_component(application_id),
            escape_id_component(attempt)
        ),
        None => escape_id_component(application_id),
    }
}

fn escape_id_component(component: &str) -> String {
    let mut escaped = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '_' => escaped.push_str("%5F"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Exact-match `(key, value)` tag used for filtered queries
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrimaryFilter {
    pub key: String,
    pub value: String,
}

impl PrimaryFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Marker attached once an application's end event has been posted
    pub fn completed() -> Self {
        Self::new(filters::HAS_END_EVENT, filters::TRUE)
    }
}

impl fmt::Display for PrimaryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// One application (attempt) as held by the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntity {
    pub entity_id: String,
    pub entity_type: String,
    pub events: Vec<TimelineEvent>,
    pub primary_filters: BTreeSet<PrimaryFilter>,
    #[serde(default)]
    pub other_info: BTreeMap<String, Value>,
}

impl TimelineEntity {
    pub fn new(entity_id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type: entity_type.into(),
            events: Vec::new(),
            primary_filters: BTreeSet::new(),
            other_info: BTreeMap::new(),
        }
    }

    pub fn has_filter(&self, filter: &PrimaryFilter) -> bool {
        self.primary_filters.contains(filter)
    }

    /// Merge a posted fragment into this entity
    ///
    /// Events already present (by producer and `event_id`) are ignored, so
    /// re-posting the same fragment is a no-op. Filters are unioned;
    /// `other_info` is overwritten key by key. Returns the number of newly
    /// applied events.
    pub fn merge(&mut self, fragment: TimelineEntity) -> usize {
        let mut seen: HashSet<(String, u64)> = self
            .events
            .iter()
            .map(|e| (e.producer_id.clone(), e.event_id))
            .collect();
        let before = self.events.len();
        for event in fragment.events {
            if seen.insert((event.producer_id.clone(), event.event_id)) {
                self.events.push(event);
            }
        }
        self.primary_filters.extend(fragment.primary_filters);
        self.other_info.extend(fragment.other_info);
        self.events.len() - before
    }
}

/// Client interface to the remote timeline store
#[async_trait]
pub trait TimelineStore: Send + Sync + fmt::Debug {
    /// Post (merge) an entity fragment
    async fn post_entity(&self, entity: TimelineEntity) -> StoreResult<()>;

    /// List entities of a type, optionally restricted by a primary filter
    async fn list_entities(
        &self,
        entity_type: &str,
        filter: Option<&PrimaryFilter>,
    ) -> StoreResult<Vec<TimelineEntity>>;

    /// Fetch one entity; `Ok(None)` when it does not exist
    async fn get_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> StoreResult<Option<TimelineEntity>>;

    /// Registry key / diagnostic name of the backend
    fn backend_name(&self) -> &'static str;
}
