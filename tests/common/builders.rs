//! Test data builders shared by the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use timeline_history::constants::DEFAULT_ENTITY_TYPE;
use timeline_history::events::{LifecycleEvent, TimelineEvent};
use timeline_history::store::{PrimaryFilter, TimelineEntity};
use timeline_history::TimelineConfig;

/// Configuration tuned for fast, deterministic tests
///
/// Latency trigger is long so only terminal events and the size trigger
/// cause posts; backoff is short so retry tests finish quickly.
pub fn fast_config() -> TimelineConfig {
    let mut config = TimelineConfig::default();
    config.publisher.max_batch_size = 100;
    config.publisher.max_batch_latency_ms = 60_000;
    config.publisher.poll_interval_ms = 10;
    config.publisher.retry_backoff_ms = 1;
    config.publisher.max_retry_backoff_ms = 5;
    config.publisher.enqueue_timeout_ms = 50;
    config.publisher.flush_timeout_ms = 5_000;
    config.publisher.post_timeout_ms = 1_000;
    config.provider.listing_cache_ttl_ms = 0;
    config.provider.retry_backoff_ms = 1;
    config
}

pub fn entity_type() -> &'static str {
    DEFAULT_ENTITY_TYPE
}

pub fn app_start(name: &str) -> LifecycleEvent {
    LifecycleEvent::ApplicationStart {
        app_name: name.to_string(),
        user: Some("analyst".to_string()),
    }
}

pub fn app_end() -> LifecycleEvent {
    LifecycleEvent::ApplicationEnd
}

pub fn env_update(pairs: &[(&str, &str)]) -> LifecycleEvent {
    LifecycleEvent::EnvironmentUpdate {
        properties: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn job_start(job_id: u64) -> LifecycleEvent {
    LifecycleEvent::JobStart {
        job_id,
        stage_ids: vec![job_id * 10],
    }
}

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
}

/// Entity as the publisher would have left it, for seeding the store
pub struct EntityBuilder {
    entity: TimelineEntity,
    next_event_id: u64,
}

impl EntityBuilder {
    pub fn new(application_id: &str) -> Self {
        let mut entity = TimelineEntity::new(application_id, entity_type());
        entity.primary_filters.insert(PrimaryFilter::new(
            timeline_history::constants::filters::APPLICATION_ID,
            application_id,
        ));
        Self {
            entity,
            next_event_id: 1,
        }
    }

    pub fn event(mut self, event: LifecycleEvent, offset_secs: i64) -> Self {
        if matches!(event, LifecycleEvent::ApplicationEnd) {
            self.entity.primary_filters.insert(PrimaryFilter::completed());
        }
        let record = TimelineEvent::from_lifecycle(
            self.next_event_id,
            self.entity.entity_id.clone(),
            None,
            &event,
            at(offset_secs),
        )
        .unwrap();
        self.next_event_id += 1;
        self.entity.events.push(record);
        self
    }

    pub fn started(self, name: &str, offset_secs: i64) -> Self {
        self.event(app_start(name), offset_secs)
    }

    pub fn ended(self, offset_secs: i64) -> Self {
        self.event(app_end(), offset_secs)
    }

    pub fn build(self) -> TimelineEntity {
        self.entity
    }
}
