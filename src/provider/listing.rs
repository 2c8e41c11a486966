//! Listing entries reconstructed from timeline entities.

use crate::constants::other_info;
use crate::error::{StoreError, StoreResult};
use crate::events::{EventKind, LifecycleEvent};
use crate::store::TimelineEntity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One row of the application listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationListingEntry {
    /// Entity id (application id plus attempt, when present)
    pub id: String,
    pub application_id: String,
    pub attempt_id: Option<String>,
    pub name: String,
    pub user: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// True iff an application end event was posted
    pub completed: bool,
    /// Milliseconds since epoch of the last post, when the store kept it
    pub last_updated: Option<i64>,
}

impl ApplicationListingEntry {
    /// Derive a listing entry by scanning the entity's events
    ///
    /// The first decodable start event supplies name, user and start time.
    /// An entity without one is malformed.
    pub fn from_entity(entity: &TimelineEntity) -> StoreResult<Self> {
        let malformed = |reason: &str| StoreError::Malformed {
            entity_id: entity.entity_id.clone(),
            reason: reason.to_string(),
        };

        let start_event = entity
            .events
            .iter()
            .find(|event| event.kind == EventKind::ApplicationStart)
            .ok_or_else(|| malformed("no application start event"))?;

        let (name, user) = match start_event.lifecycle() {
            Some(LifecycleEvent::ApplicationStart { app_name, user }) => (app_name, user),
            _ => return Err(malformed("undecodable application start payload")),
        };

        let end_time = entity
            .events
            .iter()
            .filter(|event| event.kind == EventKind::ApplicationEnd)
            .map(|event| event.timestamp)
            .max();

        Ok(Self {
            id: entity.entity_id.clone(),
            application_id: start_event.application_id.clone(),
            attempt_id: start_event.attempt_id.clone(),
            name,
            user,
            start_time: start_event.timestamp,
            end_time,
            completed: end_time.is_some(),
            last_updated: entity
                .other_info
                .get(other_info::LAST_UPDATED)
                .and_then(|value| value.as_i64()),
        })
    }
}

/// Most recent start first; ties broken by entity id
pub fn listing_order(a: &ApplicationListingEntry, b: &ApplicationListingEntry) -> Ordering {
    b.start_time
        .cmp(&a.start_time)
        .then_with(|| a.id.cmp(&b.id))
}

/// Map entities to listing entries, skipping malformed ones
///
/// Returns the ordered entries and the number of entities skipped.
pub fn build_listing(entities: &[TimelineEntity]) -> (Vec<ApplicationListingEntry>, usize) {
    let mut skipped = 0;
    let mut entries = Vec::with_capacity(entities.len());

    for entity in entities {
        match ApplicationListingEntry::from_entity(entity) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                skipped += 1;
                tracing::warn!(
                    entity_id = %entity.entity_id,
                    error = %e,
                    "skipping malformed timeline entity"
                );
            }
        }
    }

    entries.sort_by(listing_order);
    (entries, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TimelineEvent;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn entity(id: &str, started: i64, ended: Option<i64>) -> TimelineEntity {
        let mut entity = TimelineEntity::new(id, "apps");
        let start = LifecycleEvent::ApplicationStart {
            app_name: format!("{id}-name"),
            user: Some("alice".to_string()),
        };
        entity
            .events
            .push(TimelineEvent::from_lifecycle(1, id, None, &start, at(started)).unwrap());
        if let Some(ended) = ended {
            entity.events.push(
                TimelineEvent::from_lifecycle(2, id, None, &LifecycleEvent::ApplicationEnd, at(ended))
                    .unwrap(),
            );
        }
        entity
    }

    #[test]
    fn test_entry_from_started_entity() {
        let entry = ApplicationListingEntry::from_entity(&entity("app-1", 0, None)).unwrap();
        assert_eq!(entry.name, "app-1-name");
        assert_eq!(entry.user.as_deref(), Some("alice"));
        assert_eq!(entry.start_time, at(0));
        assert!(!entry.completed);
        assert!(entry.end_time.is_none());
    }

    #[test]
    fn test_end_event_marks_completed() {
        let entry = ApplicationListingEntry::from_entity(&entity("app-1", 0, Some(30))).unwrap();
        assert!(entry.completed);
        assert_eq!(entry.end_time, Some(at(30)));
    }

    #[test]
    fn test_entity_without_start_is_malformed() {
        let mut broken = entity("app-1", 0, Some(5));
        broken.events.remove(0);
        let err = ApplicationListingEntry::from_entity(&broken).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn test_undecodable_start_is_malformed() {
        let mut broken = entity("app-1", 0, None);
        broken.events[0].payload = json!({"event": "application_start", "app_name": 42});
        assert!(ApplicationListingEntry::from_entity(&broken).is_err());
    }

    #[test]
    fn test_listing_order_and_skips() {
        let mut broken = entity("app-x", 50, None);
        broken.events.clear();
        let entities = vec![
            entity("app-b", 10, None),
            entity("app-a", 10, Some(20)),
            entity("app-c", 40, None),
            broken,
        ];

        let (entries, skipped) = build_listing(&entities);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["app-c", "app-a", "app-b"]);
        assert_eq!(skipped, 1);
    }
}
