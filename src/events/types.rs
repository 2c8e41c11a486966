//! Event record types shared by the write path (listener, queue, publisher)
//! and the read path (history reconstruction).

use crate::error::TimelineResult;
use crate::store::entity_id_for;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Normalized event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ApplicationStart,
    ApplicationEnd,
    EnvironmentUpdate,
    JobStart,
    JobEnd,
    StageSubmitted,
    StageCompleted,
    ExecutorAdded,
    ExecutorRemoved,
    BlockUpdated,
}

impl EventKind {
    /// Terminal kinds always close the batch they land in and trigger a post
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ApplicationStart | Self::ApplicationEnd)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationStart => "application_start",
            Self::ApplicationEnd => "application_end",
            Self::EnvironmentUpdate => "environment_update",
            Self::JobStart => "job_start",
            Self::JobEnd => "job_end",
            Self::StageSubmitted => "stage_submitted",
            Self::StageCompleted => "stage_completed",
            Self::ExecutorAdded => "executor_added",
            Self::ExecutorRemoved => "executor_removed",
            Self::BlockUpdated => "block_updated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle callbacks raised by the host application
///
/// Serialized (tagged by `event`) into the payload of a [`TimelineEvent`], and
/// decoded back when history is reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    ApplicationStart {
        app_name: String,
        user: Option<String>,
    },
    ApplicationEnd,
    EnvironmentUpdate {
        properties: BTreeMap<String, String>,
    },
    JobStart {
        job_id: u64,
        stage_ids: Vec<u64>,
    },
    JobEnd {
        job_id: u64,
        succeeded: bool,
    },
    StageSubmitted {
        stage_id: u64,
        attempt: u32,
        name: String,
        num_tasks: u32,
    },
    StageCompleted {
        stage_id: u64,
        attempt: u32,
        failure_reason: Option<String>,
    },
    ExecutorAdded {
        executor_id: String,
        host: String,
        cores: u32,
    },
    ExecutorRemoved {
        executor_id: String,
        reason: Option<String>,
    },
    BlockUpdated {
        block_id: String,
        executor_id: String,
        memory_size: u64,
        disk_size: u64,
    },
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ApplicationStart { .. } => EventKind::ApplicationStart,
            Self::ApplicationEnd => EventKind::ApplicationEnd,
            Self::EnvironmentUpdate { .. } => EventKind::EnvironmentUpdate,
            Self::JobStart { .. } => EventKind::JobStart,
            Self::JobEnd { .. } => EventKind::JobEnd,
            Self::StageSubmitted { .. } => EventKind::StageSubmitted,
            Self::StageCompleted { .. } => EventKind::StageCompleted,
            Self::ExecutorAdded { .. } => EventKind::ExecutorAdded,
            Self::ExecutorRemoved { .. } => EventKind::ExecutorRemoved,
            Self::BlockUpdated { .. } => EventKind::BlockUpdated,
        }
    }
}

/// Normalized event record
///
/// Immutable once enqueued. `(producer_id, event_id)` is the identity the
/// remote store de-duplicates on, so a re-posted batch never duplicates
/// events and two service instances writing the same entity never collide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Service instance that allocated `event_id`
    #[serde(default)]
    pub producer_id: String,
    pub event_id: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub application_id: String,
    pub attempt_id: Option<String>,
    pub payload: Value,
}

impl TimelineEvent {
    /// Build a record from a lifecycle callback
    pub fn from_lifecycle(
        event_id: u64,
        application_id: impl Into<String>,
        attempt_id: Option<String>,
        event: &LifecycleEvent,
        timestamp: DateTime<Utc>,
    ) -> TimelineResult<Self> {
        Ok(Self {
            producer_id: String::new(),
            event_id,
            kind: event.kind(),
            timestamp,
            application_id: application_id.into(),
            attempt_id,
            payload: serde_json::to_value(event)?,
        })
    }

    pub fn with_producer(mut self, producer_id: impl Into<String>) -> Self {
        self.producer_id = producer_id.into();
        self
    }

    /// Key the store de-duplicates on
    pub fn identity(&self) -> (&str, u64) {
        (&self.producer_id, self.event_id)
    }

    /// Entity this event accumulates onto
    pub fn entity_id(&self) -> String {
        entity_id_for(&self.application_id, self.attempt_id.as_deref())
    }

    /// Decode the payload back into a lifecycle event
    ///
    /// Returns `None` when the payload does not decode or disagrees with `kind`.
    pub fn lifecycle(&self) -> Option<LifecycleEvent> {
        serde_json::from_value::<LifecycleEvent>(self.payload.clone())
            .ok()
            .filter(|decoded| decoded.kind() == self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_start_and_end_are_terminal() {
        assert!(EventKind::ApplicationStart.is_terminal());
        assert!(EventKind::ApplicationEnd.is_terminal());
        assert!(!EventKind::EnvironmentUpdate.is_terminal());
        assert!(!EventKind::JobEnd.is_terminal());
        assert!(!EventKind::BlockUpdated.is_terminal());
    }

    #[test]
    fn test_payload_is_tagged_and_decodes() {
        let lifecycle = LifecycleEvent::JobStart {
            job_id: 7,
            stage_ids: vec![1, 2],
        };
        let event =
            TimelineEvent::from_lifecycle(3, "app-1", None, &lifecycle, Utc::now()).unwrap();

        assert_eq!(event.kind, EventKind::JobStart);
        assert_eq!(event.payload["event"], json!("job_start"));
        assert_eq!(event.lifecycle(), Some(lifecycle));
        assert_eq!(event.entity_id(), "app-1");
    }

    #[test]
    fn test_mismatched_payload_does_not_decode() {
        let mut event = TimelineEvent::from_lifecycle(
            1,
            "app-1",
            Some("1".to_string()),
            &LifecycleEvent::ApplicationEnd,
            Utc::now(),
        )
        .unwrap();
        event.kind = EventKind::ApplicationStart;
        assert_eq!(event.lifecycle(), None);

        event.payload = json!({"event": "job_end", "job_id": "not-a-number"});
        event.kind = EventKind::JobEnd;
        assert_eq!(event.lifecycle(), None);
    }

    #[test]
    fn test_wire_field_names() {
        let event = TimelineEvent::from_lifecycle(
            9,
            "app-9",
            Some("2".to_string()),
            &LifecycleEvent::ApplicationEnd,
            Utc::now(),
        )
        .unwrap()
        .with_producer("svc-a");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("application_end"));
        assert_eq!(value["producerId"], json!("svc-a"));
        assert_eq!(value["applicationId"], json!("app-9"));
        assert_eq!(value["attemptId"], json!("2"));
        assert_eq!(value["eventId"], json!(9));
        assert_eq!(event.identity(), ("svc-a", 9));
    }

    #[test]
    fn test_records_without_producer_decode() {
        let value = json!({
            "eventId": 4,
            "type": "application_end",
            "timestamp": "2024-01-01T00:00:00Z",
            "applicationId": "app-1",
            "attemptId": null,
            "payload": {"event": "application_end"}
        });
        let event: TimelineEvent = serde_json::from_value(value).unwrap();
        assert_eq!(event.identity(), ("", 4));
        assert_eq!(event.lifecycle(), Some(LifecycleEvent::ApplicationEnd));
    }
}
