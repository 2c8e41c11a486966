//! # Listener Adapter
//!
//! Bridges the host application's lifecycle callbacks onto the event queue.
//!
//! The host framework implements nothing more than [`LifecycleListener::on_event`]
//! against this adapter; the publisher never sees host framework types. The
//! adapter stamps every record with an event id, the running application's
//! identity and a timestamp, then hands it to an [`EventSink`].

use super::types::{LifecycleEvent, TimelineEvent};
use crate::error::TimelineResult;
use crate::store::entity_id_for;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Identity of the application whose lifecycle is being recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationContext {
    pub application_id: String,
    pub attempt_id: Option<String>,
}

impl ApplicationContext {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            attempt_id: None,
        }
    }

    pub fn with_attempt(mut self, attempt_id: impl Into<String>) -> Self {
        self.attempt_id = Some(attempt_id.into());
        self
    }

    /// Stable entity id derived from application (+ attempt) id
    pub fn entity_id(&self) -> String {
        entity_id_for(&self.application_id, self.attempt_id.as_deref())
    }
}

/// Narrow interface the host framework drives
pub trait LifecycleListener: Send + Sync {
    fn on_event(&self, event: LifecycleEvent) -> TimelineResult<()>;
}

/// Destination for normalized records (the service's event queue)
pub trait EventSink: Send + Sync {
    /// Allocate the identity for the next record
    fn next_event_id(&self) -> u64;

    /// Enqueue a record; may block up to the configured enqueue timeout
    fn submit(&self, event: TimelineEvent) -> TimelineResult<()>;
}

/// Converts lifecycle callbacks into [`TimelineEvent`]s and enqueues them
#[derive(Clone)]
pub struct ListenerAdapter {
    context: ApplicationContext,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ListenerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerAdapter")
            .field("context", &self.context)
            .finish()
    }
}

impl ListenerAdapter {
    pub fn new(context: ApplicationContext, sink: Arc<dyn EventSink>) -> Self {
        Self { context, sink }
    }

    pub fn context(&self) -> &ApplicationContext {
        &self.context
    }

    /// Record an event with an explicit timestamp
    pub fn on_event_at(&self, event: LifecycleEvent, timestamp: DateTime<Utc>) -> TimelineResult<()> {
        let record = TimelineEvent::from_lifecycle(
            self.sink.next_event_id(),
            self.context.application_id.clone(),
            self.context.attempt_id.clone(),
            &event,
            timestamp,
        )?;

        trace!(
            event_id = record.event_id,
            kind = %record.kind,
            application_id = %record.application_id,
            "enqueueing lifecycle event"
        );

        self.sink.submit(record)
    }
}

impl LifecycleListener for ListenerAdapter {
    fn on_event(&self, event: LifecycleEvent) -> TimelineResult<()> {
        self.on_event_at(event, Utc::now())
    }
}
