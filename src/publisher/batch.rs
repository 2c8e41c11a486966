//! Batch assembly.
//!
//! [`BatchAssembler`] holds drained events until one of the triggers fires:
//!
//! 1. a terminal event (application start/end) closes the batch it lands in,
//!    together with everything held before it
//! 2. `max_batch_size` events are pending
//! 3. the oldest pending event has waited `max_batch_latency`
//!
//! A run of non-terminal events (environment updates, job and stage events)
//! is therefore never posted on its own as soon as it is drained; it rides
//! along with the next triggering batch. With `max_batch_size == 1` every
//! event is its own batch. Events are never reordered.

use super::queue::QueuedEvent;
use crate::constants::{filters, other_info};
use crate::events::{EventKind, LifecycleEvent, TimelineEvent};
use crate::store::{PrimaryFilter, TimelineEntity};
use chrono::Utc;
use serde_json::json;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Ordered group of events posted as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub sequence_number: u64,
    pub events: Vec<TimelineEvent>,
    pub post_attempts: u32,
}

impl Batch {
    pub fn new(sequence_number: u64, events: Vec<TimelineEvent>) -> Self {
        Self {
            sequence_number,
            events,
            post_attempts: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Group the batch into one entity fragment per application (attempt)
    ///
    /// Fragments are ordered by first appearance and keep the batch's event
    /// order, so per-application ordering survives the split.
    pub fn to_entities(&self, entity_type: &str) -> Vec<TimelineEntity> {
        let mut fragments: Vec<TimelineEntity> = Vec::new();

        for event in &self.events {
            let entity_id = event.entity_id();
            let position = match fragments.iter().position(|f| f.entity_id == entity_id) {
                Some(position) => position,
                None => {
                    let mut fragment = TimelineEntity::new(&entity_id, entity_type);
                    fragment.primary_filters.insert(PrimaryFilter::new(
                        filters::APPLICATION_ID,
                        &event.application_id,
                    ));
                    fragment
                        .other_info
                        .insert(other_info::BATCH_SEQUENCE.to_string(), json!(self.sequence_number));
                    fragment
                        .other_info
                        .insert(other_info::LAST_UPDATED.to_string(), json!(Utc::now().timestamp_millis()));
                    fragments.push(fragment);
                    fragments.len() - 1
                }
            };

            let fragment = &mut fragments[position];
            match event.kind {
                EventKind::ApplicationEnd => {
                    fragment.primary_filters.insert(PrimaryFilter::completed());
                }
                EventKind::ApplicationStart => {
                    if let Some(LifecycleEvent::ApplicationStart {
                        user: Some(user), ..
                    }) = event.lifecycle()
                    {
                        fragment
                            .primary_filters
                            .insert(PrimaryFilter::new(filters::USER, user));
                    }
                }
                _ => {}
            }
            fragment.events.push(event.clone());
        }

        fragments
    }
}

#[derive(Debug)]
pub struct BatchAssembler {
    pending: VecDeque<QueuedEvent>,
    max_batch_size: usize,
    max_batch_latency: Duration,
}

impl BatchAssembler {
    pub fn new(max_batch_size: usize, max_batch_latency: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            max_batch_size: max_batch_size.max(1),
            max_batch_latency,
        }
    }

    pub fn push(&mut self, event: QueuedEvent) {
        self.pending.push_back(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = QueuedEvent>) {
        self.pending.extend(events);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// How long until the latency trigger fires for the oldest held event
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.pending.front().map(|oldest| {
            (oldest.enqueued_at + self.max_batch_latency).saturating_duration_since(now)
        })
    }

    /// Next batch whose trigger has fired, if any
    pub fn next_ready(&mut self, now: Instant) -> Option<Vec<TimelineEvent>> {
        let oldest = self.pending.front()?;

        let take = if self.max_batch_size == 1 {
            1
        } else if let Some(terminal) = self.pending.iter().position(|q| q.event.kind.is_terminal()) {
            (terminal + 1).min(self.max_batch_size)
        } else if self.pending.len() >= self.max_batch_size {
            self.max_batch_size
        } else if now.saturating_duration_since(oldest.enqueued_at) >= self.max_batch_latency {
            self.pending.len()
        } else {
            return None;
        };

        Some(self.take(take))
    }

    /// Next batch regardless of triggers (shutdown flush)
    pub fn next_forced(&mut self) -> Option<Vec<TimelineEvent>> {
        if self.pending.is_empty() {
            return None;
        }
        if let Some(batch) = self.next_ready(Instant::now()) {
            return Some(batch);
        }
        let take = self.pending.len().min(self.max_batch_size);
        Some(self.take(take))
    }

    /// Discard everything held, returning the count
    pub fn discard(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }

    fn take(&mut self, count: usize) -> Vec<TimelineEvent> {
        self.pending.drain(..count).map(|q| q.event).collect()
    }
}
