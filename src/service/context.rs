//! Shared service context.
//!
//! Everything the listener side and the publisher thread both touch lives
//! here and is handed to each component at construction. There is no global
//! mutable state.

use crate::publisher::PublisherMetrics;
use crate::state_machine::ServiceStateMachine;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

#[derive(Debug)]
pub struct ServiceContext {
    state: ServiceStateMachine,
    metrics: PublisherMetrics,
    next_event_id: AtomicU64,
    producer_id: String,
    correlation_id: String,
}

impl ServiceContext {
    pub fn new() -> Self {
        let producer_id = Uuid::new_v4().to_string();
        Self {
            state: ServiceStateMachine::new(),
            metrics: PublisherMetrics::new(),
            next_event_id: AtomicU64::new(0),
            correlation_id: format!("svc_{}", &producer_id[..8]),
            producer_id,
        }
    }

    pub fn state(&self) -> &ServiceStateMachine {
        &self.state
    }

    pub fn metrics(&self) -> &PublisherMetrics {
        &self.metrics
    }

    /// Identifier for this service instance in logs
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Scopes this instance's event ids in the store
    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    /// Allocate the next event identity (starts at 1)
    pub fn next_event_id(&self) -> u64 {
        self.next_event_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self::new()
    }
}
