//! # Timeline Service
//!
//! Facade over the write path. Owns the shared [`ServiceContext`], the event
//! queue and the publisher thread, and exposes the lifecycle operations:
//!
//! ```text
//! Created --start()--> Started --stop()--> Stopping --(flush done / timeout)--> Stopped
//! ```
//!
//! `stop()` returns only after the publisher thread has flushed and exited, so
//! every event accepted before the call is either in the store or reported as
//! dropped/lost by the time it returns.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use timeline_history::config::TimelineConfig;
//! use timeline_history::events::{ApplicationContext, LifecycleEvent, LifecycleListener};
//! use timeline_history::registry::StoreRegistry;
//! use timeline_history::service::TimelineService;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TimelineService::from_config(TimelineConfig::default(), &StoreRegistry::with_defaults())?;
//! service.start(ApplicationContext::new("app-20240101-0001"))?;
//!
//! let listener = service.listener()?;
//! listener.on_event(LifecycleEvent::ApplicationStart { app_name: "etl".into(), user: None })?;
//! listener.on_event(LifecycleEvent::ApplicationEnd)?;
//!
//! service.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod context;

pub use context::ServiceContext;

use crate::config::TimelineConfig;
use crate::error::{TimelineError, TimelineResult};
use crate::events::{ApplicationContext, EventSink, ListenerAdapter, TimelineEvent};
use crate::logging::log_error;
use crate::publisher::{BatchingPublisher, EventQueue, FlushReport, MetricsSnapshot};
use crate::registry::StoreRegistry;
use crate::state_machine::ServiceState;
use crate::store::TimelineStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Enqueue side of the service, handed to listener adapters
#[derive(Debug)]
pub struct ServiceSink {
    context: Arc<ServiceContext>,
    queue: Arc<EventQueue>,
    enqueue_timeout: Duration,
}

impl EventSink for ServiceSink {
    fn next_event_id(&self) -> u64 {
        self.context.next_event_id()
    }

    fn submit(&self, event: TimelineEvent) -> TimelineResult<()> {
        let metrics = self.context.metrics();
        let state = self.context.state().current();
        if !state.accepts_events() {
            metrics.record_rejected();
            return Err(TimelineError::NotAccepting { state });
        }

        let event = event.with_producer(self.context.producer_id());
        match self.queue.enqueue(event, self.enqueue_timeout) {
            Ok(()) => {
                metrics.record_enqueued();
                Ok(())
            }
            Err(TimelineError::NotAccepting { .. }) => {
                metrics.record_rejected();
                // The queue closes just before the state leaves Started
                let state = match self.context.state().current() {
                    ServiceState::Started => ServiceState::Stopping,
                    other => other,
                };
                Err(TimelineError::NotAccepting { state })
            }
            Err(e @ TimelineError::QueueSaturated { .. }) => {
                metrics.record_rejected();
                warn!(
                    correlation_id = %self.context.correlation_id(),
                    error = %e,
                    "⚠️ QUEUE: saturated, event rejected"
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Point-in-time view for health endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub state: ServiceState,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub backend: String,
    pub metrics: MetricsSnapshot,
}

pub struct TimelineService {
    config: TimelineConfig,
    context: Arc<ServiceContext>,
    queue: Arc<EventQueue>,
    store: Arc<dyn TimelineStore>,
    sink: Arc<ServiceSink>,
    application: Mutex<Option<ApplicationContext>>,
    publisher: Mutex<Option<JoinHandle<FlushReport>>>,
    last_flush: Mutex<Option<FlushReport>>,
}

impl std::fmt::Debug for TimelineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineService")
            .field("correlation_id", &self.context.correlation_id())
            .field("state", &self.context.state().current())
            .field("backend", &self.store.backend_name())
            .field("queue_depth", &self.queue.len())
            .finish()
    }
}

impl TimelineService {
    pub fn new(config: TimelineConfig, store: Arc<dyn TimelineStore>) -> TimelineResult<Self> {
        config.validate()?;

        let context = Arc::new(ServiceContext::new());
        let queue = Arc::new(EventQueue::new(config.publisher.queue_capacity));
        let sink = Arc::new(ServiceSink {
            context: context.clone(),
            queue: queue.clone(),
            enqueue_timeout: config.publisher.enqueue_timeout(),
        });

        debug!(
            correlation_id = %context.correlation_id(),
            backend = store.backend_name(),
            queue_capacity = config.publisher.queue_capacity,
            "timeline service created"
        );

        Ok(Self {
            config,
            context,
            queue,
            store,
            sink,
            application: Mutex::new(None),
            publisher: Mutex::new(None),
            last_flush: Mutex::new(None),
        })
    }

    /// Build with the store backend named in `config.store.backend`
    pub fn from_config(config: TimelineConfig, registry: &StoreRegistry) -> TimelineResult<Self> {
        let store = registry.create(&config.store)?;
        Self::new(config, store)
    }

    /// `Created -> Started`; spawns the publisher thread
    pub fn start(&self, application: ApplicationContext) -> TimelineResult<()> {
        // Held across the spawn so a concurrent stop() joins the new thread
        let mut publisher_slot = self.publisher.lock();
        self.context.state().start()?;
        *self.application.lock() = Some(application.clone());

        let publisher = BatchingPublisher::new(
            self.context.clone(),
            self.queue.clone(),
            self.store.clone(),
            self.config.publisher.clone(),
            self.config.store.entity_type.clone(),
        );

        match publisher.spawn() {
            Ok(handle) => {
                *publisher_slot = Some(handle);
                info!(
                    correlation_id = %self.context.correlation_id(),
                    application_id = %application.application_id,
                    entity_id = %application.entity_id(),
                    "✅ SERVICE: started"
                );
                Ok(())
            }
            Err(e) => {
                log_error("service", "start", &e.to_string(), None);
                self.queue.close();
                if self.context.state().begin_stop() == ServiceState::Started {
                    self.finish_stop("publisher failed to spawn");
                }
                Err(e)
            }
        }
    }

    /// Stop intake, flush, and wait for the publisher to exit
    ///
    /// Idempotent. A caller racing an in-progress stop waits for `Stopped`.
    pub fn stop(&self) -> TimelineResult<()> {
        // Close intake before the state changes so no enqueue slips in behind the flush
        self.queue.close();

        match self.context.state().begin_stop() {
            ServiceState::Created => {
                self.queue.discard_all();
                Ok(())
            }
            ServiceState::Started => self.join_publisher(),
            ServiceState::Stopping | ServiceState::Stopped => {
                let wait = self.config.publisher.flush_timeout()
                    + self.config.publisher.post_timeout()
                    + self.config.publisher.poll_interval();
                if self.context.state().await_state(ServiceState::Stopped, wait) {
                    Ok(())
                } else {
                    Err(TimelineError::Internal(format!(
                        "service did not reach stopped within {}ms",
                        wait.as_millis()
                    )))
                }
            }
        }
    }

    fn join_publisher(&self) -> TimelineResult<()> {
        let handle = self.publisher.lock().take();
        let joined = match handle {
            Some(handle) => handle.join().map_err(|_| {
                TimelineError::Internal("publisher thread panicked during shutdown".to_string())
            }),
            None => Err(TimelineError::Internal(
                "service started without a publisher thread".to_string(),
            )),
        };

        match joined {
            Ok(report) => {
                *self.last_flush.lock() = Some(report);
                info!(
                    correlation_id = %self.context.correlation_id(),
                    events_posted = report.events_posted,
                    events_lost = report.events_lost,
                    "✅ SERVICE: stopped"
                );
                Ok(())
            }
            Err(e) => {
                let lost = self.queue.discard_all();
                self.context.metrics().record_lost_on_flush(lost);
                self.finish_stop("publisher thread panicked");
                error!(
                    correlation_id = %self.context.correlation_id(),
                    error = %e,
                    events_lost = lost,
                    "❌ SERVICE: forced stop"
                );
                Err(e)
            }
        }
    }

    /// Force `Stopping -> Stopped` when the publisher cannot do it
    fn finish_stop(&self, reason: &str) {
        if let Err(e) = self
            .context
            .state()
            .transition(ServiceState::Stopping, ServiceState::Stopped)
        {
            warn!(
                correlation_id = %self.context.correlation_id(),
                reason,
                error = %e,
                "service could not be moved to stopped"
            );
        }
    }

    pub fn current_state(&self) -> ServiceState {
        self.context.state().current()
    }

    /// Listener adapter bound to the running application
    pub fn listener(&self) -> TimelineResult<ListenerAdapter> {
        let application = self.application.lock().clone();
        match application {
            Some(application) => Ok(ListenerAdapter::new(
                application,
                self.sink.clone() as Arc<dyn EventSink>,
            )),
            None => Err(TimelineError::NotAccepting {
                state: self.current_state(),
            }),
        }
    }

    /// Enqueue an already-normalized record
    pub fn enqueue(&self, event: TimelineEvent) -> TimelineResult<()> {
        self.sink.submit(event)
    }

    /// Allocate an event id from this service's sequence
    pub fn next_event_id(&self) -> u64 {
        self.context.next_event_id()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.context.metrics().snapshot()
    }

    /// Block until `count` events have been posted, dropped or lost
    pub fn await_events_processed(&self, count: u64, timeout: Duration) -> bool {
        self.context
            .metrics()
            .wait_for_events_processed(count, timeout)
    }

    /// Block until the service reaches `state` (or a later one)
    pub fn await_state(&self, state: ServiceState, timeout: Duration) -> bool {
        self.context.state().await_state(state, timeout)
    }

    /// Report from the most recent shutdown flush
    pub fn last_flush_report(&self) -> Option<FlushReport> {
        *self.last_flush.lock()
    }

    pub fn health(&self) -> ServiceHealth {
        ServiceHealth {
            state: self.current_state(),
            queue_depth: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            backend: self.store.backend_name().to_string(),
            metrics: self.metrics(),
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }
}

impl Drop for TimelineService {
    fn drop(&mut self) {
        if self.context.state().current() == ServiceState::Started {
            if let Err(e) = self.stop() {
                warn!(error = %e, "timeline service dropped while running; stop failed");
            }
        }
    }
}
