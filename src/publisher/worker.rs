//! # Batching Publisher
//!
//! The only thread allowed to post to the remote store.
//!
//! While the service is `Started` the loop drains the queue into a
//! [`BatchAssembler`] and posts each batch whose trigger has fired. Posts run
//! on a current-thread tokio runtime owned by this thread, with a per-call
//! timeout and bounded exponential backoff. A batch that exhausts its retries
//! is dropped and reported; it is never re-queued.
//!
//! Once the service moves to `Stopping` the loop switches to the flush phase:
//! everything still queued or held is posted, bounded by `flush_timeout`.
//! The deadline stops new posts and retries; a post already in flight runs to
//! completion or to its own `post_timeout`. Whatever remains unposted after
//! that is counted as lost. The thread then moves the service to `Stopped`.

use super::batch::{Batch, BatchAssembler};
use super::queue::EventQueue;
use crate::config::PublisherConfig;
use crate::error::{StoreError, TimelineError, TimelineResult};
use crate::events::TimelineEvent;
use crate::logging::{log_batch_operation, log_error};
use crate::resilience::RetryPolicy;
use crate::service::ServiceContext;
use crate::state_machine::ServiceState;
use crate::store::TimelineStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

/// What happened to one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Posted(usize),
    /// Retries exhausted; events dropped
    Dropped(usize),
    /// Flush deadline reached mid-retry
    Lost(usize),
}

/// Summary of the shutdown flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub events_posted: usize,
    pub events_dropped: usize,
    pub events_lost: usize,
    pub timed_out: bool,
    pub duration_ms: u64,
}

pub struct BatchingPublisher {
    context: Arc<ServiceContext>,
    queue: Arc<EventQueue>,
    store: Arc<dyn TimelineStore>,
    config: PublisherConfig,
    entity_type: String,
    retry: RetryPolicy,
    assembler: BatchAssembler,
    next_sequence: u64,
}

impl BatchingPublisher {
    pub fn new(
        context: Arc<ServiceContext>,
        queue: Arc<EventQueue>,
        store: Arc<dyn TimelineStore>,
        config: PublisherConfig,
        entity_type: impl Into<String>,
    ) -> Self {
        let assembler = BatchAssembler::new(config.max_batch_size, config.max_batch_latency());
        let retry = RetryPolicy::for_publisher(&config);
        Self {
            context,
            queue,
            store,
            config,
            entity_type: entity_type.into(),
            retry,
            assembler,
            next_sequence: 0,
        }
    }

    /// Start the publisher on its own named thread
    pub fn spawn(self) -> TimelineResult<JoinHandle<FlushReport>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TimelineError::Internal(format!("failed to build publisher runtime: {e}")))?;

        std::thread::Builder::new()
            .name("timeline-publisher".to_string())
            .spawn(move || self.run(runtime))
            .map_err(|e| TimelineError::Internal(format!("failed to spawn publisher thread: {e}")))
    }

    fn run(mut self, runtime: Runtime) -> FlushReport {
        info!(
            correlation_id = %self.context.correlation_id(),
            backend = self.store.backend_name(),
            max_batch_size = self.config.max_batch_size,
            max_batch_latency_ms = self.config.max_batch_latency_ms,
            "🚀 PUBLISHER: started"
        );

        while self.context.state().current() == ServiceState::Started {
            let wait = self.next_wait();
            let drained = self.queue.drain(self.config.max_batch_size, wait);
            self.assembler.extend(drained);

            while let Some(events) = self.assembler.next_ready(Instant::now()) {
                runtime.block_on(self.publish(events, None));
            }
        }

        let report = self.flush(&runtime);

        if let Err(e) = self
            .context
            .state()
            .transition(ServiceState::Stopping, ServiceState::Stopped)
        {
            warn!(error = %e, "publisher finished outside of the stopping state");
        }

        info!(
            events_posted = report.events_posted,
            events_dropped = report.events_dropped,
            events_lost = report.events_lost,
            timed_out = report.timed_out,
            duration_ms = report.duration_ms,
            "🛑 PUBLISHER: stopped"
        );
        report
    }

    /// How long the next drain may block
    fn next_wait(&self) -> Duration {
        let poll = self.config.poll_interval();
        match self.assembler.time_until_due(Instant::now()) {
            Some(due) => due.min(poll),
            None => poll,
        }
    }

    /// Post everything still queued or held, bounded by the flush timeout
    fn flush(&mut self, runtime: &Runtime) -> FlushReport {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.config.flush_timeout();
        let mut report = FlushReport::default();

        debug!(
            queued = self.queue.len(),
            held = self.assembler.len(),
            flush_timeout_ms = self.config.flush_timeout_ms,
            "flushing remaining events"
        );

        loop {
            self.assembler.extend(self.queue.try_drain(usize::MAX));

            let Some(events) = self.assembler.next_forced() else {
                break;
            };

            if tokio::time::Instant::now() >= deadline {
                let lost = events.len() + self.assembler.discard() + self.queue.discard_all();
                self.context.metrics().record_lost_on_flush(lost);
                report.events_lost += lost;
                report.timed_out = true;
                log_error(
                    "publisher",
                    "flush",
                    "flush timeout reached",
                    Some(&format!("{lost} events lost")),
                );
                break;
            }

            match runtime.block_on(self.publish(events, Some(deadline))) {
                BatchOutcome::Posted(count) => report.events_posted += count,
                BatchOutcome::Dropped(count) => report.events_dropped += count,
                BatchOutcome::Lost(count) => {
                    report.events_lost += count;
                    report.timed_out = true;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }

    /// Post one batch with retries
    ///
    /// The sequence number is fixed before the first attempt, so every retry
    /// of the batch carries the same number and the same event ids.
    async fn publish(
        &mut self,
        events: Vec<TimelineEvent>,
        deadline: Option<tokio::time::Instant>,
    ) -> BatchOutcome {
        self.next_sequence += 1;
        let mut batch = Batch::new(self.next_sequence, events);
        let fragments = batch.to_entities(&self.entity_type);
        let store = self.store.clone();

        let outcome = self
            .retry
            .execute("post_entity", self.config.post_timeout(), deadline, || {
                let store = store.clone();
                let fragments = fragments.clone();
                async move {
                    for fragment in fragments {
                        store.post_entity(fragment).await?;
                    }
                    Ok::<(), StoreError>(())
                }
            })
            .await;

        batch.post_attempts = outcome.attempts;
        let metrics = self.context.metrics();
        metrics.record_post_attempts(outcome.attempts, outcome.failed_attempts());

        match outcome.result {
            Ok(()) => {
                metrics.record_batch_posted(batch.sequence_number, batch.len());
                log_batch_operation(
                    "post",
                    batch.sequence_number,
                    batch.len(),
                    batch.post_attempts,
                    "posted",
                    None,
                );
                BatchOutcome::Posted(batch.len())
            }
            Err(e) if outcome.deadline_exceeded => {
                metrics.record_lost_on_flush(batch.len());
                error!(
                    sequence = batch.sequence_number,
                    event_count = batch.len(),
                    attempts = batch.post_attempts,
                    error = %e,
                    "❌ PUBLISHER: flush deadline reached while posting; events lost"
                );
                BatchOutcome::Lost(batch.len())
            }
            Err(e) => {
                metrics.record_batch_failed(batch.len());
                log_batch_operation(
                    "post",
                    batch.sequence_number,
                    batch.len(),
                    batch.post_attempts,
                    "dropped",
                    Some(&e.to_string()),
                );
                log_error(
                    "publisher",
                    "post_entity",
                    &e.to_string(),
                    Some(&format!(
                        "batch {} abandoned after {} attempts; {} events dropped",
                        batch.sequence_number,
                        batch.post_attempts,
                        batch.len()
                    )),
                );
                BatchOutcome::Dropped(batch.len())
            }
        }
    }
}
