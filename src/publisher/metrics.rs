//! Publisher counters and progress signalling.
//!
//! Counters are plain atomics shared through the service context. Every batch
//! outcome also bumps a progress generation under a mutex and signals a
//! condition variable, so callers can block until the publisher has caught up
//! instead of polling.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct PublisherMetrics {
    events_enqueued: AtomicU64,
    events_rejected: AtomicU64,
    events_posted: AtomicU64,
    events_dropped: AtomicU64,
    events_lost_on_flush: AtomicU64,
    batches_posted: AtomicU64,
    batches_failed: AtomicU64,
    post_attempts: AtomicU64,
    post_failures: AtomicU64,
    last_sequence: AtomicU64,
    progress: Mutex<u64>,
    progressed: Condvar,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub events_enqueued: u64,
    pub events_rejected: u64,
    pub events_posted: u64,
    pub events_dropped: u64,
    pub events_lost_on_flush: u64,
    pub batches_posted: u64,
    pub batches_failed: u64,
    pub post_attempts: u64,
    pub post_failures: u64,
    /// Sequence number of the last acknowledged batch (0 before the first)
    pub last_sequence: u64,
}

impl MetricsSnapshot {
    /// Events whose fate is settled: posted, dropped after retries, or lost on flush
    pub fn events_processed(&self) -> u64 {
        self.events_posted + self.events_dropped + self.events_lost_on_flush
    }
}

impl PublisherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_post_attempts(&self, attempts: u32, failures: u32) {
        self.post_attempts.fetch_add(u64::from(attempts), Ordering::Relaxed);
        self.post_failures.fetch_add(u64::from(failures), Ordering::Relaxed);
    }

    pub fn record_batch_posted(&self, sequence: u64, events: usize) {
        self.events_posted.fetch_add(events as u64, Ordering::Relaxed);
        self.batches_posted.fetch_add(1, Ordering::Relaxed);
        self.last_sequence.store(sequence, Ordering::Relaxed);
        self.signal_progress();
    }

    pub fn record_batch_failed(&self, events: usize) {
        self.events_dropped.fetch_add(events as u64, Ordering::Relaxed);
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.signal_progress();
    }

    pub fn record_lost_on_flush(&self, events: usize) {
        if events == 0 {
            return;
        }
        self.events_lost_on_flush
            .fetch_add(events as u64, Ordering::Relaxed);
        self.signal_progress();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            events_posted: self.events_posted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_lost_on_flush: self.events_lost_on_flush.load(Ordering::Relaxed),
            batches_posted: self.batches_posted.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            post_attempts: self.post_attempts.load(Ordering::Relaxed),
            post_failures: self.post_failures.load(Ordering::Relaxed),
            last_sequence: self.last_sequence.load(Ordering::Relaxed),
        }
    }

    /// Block until `condition` holds for a snapshot, or `timeout` elapses
    ///
    /// Returns whether the condition was met.
    pub fn wait_for<F>(&self, condition: F, timeout: Duration) -> bool
    where
        F: Fn(&MetricsSnapshot) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut generation = self.progress.lock();
        loop {
            if condition(&self.snapshot()) {
                return true;
            }
            if self.progressed.wait_until(&mut generation, deadline).timed_out() {
                return condition(&self.snapshot());
            }
        }
    }

    /// Block until at least `count` events have been posted, dropped or lost
    pub fn wait_for_events_processed(&self, count: u64, timeout: Duration) -> bool {
        self.wait_for(|snapshot| snapshot.events_processed() >= count, timeout)
    }

    fn signal_progress(&self) {
        let mut generation = self.progress.lock();
        *generation += 1;
        self.progressed.notify_all();
    }
}
