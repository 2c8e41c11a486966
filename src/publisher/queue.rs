//! # Event Queue
//!
//! Bounded FIFO between the producer threads (the host application's event
//! dispatch) and the single publisher thread. It is the only synchronization
//! point between the two sides: one mutex, two condition variables.
//!
//! - `enqueue` blocks while the queue is full, up to a timeout, then fails
//!   with [`TimelineError::QueueSaturated`]. Nothing is dropped silently.
//! - `close` stops intake permanently; blocked producers wake and are
//!   rejected, and later calls are rejected without waiting.
//! - `drain` blocks until at least one event is available or the poll
//!   interval elapses, then returns up to `max` events in FIFO order.

use crate::error::{TimelineError, TimelineResult};
use crate::events::TimelineEvent;
use crate::state_machine::ServiceState;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct QueueInner {
    events: VecDeque<QueuedEvent>,
    closed: bool,
}

/// An event plus the instant it entered the queue
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub event: TimelineEvent,
    pub enqueued_at: Instant,
}

#[derive(Debug)]
pub struct EventQueue {
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                events: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Append an event, waiting up to `timeout` for space
    pub fn enqueue(&self, event: TimelineEvent, timeout: Duration) -> TimelineResult<()> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut inner = self.inner.lock();

        loop {
            if inner.closed {
                return Err(TimelineError::NotAccepting {
                    state: ServiceState::Stopping,
                });
            }
            if inner.events.len() < self.capacity {
                inner.events.push_back(QueuedEvent {
                    event,
                    enqueued_at: Instant::now(),
                });
                self.not_empty.notify_one();
                return Ok(());
            }
            if self.not_full.wait_until(&mut inner, deadline).timed_out()
                && inner.events.len() >= self.capacity
                && !inner.closed
            {
                return Err(TimelineError::QueueSaturated {
                    capacity: self.capacity,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
    }

    /// Take up to `max` events, waiting at most `wait` for the first one
    ///
    /// An empty result means the wait elapsed (or the queue was closed) with
    /// nothing pending; it is not a batch.
    pub fn drain(&self, max: usize, wait: Duration) -> Vec<QueuedEvent> {
        let deadline = Instant::now() + wait;
        let mut inner = self.inner.lock();

        while inner.events.is_empty() && !inner.closed {
            if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }

        self.take_locked(&mut inner, max)
    }

    /// Take up to `max` events without waiting
    pub fn try_drain(&self, max: usize) -> Vec<QueuedEvent> {
        let mut inner = self.inner.lock();
        self.take_locked(&mut inner, max)
    }

    /// Stop intake permanently and wake every waiter
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Drop everything still queued, returning how many events were discarded
    pub fn discard_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let discarded = inner.events.len();
        inner.events.clear();
        self.not_full.notify_all();
        discarded
    }

    fn take_locked(&self, inner: &mut QueueInner, max: usize) -> Vec<QueuedEvent> {
        let count = inner.events.len().min(max.max(1));
        if count == 0 {
            return Vec::new();
        }
        let taken: Vec<QueuedEvent> = inner.events.drain(..count).collect();
        self.not_full.notify_all();
        taken
    }
}
