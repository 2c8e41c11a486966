//! # Service State Machine
//!
//! Forward-only lifecycle gate shared by the service facade, the event queue
//! producers and the publisher thread.
//!
//! The current state lives in an `AtomicU8` so observers read it without
//! locking. Writers serialize through a mutex whose condition variable is
//! signalled on every transition, which is what `await_state` blocks on.

use super::states::ServiceState;
use crate::error::{TimelineError, TimelineResult};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug)]
pub struct ServiceStateMachine {
    state: AtomicU8,
    transition_lock: Mutex<()>,
    changed: Condvar,
}

impl ServiceStateMachine {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ServiceState::Created as u8),
            transition_lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    /// Current state (lock-free)
    pub fn current(&self) -> ServiceState {
        ServiceState::from(self.state.load(Ordering::Acquire))
    }

    /// Move from `expected` to `target`
    ///
    /// Fails with a state-conflict error when the machine is not in `expected`
    /// or the edge is not one of the permitted forward transitions.
    pub fn transition(&self, expected: ServiceState, target: ServiceState) -> TimelineResult<()> {
        let _guard = self.transition_lock.lock();
        let current = self.current();

        if current != expected || !current.can_transition_to(target) {
            if target == ServiceState::Started && current != ServiceState::Created {
                return Err(TimelineError::AlreadyStarted { state: current });
            }
            return Err(TimelineError::IllegalTransition {
                from: current,
                to: target,
            });
        }

        self.state.store(target as u8, Ordering::Release);
        self.changed.notify_all();

        info!(from = %current, to = %target, "🔄 SERVICE_STATE: transition");
        Ok(())
    }

    /// `Created -> Started`
    pub fn start(&self) -> TimelineResult<()> {
        self.transition(ServiceState::Created, ServiceState::Started)
    }

    /// Begin shutdown, returning the state observed before the call
    ///
    /// `Started` moves to `Stopping` and `Created` goes straight to `Stopped`.
    /// Already stopping or stopped machines are left untouched.
    pub fn begin_stop(&self) -> ServiceState {
        let _guard = self.transition_lock.lock();
        let current = self.current();
        let target = match current {
            ServiceState::Created => ServiceState::Stopped,
            ServiceState::Started => ServiceState::Stopping,
            ServiceState::Stopping | ServiceState::Stopped => {
                debug!(state = %current, "stop requested again; ignoring");
                return current;
            }
        };

        self.state.store(target as u8, Ordering::Release);
        self.changed.notify_all();
        info!(from = %current, to = %target, "🔄 SERVICE_STATE: transition");
        current
    }

    /// Block until the machine reaches `target` (or any later state)
    ///
    /// Returns `false` if the timeout elapsed first.
    pub fn await_state(&self, target: ServiceState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.transition_lock.lock();
        while self.current() < target {
            if self.changed.wait_until(&mut guard, deadline).timed_out() {
                return self.current() >= target;
            }
        }
        true
    }
}

impl Default for ServiceStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
