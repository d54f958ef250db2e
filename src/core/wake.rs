//! Condvar-based wake notifications between the board and the scheduler.
//!
//! A wake sets a pending flag, so a notification raised while the scheduler
//! is busy distributing is not lost; the next suspend returns immediately.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

/// Why the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Every mission on the board reached DONE.
    AllComplete,
    /// `cancel()` was called.
    Cancelled,
}

/// Outcome of a suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// Run another scan/distribute cycle.
    Cycle,
    /// Leave the loop.
    Stop(StopReason),
}

/// Shared state for Condvar-based wake notifications.
#[derive(Debug, Default)]
struct WakeState {
    pending: bool,
    stop: Option<StopReason>,
    loop_exited: bool,
}

/// Wake channel owned jointly by a board and its scheduler.
#[derive(Debug, Default)]
pub struct WakeSignal {
    state: Mutex<WakeState>,
    condvar: Condvar,
}

impl WakeSignal {
    /// Create a signal with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request another scheduling cycle.
    pub fn wake(&self) {
        let mut state = self.state.lock();
        state.pending = true;
        self.condvar.notify_all();
    }

    /// Move to STOPPED. The first reason recorded wins.
    pub fn stop(&self, reason: StopReason) {
        let mut state = self.state.lock();
        if state.stop.is_none() {
            state.stop = Some(reason);
        }
        self.condvar.notify_all();
    }

    /// Reason the scheduler stopped, if it has.
    #[must_use]
    pub fn stopped(&self) -> Option<StopReason> {
        self.state.lock().stop
    }

    /// Block until woken or stopped. Spurious condvar wakeups loop back.
    pub(crate) fn suspend(&self) -> Wake {
        let mut state = self.state.lock();
        loop {
            if let Some(reason) = state.stop {
                return Wake::Stop(reason);
            }
            if state.pending {
                state.pending = false;
                return Wake::Cycle;
            }
            self.condvar.wait(&mut state);
        }
    }

    pub(crate) fn mark_loop_exited(&self) {
        let mut state = self.state.lock();
        state.loop_exited = true;
        self.condvar.notify_all();
    }

    /// Wait until a stop reason is recorded, up to `timeout`.
    pub fn await_stopped(&self, timeout: Duration) -> Option<StopReason> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.stop.is_none() {
            if self.condvar.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.stop
    }

    /// Wait until the scheduler thread has left its loop, up to `timeout`.
    pub(crate) fn await_loop_exit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.loop_exited {
            if self.condvar.wait_until(&mut state, deadline).timed_out() {
                return state.loop_exited;
            }
        }
        true
    }
}
