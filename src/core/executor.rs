//! Execution-unit traits and cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// How an execution unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The unit did its work and reported it.
    Completed,
    /// The unit was interrupted by a force-cancel and reported nothing.
    Cancelled,
    /// The unit could not run; the reason is kept for the logs.
    Failed(String),
}

/// Executor trait for worker pools.
///
/// The pool calls `execute` on one of its dedicated threads for every payload
/// it dequeues. Implementations may block (for example on the warehouse) but
/// should use `cancel` for any timed waits so a forced shutdown can cut them
/// short.
///
/// # Example
///
/// ```rust,ignore
/// use mission_dispatch::core::{CancelToken, UnitExecutor, UnitOutcome};
///
/// #[derive(Clone)]
/// struct Sleeper;
///
/// impl UnitExecutor<u64> for Sleeper {
///     fn execute(&self, millis: u64, cancel: &CancelToken) -> UnitOutcome {
///         if cancel.sleep(std::time::Duration::from_millis(millis)) {
///             UnitOutcome::Cancelled
///         } else {
///             UnitOutcome::Completed
///         }
///     }
/// }
/// ```
pub trait UnitExecutor<P>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
{
    /// Execute one unit of work.
    fn execute(&self, payload: P, cancel: &CancelToken) -> UnitOutcome;

    /// Called after a unit's counters are settled, so observers see the
    /// freed capacity.
    fn after_unit(&self) {}
}

/// Shared cancellation flag with an interruptible sleep.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel and wake every sleeper.
    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock() = true;
        condvar.notify_all();
    }

    /// Whether `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for `duration` unless cancelled first. Returns `true` if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let mut cancelled = flag.lock();
        let _ = condvar.wait_while_for(&mut cancelled, |c| !*c, duration);
        *cancelled
    }
}
