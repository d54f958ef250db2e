//! Fixed-width worker pool with a bounded backlog.
//!
//! Each sergeant owns one pool. Submissions go through a bounded channel;
//! when it is full the submission is rejected immediately instead of
//! blocking the scheduler. Threads block on the channel, so an idle pool
//! costs nothing.
//!
//! # Example
//!
//! ```rust,ignore
//! use mission_dispatch::config::WorkerPoolConfig;
//! use mission_dispatch::core::WorkerPool;
//!
//! let pool = WorkerPool::new(
//!     WorkerPoolConfig::new()
//!         .with_name("sgt-rex")
//!         .with_worker_count(2)
//!         .with_max_queue_depth(4),
//!     my_executor,
//! )?;
//! pool.submit(unit)?;
//! let report = pool.shutdown(std::time::Duration::from_secs(5));
//! ```

mod threads;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

pub use threads::WorkerPool;

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The backlog is full; the unit was not accepted.
    QueueFull,

    /// The pool has been shut down.
    PoolShutdown,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// Internal error (thread spawn failure and the like).
    Internal(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "task queue is full"),
            Self::PoolShutdown => write!(f, "pool has been shut down"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,

    /// Backlog capacity.
    pub queue_capacity: usize,

    /// Currently executing units.
    pub active_tasks: u64,

    /// Units waiting in the backlog.
    pub queued_tasks: u64,

    /// Units accepted into the backlog.
    pub submitted_tasks: u64,

    /// Units refused because the backlog was full.
    pub rejected_tasks: u64,

    /// Units that finished their work.
    pub completed_tasks: u64,

    /// Units that could not run.
    pub failed_tasks: u64,

    /// Units interrupted by a force-cancel.
    pub cancelled_tasks: u64,

    /// Queued units dropped at shutdown before they started.
    pub abandoned_tasks: u64,
}

impl PoolStats {
    /// Units accepted but not yet finished.
    #[must_use]
    pub const fn in_flight(&self) -> u64 {
        self.active_tasks + self.queued_tasks
    }
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
    pub rejected_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub cancelled_tasks: AtomicU64,
    pub abandoned_tasks: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize, queue_capacity: usize) -> PoolStats {
        PoolStats {
            worker_count,
            queue_capacity,
            active_tasks: self.active_tasks.load(Ordering::Acquire),
            queued_tasks: self.queued_tasks.load(Ordering::Acquire),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            rejected_tasks: self.rejected_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
            abandoned_tasks: self.abandoned_tasks.load(Ordering::Relaxed),
        }
    }

    /// Units accepted but not yet finished.
    pub fn in_flight(&self) -> u64 {
        self.active_tasks.load(Ordering::Acquire) + self.queued_tasks.load(Ordering::Acquire)
    }
}

/// What a pool shutdown achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolShutdownReport {
    /// Queued units dropped before they started.
    pub abandoned: u64,
    /// Threads still running after the force-cancel grace period.
    pub stragglers: usize,
}

impl PoolShutdownReport {
    /// Whether every thread exited.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.stragglers == 0
    }
}
