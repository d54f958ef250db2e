//! Thread-backed implementation of `WorkerPool`.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on channel recv; shutdown waits on a Condvar
//! - **Bounded intake**: `try_send` on a bounded channel, rejection on full
//! - **Bounded shutdown**: stop intake, drop the backlog, wait a grace period,
//!   force-cancel, wait again, then detach whatever is left

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::executor::{CancelToken, UnitExecutor, UnitOutcome};

use super::{PoolCounters, PoolError, PoolShutdownReport, PoolStats};

/// Count of live worker threads, paired with a Condvar for shutdown waits.
type LiveCount = Arc<(Mutex<usize>, Condvar)>;

/// Decrements the live count when a worker thread ends, even by panic.
struct LiveGuard(LiveCount);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let (count, condvar) = &*self.0;
        let mut live = count.lock();
        *live -= 1;
        condvar.notify_all();
    }
}

/// Worker pool with dedicated OS threads and a bounded backlog.
pub struct WorkerPool<P, E>
where
    P: Send + 'static,
    E: UnitExecutor<P>,
{
    /// Pool configuration.
    config: WorkerPoolConfig,

    /// Task sender (to workers). Option allows clean shutdown by dropping.
    task_tx: Mutex<Option<Sender<P>>>,

    /// Receiver handle kept for draining the backlog at shutdown.
    backlog: Receiver<P>,

    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,

    /// Shutdown flag (lock-free atomic).
    shutdown: Arc<AtomicBool>,

    /// Interrupts timed waits inside running units.
    cancel: CancelToken,

    /// Number of worker threads still running.
    live: LiveCount,

    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,

    _executor: PhantomData<E>,
}

impl<P, E> WorkerPool<P, E>
where
    P: Send + 'static,
    E: UnitExecutor<P>,
{
    /// Create a new worker pool and spawn `config.worker_count` threads.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::Internal` if a thread cannot be spawned
    pub fn new(config: WorkerPoolConfig, executor: E) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (task_tx, task_rx) = bounded::<P>(config.max_queue_depth);
        let counters = Arc::new(PoolCounters::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let cancel = CancelToken::new();
        let live: LiveCount = Arc::new((Mutex::new(0), Condvar::new()));

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            *live.0.lock() += 1;
            let spawned = spawn_worker(
                &config,
                worker_id,
                task_rx.clone(),
                Arc::clone(&counters),
                Arc::clone(&shutdown),
                cancel.clone(),
                LiveGuard(Arc::clone(&live)),
                executor.clone(),
            );
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Dropping `task_tx` on return lets the spawned threads exit.
                    shutdown.store(true, Ordering::Release);
                    return Err(PoolError::Internal(format!("failed to spawn worker: {e}")));
                }
            }
        }

        info!(
            pool = %config.name,
            worker_count = config.worker_count,
            max_queue_depth = config.max_queue_depth,
            "worker pool started"
        );

        Ok(Self {
            config,
            task_tx: Mutex::new(Some(task_tx)),
            backlog: task_rx,
            counters,
            shutdown,
            cancel,
            live,
            workers: Mutex::new(workers),
            _executor: PhantomData,
        })
    }

    /// Submit a unit without blocking.
    ///
    /// # Errors
    ///
    /// - `PoolError::QueueFull` if the backlog is full
    /// - `PoolError::PoolShutdown` if the pool has been shut down
    pub fn submit(&self, payload: P) -> Result<(), PoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let task_tx_guard = self.task_tx.lock();
        let Some(task_tx) = task_tx_guard.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        // Count before sending so a fast worker never decrements below zero.
        self.counters.queued_tasks.fetch_add(1, Ordering::AcqRel);
        match task_tx.try_send(payload) {
            Ok(()) => {
                self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.queued_tasks.fetch_sub(1, Ordering::AcqRel);
                self.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(pool = %self.config.name, "backlog full, unit rejected");
                Err(PoolError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.queued_tasks.fetch_sub(1, Ordering::AcqRel);
                Err(PoolError::PoolShutdown)
            }
        }
    }

    /// Whether the pool still accepts submissions.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }

    /// Free slots in the backlog.
    #[must_use]
    pub fn spare_capacity(&self) -> usize {
        self.config.max_queue_depth.saturating_sub(self.backlog.len())
    }

    /// Units accepted but not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.counters.in_flight()
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters
            .snapshot(self.config.worker_count, self.config.max_queue_depth)
    }

    /// Stop intake and drop every queued unit that has not started.
    ///
    /// Returns how many units were dropped. Calling it again is a no-op.
    pub fn begin_shutdown(&self) -> u64 {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return 0;
        }
        info!(pool = %self.config.name, "shutting down worker pool");

        // Dropping the sender unblocks idle workers once the backlog is empty.
        *self.task_tx.lock() = None;

        let mut abandoned = 0;
        while self.backlog.try_recv().is_ok() {
            abandoned += 1;
        }
        if abandoned > 0 {
            self.counters.queued_tasks.fetch_sub(abandoned, Ordering::AcqRel);
            self.counters
                .abandoned_tasks
                .fetch_add(abandoned, Ordering::Relaxed);
            debug!(pool = %self.config.name, abandoned, "dropped queued units");
        }
        abandoned
    }

    /// Interrupt timed waits of running units.
    pub fn cancel_running(&self) {
        self.cancel.cancel();
    }

    /// Wait up to `timeout` for every worker thread to exit.
    ///
    /// Returns `true` if all exited. Finished threads are joined.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let done = {
            let (count, condvar) = &*self.live;
            let mut live = count.lock();
            while *live > 0 {
                if condvar.wait_until(&mut live, deadline).timed_out() {
                    break;
                }
            }
            *live == 0
        };
        self.reap();
        done
    }

    /// Worker threads that have not exited yet.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        *self.live.0.lock()
    }

    fn reap(&self) {
        let mut workers = self.workers.lock();
        let (finished, running): (Vec<_>, Vec<_>) =
            workers.drain(..).partition(JoinHandle::is_finished);
        *workers = running;
        for (idx, handle) in finished.into_iter().enumerate() {
            if handle.join().is_err() {
                warn!(pool = %self.config.name, worker = idx, "worker panicked");
            }
        }
    }

    /// Shut down with a bounded wait.
    ///
    /// Stops intake, drops the backlog, waits `grace` for running units,
    /// force-cancels, waits `grace` again, and finally detaches stragglers.
    /// Never blocks longer than twice `grace`.
    pub fn shutdown(&self, grace: Duration) -> PoolShutdownReport {
        let abandoned = self.begin_shutdown();
        if !self.await_termination(grace) {
            warn!(pool = %self.config.name, "units still running after grace period, cancelling");
            self.cancel_running();
            self.await_termination(grace);
        }
        let stragglers = self.live_workers();
        if stragglers > 0 {
            warn!(pool = %self.config.name, stragglers, "pool did not terminate, detaching workers");
        } else {
            info!(pool = %self.config.name, "worker pool shut down complete");
        }
        PoolShutdownReport {
            abandoned,
            stragglers,
        }
    }
}

impl<P, E> Drop for WorkerPool<P, E>
where
    P: Send + 'static,
    E: UnitExecutor<P>,
{
    fn drop(&mut self) {
        // Signal shutdown but don't join; explicit shutdown() is the graceful path.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            *self.task_tx.lock() = None;
            debug!(pool = %self.config.name, "pool dropped without explicit shutdown");
        }
    }
}

/// Spawn a worker thread.
#[allow(clippy::too_many_arguments)]
fn spawn_worker<P, E>(
    config: &WorkerPoolConfig,
    worker_id: usize,
    task_rx: Receiver<P>,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    cancel: CancelToken,
    live: LiveGuard,
    executor: E,
) -> std::io::Result<JoinHandle<()>>
where
    P: Send + 'static,
    E: UnitExecutor<P>,
{
    let pool_name = config.name.clone();
    thread::Builder::new()
        .name(format!("{}-{worker_id}", config.name))
        .stack_size(config.thread_stack_size)
        .spawn(move || {
            let _live = live;
            debug!(pool = %pool_name, worker_id, "worker thread started");

            // recv() fails once the sender is dropped and the backlog is empty.
            while let Ok(task) = task_rx.recv() {
                if shutdown.load(Ordering::Acquire) {
                    counters.queued_tasks.fetch_sub(1, Ordering::AcqRel);
                    counters.abandoned_tasks.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                counters.active_tasks.fetch_add(1, Ordering::AcqRel);
                counters.queued_tasks.fetch_sub(1, Ordering::AcqRel);

                let outcome = executor.execute(task, &cancel);

                match outcome {
                    UnitOutcome::Completed => {
                        counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                    }
                    UnitOutcome::Cancelled => {
                        counters.cancelled_tasks.fetch_add(1, Ordering::Relaxed);
                    }
                    UnitOutcome::Failed(reason) => {
                        counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                        debug!(pool = %pool_name, worker_id, reason = %reason, "unit failed");
                    }
                }
                counters.active_tasks.fetch_sub(1, Ordering::AcqRel);
                executor.after_unit();
            }

            debug!(pool = %pool_name, worker_id, "worker thread exiting");
        })
}
