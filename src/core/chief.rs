//! Chief of staff: the scheduler control loop.
//!
//! `RUNNING -> (scan -> distribute -> suspend) -> RUNNING`, ending in
//! `STOPPED` on cancel or when the board reports global completion.
//!
//! A distribute pass holds the readiness-index lock across every sergeant,
//! so two sergeants can never race for the same mission. Claims themselves
//! are atomic on the board as well.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DispatchConfig, SergeantConfig};
use crate::core::audit::{self, build_audit_event, DispatchAction, SharedAuditSink};
use crate::core::mission_holder::MissionHolder;
use crate::core::sergeant::{AcceptError, Sergeant, SergeantReport};
use crate::core::wake::{StopReason, Wake, WakeSignal};
use crate::core::{Board, DispatchError, SergeantId, Warehouse};

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    /// Constructed but not started.
    Idle,
    /// The control loop is running.
    Running,
    /// Terminal state.
    Stopped(StopReason),
}

/// What one scan+distribute pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchPass {
    /// Missions moved into the readiness index by the scan.
    pub scanned: usize,
    /// Work cycles accepted by sergeants.
    pub handed: usize,
    /// Hand-offs refused because a backlog was full.
    pub rejected: usize,
}

/// A sergeant whose threads did not exit in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Straggler {
    /// Sergeant name.
    pub sergeant: String,
    /// Threads still running.
    pub threads: usize,
}

/// Outcome of [`ChiefOfStaff::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Why the scheduler stopped.
    pub reason: Option<StopReason>,
    /// Queued work cycles dropped before they started.
    pub abandoned: u64,
    /// Whether running units had to be force-cancelled.
    pub forced: bool,
    /// Sergeants detached with threads still running.
    pub stragglers: Vec<Straggler>,
    /// Whether the control loop thread exited.
    pub scheduler_exited: bool,
}

impl ShutdownReport {
    /// Whether every thread exited.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.stragglers.is_empty() && self.scheduler_exited
    }
}

/// The scheduler.
pub struct ChiefOfStaff {
    board: Arc<Board>,
    warehouse: Arc<Warehouse>,
    holder: Arc<MissionHolder>,
    signal: Arc<WakeSignal>,
    sergeants: RwLock<Vec<Arc<Sergeant>>>,
    config: DispatchConfig,
    audit: SharedAuditSink,
    started: AtomicBool,
    total_threads: AtomicUsize,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChiefOfStaff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChiefOfStaff")
            .field("state", &self.state())
            .field("sergeants", &self.sergeants.read().len())
            .field("total_threads", &self.total_threads())
            .finish_non_exhaustive()
    }
}

impl ChiefOfStaff {
    /// Create a scheduler bound to `board`.
    #[must_use]
    pub fn new(
        board: Arc<Board>,
        warehouse: Arc<Warehouse>,
        config: DispatchConfig,
        audit: SharedAuditSink,
    ) -> Self {
        Self {
            holder: board.holder(),
            signal: board.signal(),
            board,
            warehouse,
            sergeants: RwLock::new(Vec::new()),
            config,
            audit,
            started: AtomicBool::new(false),
            total_threads: AtomicUsize::new(0),
            handle: Mutex::new(None),
        }
    }

    /// The board this scheduler drives.
    #[must_use]
    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    /// The warehouse sergeants borrow from.
    #[must_use]
    pub fn warehouse(&self) -> &Arc<Warehouse> {
        &self.warehouse
    }

    /// Register a sergeant and wake the loop.
    ///
    /// # Errors
    ///
    /// `DispatchError::DuplicateSergeant` if the name is taken, or any error
    /// from building the sergeant.
    pub fn add_sergeant(&self, config: &SergeantConfig) -> Result<SergeantId, DispatchError> {
        let mut sergeants = self.sergeants.write();
        if sergeants.iter().any(|s| s.name() == config.name) {
            warn!(sergeant = %config.name, "tried to add a duplicate sergeant");
            return Err(DispatchError::DuplicateSergeant(config.name.clone()));
        }
        let id = SergeantId(sergeants.len());
        let sergeant = Sergeant::new(
            id,
            config,
            &self.config,
            Arc::clone(&self.board),
            Arc::clone(&self.warehouse),
            self.audit.clone(),
        )?;
        sergeants.push(Arc::new(sergeant));
        drop(sergeants);

        self.total_threads.fetch_add(config.threads, Ordering::Relaxed);
        self.signal.wake();
        Ok(id)
    }

    /// Start the control loop on its own thread.
    ///
    /// # Errors
    ///
    /// `DispatchError::AlreadyStarted` on a second call, or
    /// `DispatchError::Spawn` if the thread cannot be created.
    pub fn start(self: &Arc<Self>) -> Result<(), DispatchError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::AlreadyStarted);
        }
        let chief = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("chief-of-staff".into())
            .spawn(move || chief.run())?;
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    fn run(&self) {
        info!(sergeants = self.sergeants.read().len(), "chief of staff started");
        loop {
            self.dispatch_once();
            match self.signal.suspend() {
                Wake::Cycle => {}
                Wake::Stop(reason) => {
                    info!(?reason, "chief of staff stopped");
                    break;
                }
            }
        }
        self.signal.mark_loop_exited();
    }

    /// Run one scan and distribute pass on the calling thread.
    ///
    /// Does nothing once the scheduler is STOPPED.
    pub fn dispatch_once(&self) -> DispatchPass {
        let mut pass = DispatchPass::default();
        if self.signal.stopped().is_some() {
            return pass;
        }

        pass.scanned = self.holder.insert_missions(self.board.export_ready());
        if pass.scanned > 0 {
            debug!(scanned = pass.scanned, "missions moved to readiness index");
        }

        let sergeants = self.sergeants.read();
        let view = self.holder.view();
        for sergeant in sergeants.iter() {
            if !sergeant.is_available() {
                continue;
            }
            let (key, descending) = sergeant.priority().ordering();
            for candidate in view.ranked(key, descending) {
                if !sergeant.has_skill(&candidate.skill) {
                    continue;
                }
                if !sergeant.is_available() {
                    break;
                }
                match sergeant.accept(candidate.id) {
                    Ok(()) => pass.handed += 1,
                    Err(AcceptError::Refused(_)) => {}
                    Err(AcceptError::Rejected(_)) => {
                        pass.rejected += 1;
                        break;
                    }
                }
            }
        }
        pass
    }

    /// Move to STOPPED at the next suspend point. Running units are not interrupted.
    pub fn cancel(&self) {
        if self.signal.stopped().is_none() {
            info!("chief of staff cancelled");
            audit::record(&self.audit, || {
                build_audit_event("", None, DispatchAction::Cancelled, None)
            });
        }
        self.signal.stop(StopReason::Cancelled);
    }

    /// Current scheduler state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        match self.signal.stopped() {
            Some(reason) => SchedulerState::Stopped(reason),
            None if self.started.load(Ordering::Acquire) => SchedulerState::Running,
            None => SchedulerState::Idle,
        }
    }

    /// Block until STOPPED or `timeout` elapses.
    pub fn await_stopped(&self, timeout: Duration) -> Option<StopReason> {
        self.signal.await_stopped(timeout)
    }

    /// Registered sergeants with their bound missions.
    #[must_use]
    pub fn roster(&self) -> Vec<SergeantReport> {
        self.sergeants.read().iter().map(|s| s.report()).collect()
    }

    /// Look a sergeant up by name.
    #[must_use]
    pub fn sergeant(&self, name: &str) -> Option<Arc<Sergeant>> {
        self.sergeants
            .read()
            .iter()
            .find(|s| s.name() == name)
            .map(Arc::clone)
    }

    /// Name of the sergeant registered under `id`.
    #[must_use]
    pub fn sergeant_name(&self, id: SergeantId) -> Option<String> {
        self.sergeants.read().get(id.0).map(|s| s.name().to_string())
    }

    /// Total worker threads across every sergeant.
    #[must_use]
    pub fn total_threads(&self) -> usize {
        self.total_threads.load(Ordering::Relaxed)
    }

    /// Stop the scheduler and every sergeant, waiting at most twice `grace`
    /// for running units plus `grace` for the control loop.
    ///
    /// Queued units are dropped. Units still running after the first grace
    /// period are cancelled and the warehouse is closed so blocked borrowers
    /// give up. Threads still alive after that are detached and reported.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.cancel();
        let sergeants: Vec<Arc<Sergeant>> = self.sergeants.read().clone();

        let abandoned = sergeants.iter().map(|s| s.begin_shutdown()).sum();
        let mut forced = false;
        if !await_all(&sergeants, grace) {
            warn!("units still running after grace period, cancelling");
            forced = true;
            for sergeant in &sergeants {
                sergeant.cancel_running();
            }
            self.warehouse.close();
            await_all(&sergeants, grace);
        }

        let stragglers: Vec<Straggler> = sergeants
            .iter()
            .filter(|s| s.live_workers() > 0)
            .map(|s| Straggler {
                sergeant: s.name().to_string(),
                threads: s.live_workers(),
            })
            .collect();
        for straggler in &stragglers {
            warn!(sergeant = %straggler.sergeant, threads = straggler.threads, "sergeant did not terminate, detaching");
        }

        let scheduler_exited = if self.started.load(Ordering::Acquire) {
            let exited = self.signal.await_loop_exit(grace);
            if exited {
                if let Some(handle) = self.handle.lock().take() {
                    if handle.join().is_err() {
                        warn!("chief of staff thread panicked");
                    }
                }
            }
            exited
        } else {
            true
        };

        let report = ShutdownReport {
            reason: self.signal.stopped(),
            abandoned,
            forced,
            stragglers,
            scheduler_exited,
        };
        info!(
            abandoned = report.abandoned,
            forced = report.forced,
            clean = report.is_clean(),
            "shutdown complete"
        );
        report
    }
}

fn await_all(sergeants: &[Arc<Sergeant>], grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    sergeants
        .iter()
        .all(|s| s.await_termination(deadline.saturating_duration_since(Instant::now())))
}
