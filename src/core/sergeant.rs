//! Sergeants: skilled, bounded execution agents.
//!
//! A sergeant owns a fixed-width worker pool. Each accepted hand-off becomes
//! one execution unit: borrow the mission's items, simulate `work_hours` of
//! work, return the items, report the work to the board.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{DispatchConfig, SergeantConfig, WorkerPoolConfig};
use crate::core::audit::{self, build_audit_event, DispatchAction, SharedAuditSink};
use crate::core::board::{ClaimRefusal, Handoff};
use crate::core::executor::{CancelToken, UnitExecutor, UnitOutcome};
use crate::core::worker_pool::{PoolShutdownReport, PoolStats, WorkerPool};
use crate::core::{
    Board, DispatchError, MissionId, MissionSnapshot, MissionStatus, PoolError, PriorityPolicy,
    SergeantId, Warehouse, WarehouseError, WakeSignal,
};

/// Why a sergeant did not take a mission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcceptError {
    /// The board refused the claim; nothing changed.
    #[error("claim refused: {0}")]
    Refused(#[from] ClaimRefusal),
    /// The pool refused the unit; the claim was rolled back.
    #[error("hand-off rejected: {0}")]
    Rejected(#[from] PoolError),
}

/// Execution unit body shared by every thread of one sergeant.
#[derive(Clone)]
pub(crate) struct MissionRunner {
    sergeant: Arc<str>,
    work_hours: u32,
    time_unit: Duration,
    board: Arc<Board>,
    warehouse: Arc<Warehouse>,
    signal: Arc<WakeSignal>,
    audit: SharedAuditSink,
}

impl UnitExecutor<Handoff> for MissionRunner {
    fn execute(&self, unit: Handoff, cancel: &CancelToken) -> UnitOutcome {
        debug!(sergeant = %self.sergeant, mission = %unit.name, "work cycle started");

        match self.warehouse.borrow(&self.sergeant, &unit.items) {
            Ok(()) => {}
            Err(WarehouseError::Closed) => {
                warn!(sergeant = %self.sergeant, mission = %unit.name, "warehouse closed before items were borrowed");
                return UnitOutcome::Cancelled;
            }
            Err(e) => {
                error!(sergeant = %self.sergeant, mission = %unit.name, error = %e, "mission cannot proceed");
                audit::record(&self.audit, || {
                    build_audit_event(
                        unit.name.as_str(),
                        Some(&*self.sergeant),
                        DispatchAction::Failed,
                        Some(e.to_string()),
                    )
                });
                return UnitOutcome::Failed(e.to_string());
            }
        }

        let cancelled = cancel.sleep(self.time_unit * self.work_hours);

        if let Err(e) = self.warehouse.return_items(&self.sergeant, &unit.items) {
            warn!(sergeant = %self.sergeant, mission = %unit.name, error = %e, "could not return items");
        }

        if cancelled {
            warn!(sergeant = %self.sergeant, mission = %unit.name, "work cycle interrupted");
            return UnitOutcome::Cancelled;
        }

        match self.board.report_work(unit.id, self.work_hours) {
            Ok(MissionStatus::Done) => {
                debug!(sergeant = %self.sergeant, mission = %unit.name, "final work cycle reported");
                audit::record(&self.audit, || {
                    build_audit_event(
                        unit.name.as_str(),
                        Some(&*self.sergeant),
                        DispatchAction::Completed,
                        None,
                    )
                });
            }
            Ok(_) => {}
            Err(e) => return UnitOutcome::Failed(e.to_string()),
        }
        debug!(sergeant = %self.sergeant, mission = %unit.name, "work cycle finished");
        UnitOutcome::Completed
    }

    fn after_unit(&self) {
        self.signal.wake();
    }
}

/// A named, skilled worker with its own thread pool.
pub struct Sergeant {
    id: SergeantId,
    name: Arc<str>,
    skills: BTreeSet<String>,
    max_missions: usize,
    work_hours: u32,
    priority: PriorityPolicy,
    pool: WorkerPool<Handoff, MissionRunner>,
    board: Arc<Board>,
    audit: SharedAuditSink,
}

impl std::fmt::Debug for Sergeant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sergeant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("skills", &self.skills)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl Sergeant {
    /// Build a sergeant and start its threads.
    ///
    /// # Errors
    ///
    /// `DispatchError::Config` for invalid values, `DispatchError::Pool` if
    /// the threads cannot be spawned.
    pub fn new(
        id: SergeantId,
        config: &SergeantConfig,
        runtime: &DispatchConfig,
        board: Arc<Board>,
        warehouse: Arc<Warehouse>,
        audit: SharedAuditSink,
    ) -> Result<Self, DispatchError> {
        config.validate().map_err(DispatchError::Config)?;
        let name: Arc<str> = Arc::from(config.name.as_str());
        let runner = MissionRunner {
            sergeant: Arc::clone(&name),
            work_hours: config.work_hours,
            time_unit: runtime.time_unit(),
            signal: board.signal(),
            board: Arc::clone(&board),
            warehouse,
            audit: audit.clone(),
        };
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_name(format!("sgt-{name}"))
                .with_worker_count(config.threads)
                .with_max_queue_depth(config.backlog_capacity())
                .with_thread_stack_size(runtime.thread_stack_size),
            runner,
        )?;
        info!(
            sergeant = %name,
            threads = config.threads,
            max_missions = config.max_missions,
            work_hours = config.work_hours,
            priority = %config.priority,
            "sergeant registered"
        );
        Ok(Self {
            id,
            name,
            skills: config.skills.iter().cloned().collect(),
            max_missions: config.max_missions,
            work_hours: config.work_hours,
            priority: config.priority,
            pool,
            board,
            audit,
        })
    }

    /// Registration id.
    #[must_use]
    pub const fn id(&self) -> SergeantId {
        self.id
    }

    /// Sergeant name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ranking policy.
    #[must_use]
    pub const fn priority(&self) -> PriorityPolicy {
        self.priority
    }

    /// Hours per execution unit.
    #[must_use]
    pub const fn work_hours(&self) -> u32 {
        self.work_hours
    }

    /// Whether the sergeant can staff `skill`.
    #[must_use]
    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.contains(skill)
    }

    /// Whether another unit can be accepted right now.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.pool.is_accepting()
            && self.pool.spare_capacity() > 0
            && self.pool.in_flight() < self.max_missions as u64
    }

    /// Claim one work cycle of `mission` and queue it.
    ///
    /// # Errors
    ///
    /// `AcceptError::Refused` if the board will not bind the mission to this
    /// sergeant; `AcceptError::Rejected` if the pool is full or shut down.
    pub fn accept(&self, mission: MissionId) -> Result<(), AcceptError> {
        let handoff = self.board.claim(mission, self.id, self.work_hours)?;
        let name = handoff.name.clone();
        let first = handoff.first;

        if let Err(e) = self.pool.submit(handoff) {
            self.board.unclaim(mission, self.work_hours);
            if e == PoolError::QueueFull {
                warn!(sergeant = %self.name, mission = %name, "mission rejected, backlog full");
            } else {
                warn!(sergeant = %self.name, mission = %name, error = %e, "hand-off rejected");
            }
            audit::record(&self.audit, || {
                build_audit_event(
                    name.as_str(),
                    Some(&*self.name),
                    DispatchAction::Rejected,
                    Some(e.to_string()),
                )
            });
            return Err(AcceptError::Rejected(e));
        }

        if first {
            info!(sergeant = %self.name, mission = %name, "mission STARTED");
            audit::record(&self.audit, || {
                build_audit_event(name.as_str(), Some(&*self.name), DispatchAction::Started, None)
            });
        }
        debug!(sergeant = %self.name, mission = %name, "work cycle handed off");
        audit::record(&self.audit, || {
            build_audit_event(name.as_str(), Some(&*self.name), DispatchAction::Handed, None)
        });
        Ok(())
    }

    /// Pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Point-in-time report of the sergeant and its missions.
    #[must_use]
    pub fn report(&self) -> SergeantReport {
        SergeantReport {
            id: self.id,
            name: self.name.to_string(),
            skills: self.skills.iter().cloned().collect(),
            priority: self.priority,
            max_missions: self.max_missions,
            work_hours: self.work_hours,
            missions: self.board.assigned_to(self.id),
            stats: self.pool.stats(),
        }
    }

    /// Stop intake and drop queued units. Returns how many were dropped.
    pub fn begin_shutdown(&self) -> u64 {
        self.pool.begin_shutdown()
    }

    /// Interrupt the simulated work of running units.
    pub fn cancel_running(&self) {
        self.pool.cancel_running();
    }

    /// Wait up to `timeout` for every thread to exit.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.pool.await_termination(timeout)
    }

    /// Threads still running.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.pool.live_workers()
    }

    /// Shut this sergeant down on its own with a bounded wait.
    pub fn shutdown(&self, grace: Duration) -> PoolShutdownReport {
        self.pool.shutdown(grace)
    }
}

/// Serializable view of a sergeant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SergeantReport {
    /// Registration id.
    pub id: SergeantId,
    /// Sergeant name.
    pub name: String,
    /// Skills.
    pub skills: Vec<String>,
    /// Ranking policy.
    pub priority: PriorityPolicy,
    /// Mission cap.
    pub max_missions: usize,
    /// Hours per execution unit.
    pub work_hours: u32,
    /// Missions bound to the sergeant.
    pub missions: Vec<MissionSnapshot>,
    /// Pool statistics.
    pub stats: PoolStats,
}
