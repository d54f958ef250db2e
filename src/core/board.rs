//! Mission board: the authoritative mission arena and dependency graph.
//!
//! Every mutation happens under one board lock, so deriving a mission's
//! status, checking global completion and waking the scheduler form a single
//! atomic step. The board never takes the readiness-index lock while holding
//! its own; eviction from the index happens right after the board lock is
//! released. The scheduler takes the locks in the opposite order (index,
//! then board) during distribution, so this keeps the two deadlock-free.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::audit::{self, build_audit_event, DispatchAction, SharedAuditSink};
use crate::core::mission::Mission;
use crate::core::mission_holder::{MissionHolder, ReadyMission};
use crate::core::wake::{StopReason, WakeSignal};
use crate::core::{
    normalize_items, BoardError, Item, MissionId, MissionSnapshot, MissionSpec, MissionStatus,
    SergeantId,
};

/// Why a mission could not be claimed by a sergeant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimRefusal {
    /// No such mission.
    #[error("unknown mission")]
    Unknown,
    /// The mission has been handed off as many times as its duration allows.
    #[error("dispatch budget exhausted")]
    Exhausted,
    /// Another sergeant already owns the mission.
    #[error("already bound to {0}")]
    ClaimedBy(SergeantId),
}

/// One work cycle of a mission, as handed to a sergeant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    /// Mission id.
    pub id: MissionId,
    /// Mission name.
    pub name: String,
    /// Items to borrow for the cycle.
    pub items: Vec<Item>,
    /// Whether this is the mission's first hand-off.
    pub first: bool,
}

/// A DONE mission and who finished it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedMission {
    /// Mission id.
    pub id: MissionId,
    /// Mission name.
    pub name: String,
    /// Sergeant bound to the mission.
    pub completed_by: Option<SergeantId>,
}

/// A mission that is not DONE yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMission {
    /// Mission id.
    pub id: MissionId,
    /// Mission name.
    pub name: String,
    /// Derived status.
    pub status: MissionStatus,
    /// Work hours still to be reported.
    pub remaining: i64,
    /// Names of unresolved prerequisites.
    pub prerequisites: Vec<String>,
}

#[derive(Debug, Default)]
struct BoardState {
    missions: Vec<Mission>,
    by_name: HashMap<String, MissionId>,
}

impl BoardState {
    fn get(&self, id: MissionId) -> Option<&Mission> {
        self.missions.get(id.0)
    }

    fn get_mut(&mut self, id: MissionId) -> Option<&mut Mission> {
        self.missions.get_mut(id.0)
    }

    fn all_complete(&self) -> bool {
        self.missions
            .iter()
            .all(|m| m.status() == MissionStatus::Done)
    }
}

/// Mission registry.
pub struct Board {
    state: Mutex<BoardState>,
    holder: Arc<MissionHolder>,
    signal: Arc<WakeSignal>,
    audit: SharedAuditSink,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("missions", &self.len())
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl Board {
    /// Create an empty board with its own readiness index and wake signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BoardState::default()),
            holder: Arc::new(MissionHolder::new()),
            signal: Arc::new(WakeSignal::new()),
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn audit::AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Readiness index fed by this board.
    #[must_use]
    pub fn holder(&self) -> Arc<MissionHolder> {
        Arc::clone(&self.holder)
    }

    /// Wake signal of the scheduler attached to this board.
    #[must_use]
    pub fn signal(&self) -> Arc<WakeSignal> {
        Arc::clone(&self.signal)
    }

    /// Create a mission and wake the scheduler.
    ///
    /// Prerequisites that are already DONE are not recorded.
    ///
    /// # Errors
    ///
    /// - `BoardError::InvalidMission` for an empty name or skill, a zero
    ///   duration, or item amounts that overflow when merged
    /// - `BoardError::DuplicateMission` if the name is taken
    /// - `BoardError::UnknownPrerequisite` if a prerequisite id is not on this board
    pub fn create_mission(&self, mut spec: MissionSpec) -> Result<MissionId, BoardError> {
        let invalid = |reason: &str| BoardError::InvalidMission {
            name: spec.name.clone(),
            reason: reason.to_string(),
        };
        if spec.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if spec.skill.trim().is_empty() {
            return Err(invalid("skill is empty"));
        }
        if spec.duration == 0 {
            return Err(invalid("duration must be greater than 0"));
        }
        spec.items = normalize_items(std::mem::take(&mut spec.items))
            .map_err(|e| invalid(&e.to_string()))?;

        let mut state = self.state.lock();
        if state.by_name.contains_key(&spec.name) {
            warn!(mission = %spec.name, "tried to add a duplicate mission");
            return Err(BoardError::DuplicateMission(spec.name));
        }

        let mut prerequisites = BTreeSet::new();
        for pre in &spec.prerequisites {
            let Some(mission) = state.get(*pre) else {
                warn!(mission = %spec.name, prerequisite = %pre, "tried to add a mission with a missing prerequisite");
                return Err(BoardError::UnknownPrerequisite(*pre));
            };
            if mission.status() != MissionStatus::Done {
                prerequisites.insert(*pre);
            }
        }

        let id = MissionId(state.missions.len());
        for pre in &prerequisites {
            if let Some(mission) = state.get_mut(*pre) {
                mission.dependents.insert(id);
            }
        }
        let name = spec.name.clone();
        state.missions.push(Mission::new(spec, prerequisites));
        state.by_name.insert(name.clone(), id);
        drop(state);

        debug!(mission = %name, id = %id, "mission created");
        self.signal.wake();
        Ok(id)
    }

    /// Look a mission up by name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<MissionId> {
        self.state.lock().by_name.get(name).copied()
    }

    /// Snapshot of one mission.
    #[must_use]
    pub fn mission(&self, id: MissionId) -> Option<MissionSnapshot> {
        let state = self.state.lock();
        state.get(id).map(|m| MissionSnapshot::from((id, m)))
    }

    /// Snapshot of every mission in creation order.
    #[must_use]
    pub fn missions(&self) -> Vec<MissionSnapshot> {
        let state = self.state.lock();
        state
            .missions
            .iter()
            .enumerate()
            .map(|(idx, m)| MissionSnapshot::from((MissionId(idx), m)))
            .collect()
    }

    /// Number of missions on the board.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().missions.len()
    }

    /// Whether the board has no missions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every mission is DONE.
    #[must_use]
    pub fn all_complete(&self) -> bool {
        self.state.lock().all_complete()
    }

    /// Missions with no unresolved prerequisites, FRESH, and not yet indexed.
    ///
    /// Returned missions are marked as indexed in the same step, so the
    /// caller must insert them into the readiness index.
    pub fn export_ready(&self) -> Vec<ReadyMission> {
        let mut state = self.state.lock();
        state
            .missions
            .iter_mut()
            .enumerate()
            .filter(|(_, m)| {
                m.prerequisites.is_empty() && !m.in_holder && m.status() == MissionStatus::Fresh
            })
            .map(|(idx, m)| {
                m.in_holder = true;
                ReadyMission {
                    id: MissionId(idx),
                    name: m.name.clone(),
                    skill: m.skill.clone(),
                    duration: m.initial_duration,
                    item_count: m.items.len(),
                }
            })
            .collect()
    }

    /// Bind `mission` to `sergeant` for one work cycle of `work_hours`.
    ///
    /// The binding is sticky: once set, only the same sergeant may claim again.
    pub(crate) fn claim(
        &self,
        mission: MissionId,
        sergeant: SergeantId,
        work_hours: u32,
    ) -> Result<Handoff, ClaimRefusal> {
        let mut state = self.state.lock();
        let m = state.get_mut(mission).ok_or(ClaimRefusal::Unknown)?;
        if !m.can_be_handed() {
            return Err(ClaimRefusal::Exhausted);
        }
        if let Some(owner) = m.assigned {
            if owner != sergeant {
                return Err(ClaimRefusal::ClaimedBy(owner));
            }
        }
        let first = m.dispatch_budget == i64::from(m.initial_duration);
        m.assigned = Some(sergeant);
        m.dispatch_budget -= i64::from(work_hours);
        Ok(Handoff {
            id: mission,
            name: m.name.clone(),
            items: m.items.clone(),
            first,
        })
    }

    /// Give back the budget taken by a claim whose hand-off was rejected.
    pub(crate) fn unclaim(&self, mission: MissionId, work_hours: u32) {
        let mut state = self.state.lock();
        if let Some(m) = state.get_mut(mission) {
            m.dispatch_budget += i64::from(work_hours);
        }
    }

    /// Record `amount` hours of finished work on `mission`.
    ///
    /// On the transition to DONE the mission is removed from every dependent's
    /// prerequisites and evicted from the readiness index. If that completes
    /// the whole board the scheduler is stopped; otherwise it is woken.
    ///
    /// # Errors
    ///
    /// `BoardError::UnknownMission` if the id is not on this board; nothing changes.
    pub fn report_work(&self, mission: MissionId, amount: u32) -> Result<MissionStatus, BoardError> {
        let mut state = self.state.lock();
        let Some(m) = state.get_mut(mission) else {
            warn!(mission = %mission, "tried to modify a missing mission");
            return Err(BoardError::UnknownMission(mission.to_string()));
        };
        if m.status() == MissionStatus::Done {
            warn!(mission = %m.name, "work reported on a mission that is already DONE");
            return Ok(MissionStatus::Done);
        }

        m.remaining -= i64::from(amount);
        let status = m.status();
        let name = m.name.clone();
        let evict = status == MissionStatus::Done;
        if evict {
            m.in_holder = false;
            let dependents = std::mem::take(&mut m.dependents);
            for dependent in dependents {
                if let Some(d) = state.get_mut(dependent) {
                    d.prerequisites.remove(&mission);
                }
            }
            info!(mission = %name, "mission DONE");
        }

        if state.all_complete() {
            info!("all objectives have been achieved");
            audit::record(&self.audit, || {
                build_audit_event("", None, DispatchAction::AllComplete, None)
            });
            self.signal.stop(StopReason::AllComplete);
        } else {
            self.signal.wake();
        }
        drop(state);

        if evict {
            self.holder.remove(mission);
        }
        Ok(status)
    }

    /// DONE missions and the sergeant bound to each.
    #[must_use]
    pub fn completed(&self) -> Vec<CompletedMission> {
        let state = self.state.lock();
        state
            .missions
            .iter()
            .enumerate()
            .filter(|(_, m)| m.status() == MissionStatus::Done)
            .map(|(idx, m)| CompletedMission {
                id: MissionId(idx),
                name: m.name.clone(),
                completed_by: m.assigned,
            })
            .collect()
    }

    /// Missions not DONE, with remaining time and unresolved prerequisite names.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingMission> {
        let state = self.state.lock();
        state
            .missions
            .iter()
            .enumerate()
            .filter(|(_, m)| m.status() != MissionStatus::Done)
            .map(|(idx, m)| PendingMission {
                id: MissionId(idx),
                name: m.name.clone(),
                status: m.status(),
                remaining: m.remaining,
                prerequisites: m
                    .prerequisites
                    .iter()
                    .filter_map(|p| state.get(*p).map(|pre| pre.name.clone()))
                    .collect(),
            })
            .collect()
    }

    /// Missions bound to `sergeant`, in creation order.
    #[must_use]
    pub fn assigned_to(&self, sergeant: SergeantId) -> Vec<MissionSnapshot> {
        let state = self.state.lock();
        state
            .missions
            .iter()
            .enumerate()
            .filter(|(_, m)| m.assigned == Some(sergeant))
            .map(|(idx, m)| MissionSnapshot::from((MissionId(idx), m)))
            .collect()
    }
}
