//! Mission and item value types plus the per-mission scheduling record.
//!
//! Missions live in the board's arena and are addressed by [`MissionId`].
//! Dependency and assignment edges are stored as identifiers, never as
//! references, so the board can own the whole graph.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::WarehouseError;

/// Stable identifier of a mission inside its board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MissionId(pub usize);

impl fmt::Display for MissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m#{}", self.0)
    }
}

/// Stable identifier of a sergeant, assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SergeantId(pub usize);

impl fmt::Display for SergeantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sgt#{}", self.0)
    }
}

/// Quantity of a named warehouse item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item name as known to the warehouse.
    pub name: String,
    /// Units required.
    pub amount: u32,
}

impl Item {
    /// Create an item requirement.
    pub fn new(name: impl Into<String>, amount: u32) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// Sort requirements by name and merge repeated names by summing amounts.
///
/// # Errors
///
/// `WarehouseError::Overflow` if the merged amount of a name exceeds `u32::MAX`.
pub fn normalize_items(items: Vec<Item>) -> Result<Vec<Item>, WarehouseError> {
    let mut sorted = items;
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    let mut merged: Vec<Item> = Vec::with_capacity(sorted.len());
    for item in sorted {
        match merged.last_mut() {
            Some(last) if last.name == item.name => {
                last.amount = last
                    .amount
                    .checked_add(item.amount)
                    .ok_or_else(|| WarehouseError::Overflow(item.name))?;
            }
            _ => merged.push(item),
        }
    }
    Ok(merged)
}

/// Derived progress of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    /// No work has been reported yet.
    Fresh,
    /// Some but not all work has been reported.
    InProgress,
    /// All work has been reported.
    Done,
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fresh => "FRESH",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        };
        f.write_str(label)
    }
}

/// Everything needed to create a mission on a board.
#[derive(Debug, Clone)]
pub struct MissionSpec {
    /// Unique mission name.
    pub name: String,
    /// Skill a sergeant must have to take the mission.
    pub skill: String,
    /// Total work hours.
    pub duration: u32,
    /// Items borrowed for every work cycle.
    pub items: Vec<Item>,
    /// Missions that must be DONE first.
    pub prerequisites: Vec<MissionId>,
}

impl MissionSpec {
    /// Start a spec with no items and no prerequisites.
    pub fn new(name: impl Into<String>, skill: impl Into<String>, duration: u32) -> Self {
        Self {
            name: name.into(),
            skill: skill.into(),
            duration,
            items: Vec::new(),
            prerequisites: Vec::new(),
        }
    }

    /// Add an item requirement.
    #[must_use]
    pub fn with_item(mut self, name: impl Into<String>, amount: u32) -> Self {
        self.items.push(Item::new(name, amount));
        self
    }

    /// Add a prerequisite mission.
    #[must_use]
    pub fn with_prerequisite(mut self, id: MissionId) -> Self {
        self.prerequisites.push(id);
        self
    }
}

/// Board-owned mission record.
#[derive(Debug)]
pub(crate) struct Mission {
    pub(crate) name: String,
    pub(crate) skill: String,
    pub(crate) items: Vec<Item>,
    pub(crate) initial_duration: u32,
    pub(crate) remaining: i64,
    pub(crate) prerequisites: BTreeSet<MissionId>,
    pub(crate) dependents: BTreeSet<MissionId>,
    pub(crate) assigned: Option<SergeantId>,
    pub(crate) in_holder: bool,
    pub(crate) dispatch_budget: i64,
}

impl Mission {
    /// `spec.items` must already be normalized.
    pub(crate) fn new(spec: MissionSpec, prerequisites: BTreeSet<MissionId>) -> Self {
        Self {
            name: spec.name,
            skill: spec.skill,
            items: spec.items,
            initial_duration: spec.duration,
            remaining: i64::from(spec.duration),
            prerequisites,
            dependents: BTreeSet::new(),
            assigned: None,
            in_holder: false,
            dispatch_budget: i64::from(spec.duration),
        }
    }

    pub(crate) fn status(&self) -> MissionStatus {
        if self.remaining == i64::from(self.initial_duration) {
            MissionStatus::Fresh
        } else if self.remaining <= 0 {
            MissionStatus::Done
        } else {
            MissionStatus::InProgress
        }
    }

    pub(crate) fn can_be_handed(&self) -> bool {
        self.dispatch_budget > 0
    }
}

/// Point-in-time view of a mission for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionSnapshot {
    /// Identifier on the board.
    pub id: MissionId,
    /// Mission name.
    pub name: String,
    /// Required skill.
    pub skill: String,
    /// Requirements sorted by item name.
    pub items: Vec<Item>,
    /// Initial work hours.
    pub initial_duration: u32,
    /// Work hours still to be reported; may be negative once DONE.
    pub remaining: i64,
    /// Derived status.
    pub status: MissionStatus,
    /// Unresolved prerequisites.
    pub prerequisites: Vec<MissionId>,
    /// Sergeant bound to the mission, if any.
    pub assigned: Option<SergeantId>,
    /// Remaining hand-off allowance.
    pub dispatch_budget: i64,
    /// Whether the mission currently sits in the readiness index.
    pub in_readiness_index: bool,
}

impl From<(MissionId, &Mission)> for MissionSnapshot {
    fn from((id, mission): (MissionId, &Mission)) -> Self {
        Self {
            id,
            name: mission.name.clone(),
            skill: mission.skill.clone(),
            items: mission.items.clone(),
            initial_duration: mission.initial_duration,
            remaining: mission.remaining,
            status: mission.status(),
            prerequisites: mission.prerequisites.iter().copied().collect(),
            assigned: mission.assigned,
            dispatch_budget: mission.dispatch_budget,
            in_readiness_index: mission.in_holder,
        }
    }
}
