//! Readiness index: the dually sorted set of dispatch-eligible missions.
//!
//! The holder keeps two vectors over the same missions, one ordered by
//! initial duration and one by the number of distinct items required. Both
//! orders are stable: a mission inserted with a key equal to existing ones
//! lands after them. Entries carry the immutable keys the scheduler needs
//! (duration, item count, skill) so a ranked walk never reaches into the
//! board for them.

use std::collections::HashSet;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::core::MissionId;

/// Ordering key of a ranked view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrderKey {
    /// Initial duration of the mission.
    Duration,
    /// Number of distinct item kinds the mission requires.
    Items,
}

/// A mission as seen by the readiness index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadyMission {
    /// Board identifier.
    pub id: MissionId,
    /// Mission name, for logging.
    pub name: String,
    /// Required skill.
    pub skill: String,
    /// Initial duration.
    pub duration: u32,
    /// Distinct item kinds required.
    pub item_count: usize,
}

impl ReadyMission {
    const fn key(&self, order: OrderKey) -> u64 {
        match order {
            OrderKey::Duration => self.duration as u64,
            OrderKey::Items => self.item_count as u64,
        }
    }
}

#[derive(Debug, Default)]
struct HolderState {
    by_duration: Vec<ReadyMission>,
    by_items: Vec<ReadyMission>,
    members: HashSet<MissionId>,
}

impl HolderState {
    fn sequence(&self, order: OrderKey) -> &[ReadyMission] {
        match order {
            OrderKey::Duration => &self.by_duration,
            OrderKey::Items => &self.by_items,
        }
    }
}

fn insert_sorted(list: &mut Vec<ReadyMission>, mission: ReadyMission, order: OrderKey) {
    let key = mission.key(order);
    let pos = list.partition_point(|m| m.key(order) <= key);
    list.insert(pos, mission);
}

/// Readiness index shared by the board and the scheduler.
#[derive(Debug, Default)]
pub struct MissionHolder {
    state: Mutex<HolderState>,
}

impl MissionHolder {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert missions into both orders. Missions already present are skipped.
    ///
    /// Returns how many were actually inserted.
    pub fn insert_missions(&self, missions: Vec<ReadyMission>) -> usize {
        let mut state = self.state.lock();
        let mut inserted = 0;
        for mission in missions {
            if !state.members.insert(mission.id) {
                continue;
            }
            insert_sorted(&mut state.by_duration, mission.clone(), OrderKey::Duration);
            insert_sorted(&mut state.by_items, mission, OrderKey::Items);
            inserted += 1;
        }
        inserted
    }

    /// Remove a mission from both orders. Returns whether it was present.
    pub fn remove(&self, id: MissionId) -> bool {
        let mut state = self.state.lock();
        if !state.members.remove(&id) {
            return false;
        }
        state.by_duration.retain(|m| m.id != id);
        state.by_items.retain(|m| m.id != id);
        true
    }

    /// Whether the mission is currently indexed.
    #[must_use]
    pub fn contains(&self, id: MissionId) -> bool {
        self.state.lock().members.contains(&id)
    }

    /// Number of indexed missions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().members.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock the index for a ranked walk. Inserts and removals wait until the
    /// returned view is dropped.
    pub fn view(&self) -> HolderView<'_> {
        HolderView {
            guard: self.state.lock(),
        }
    }

    /// Ids in the requested order, captured under the lock.
    #[must_use]
    pub fn ranked_ids(&self, order: OrderKey, descending: bool) -> Vec<MissionId> {
        self.view().ranked(order, descending).map(|m| m.id).collect()
    }
}

/// Exclusive view over the index. Ranked iterators borrow from it and can be
/// restarted any number of times while it is held.
pub struct HolderView<'a> {
    guard: MutexGuard<'a, HolderState>,
}

impl HolderView<'_> {
    /// Walk the missions in `order`, ascending or descending.
    pub fn ranked(&self, order: OrderKey, descending: bool) -> RankedIter<'_> {
        let seq = self.guard.sequence(order);
        RankedIter {
            inner: if descending {
                Box::new(seq.iter().rev())
            } else {
                Box::new(seq.iter())
            },
        }
    }

    /// Number of indexed missions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard.members.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard.members.is_empty()
    }
}

/// Iterator over a ranked view.
pub struct RankedIter<'a> {
    inner: Box<dyn Iterator<Item = &'a ReadyMission> + 'a>,
}

impl<'a> Iterator for RankedIter<'a> {
    type Item = &'a ReadyMission;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
