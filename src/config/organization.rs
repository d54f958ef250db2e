//! Organization configuration: missions, sergeants and warehouse stock.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::core::{Item, PriorityPolicy};

/// Configuration of one sergeant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SergeantConfig {
    /// Unique sergeant name.
    pub name: String,
    /// Skills the sergeant can staff.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Maximum missions accepted but not finished at any time.
    pub max_missions: usize,
    /// Hours of work per execution unit.
    pub work_hours: u32,
    /// Ranking used when picking candidate missions.
    pub priority: PriorityPolicy,
    /// Worker threads executing units in parallel.
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_threads() -> usize {
    num_cpus::get()
}

impl SergeantConfig {
    /// Start a sergeant with one mission slot, one work hour per unit,
    /// shortest-first ranking and one thread per CPU.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skills: Vec::new(),
            max_missions: 1,
            work_hours: 1,
            priority: PriorityPolicy::ShortestMission,
            threads: default_threads(),
        }
    }

    /// Add a skill.
    #[must_use]
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    /// Set the mission cap.
    #[must_use]
    pub const fn with_max_missions(mut self, max_missions: usize) -> Self {
        self.max_missions = max_missions;
        self
    }

    /// Set the hours per execution unit.
    #[must_use]
    pub const fn with_work_hours(mut self, work_hours: u32) -> Self {
        self.work_hours = work_hours;
        self
    }

    /// Set the ranking policy.
    #[must_use]
    pub const fn with_priority(mut self, priority: PriorityPolicy) -> Self {
        self.priority = priority;
        self
    }

    /// Set the thread count.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Backlog capacity of the sergeant's pool.
    #[must_use]
    pub const fn backlog_capacity(&self) -> usize {
        self.max_missions.saturating_mul(self.work_hours as usize)
    }

    /// Validate sergeant values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("sergeant name must not be empty".into());
        }
        if self.threads == 0 {
            return Err(format!("sergeant {}: threads must be greater than 0", self.name));
        }
        if self.max_missions == 0 {
            return Err(format!(
                "sergeant {}: max_missions must be greater than 0",
                self.name
            ));
        }
        if self.work_hours == 0 {
            return Err(format!(
                "sergeant {}: work_hours must be greater than 0",
                self.name
            ));
        }
        Ok(())
    }
}

/// Configuration of one mission, with prerequisites given by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionConfig {
    /// Unique mission name.
    pub name: String,
    /// Required skill.
    pub skill: String,
    /// Total work hours.
    pub duration: u32,
    /// Items borrowed for every work cycle.
    #[serde(default)]
    pub items: Vec<Item>,
    /// Names of missions that must be DONE first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl MissionConfig {
    /// Start a mission with no items and no prerequisites.
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

    /// Add a prerequisite by name.
    #[must_use]
    pub fn with_prerequisite(mut self, name: impl Into<String>) -> Self {
        self.prerequisites.push(name.into());
        self
    }
}

/// Initial stock of one warehouse item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockConfig {
    /// Item name.
    pub name: String,
    /// Units on the shelf.
    pub amount: u32,
}

impl StockConfig {
    /// Create a stock entry.
    pub fn new(name: impl Into<String>, amount: u32) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// Everything needed to bootstrap an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationConfig {
    /// Runtime knobs.
    pub runtime: DispatchConfig,
    /// Missions; order is irrelevant.
    pub missions: Vec<MissionConfig>,
    /// Sergeants in registration order.
    pub sergeants: Vec<SergeantConfig>,
    /// Warehouse stock.
    pub stock: Vec<StockConfig>,
}

impl OrganizationConfig {
    /// Validate names, references, values and the dependency graph.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.runtime.validate()?;

        let mut stock_names = HashSet::new();
        for stock in &self.stock {
            if stock.name.trim().is_empty() {
                return Err("stock item name must not be empty".into());
            }
            if !stock_names.insert(stock.name.as_str()) {
                return Err(format!("duplicate stock item: {}", stock.name));
            }
        }

        let mut sergeant_names = HashSet::new();
        for sergeant in &self.sergeants {
            sergeant.validate()?;
            if !sergeant_names.insert(sergeant.name.as_str()) {
                return Err(format!("duplicate sergeant: {}", sergeant.name));
            }
        }

        let mut mission_names = HashSet::new();
        for mission in &self.missions {
            if mission.name.trim().is_empty() {
                return Err("mission name must not be empty".into());
            }
            if mission.skill.trim().is_empty() {
                return Err(format!("mission {}: skill must not be empty", mission.name));
            }
            if mission.duration == 0 {
                return Err(format!(
                    "mission {}: duration must be greater than 0",
                    mission.name
                ));
            }
            if !mission_names.insert(mission.name.as_str()) {
                return Err(format!("duplicate mission: {}", mission.name));
            }
        }

        for mission in &self.missions {
            for pre in &mission.prerequisites {
                if !mission_names.contains(pre.as_str()) {
                    return Err(format!(
                        "mission {}: unknown prerequisite {pre}",
                        mission.name
                    ));
                }
            }
        }

        if let Some(name) = self.find_cycle() {
            return Err(format!("dependency cycle through mission {name}"));
        }
        Ok(())
    }

    /// Missions ordered so every prerequisite comes before its dependents.
    ///
    /// Ties keep configuration order. Missions on a cycle are left out, so
    /// call [`validate`](Self::validate) first.
    #[must_use]
    pub fn missions_in_dependency_order(&self) -> Vec<&MissionConfig> {
        let index: HashMap<&str, usize> = self
            .missions
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.name.as_str(), idx))
            .collect();
        let mut state = vec![Visit::New; self.missions.len()];
        let mut ordered = Vec::with_capacity(self.missions.len());
        for idx in 0..self.missions.len() {
            self.visit(idx, &index, &mut state, &mut ordered);
        }
        ordered
    }

    /// Parse organization configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns the parse or validation error as text.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn find_cycle(&self) -> Option<&str> {
        let index: HashMap<&str, usize> = self
            .missions
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.name.as_str(), idx))
            .collect();
        let mut state = vec![Visit::New; self.missions.len()];
        let mut scratch = Vec::new();
        (0..self.missions.len())
            .find(|&idx| self.visit(idx, &index, &mut state, &mut scratch))
            .map(|idx| self.missions[idx].name.as_str())
    }

    /// Post-order DFS. Returns `true` when a back edge is found.
    fn visit<'a>(
        &'a self,
        idx: usize,
        index: &HashMap<&str, usize>,
        state: &mut [Visit],
        ordered: &mut Vec<&'a MissionConfig>,
    ) -> bool {
        match state[idx] {
            Visit::Done => return false,
            Visit::InStack => return true,
            Visit::New => {}
        }
        state[idx] = Visit::InStack;
        let mission = &self.missions[idx];
        for pre in &mission.prerequisites {
            if let Some(&next) = index.get(pre.as_str()) {
                if self.visit(next, index, state, ordered) {
                    return true;
                }
            }
        }
        state[idx] = Visit::Done;
        ordered.push(mission);
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    InStack,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> OrganizationConfig {
        OrganizationConfig {
            missions: vec![
                MissionConfig::new("c", "dig", 1).with_prerequisite("b"),
                MissionConfig::new("a", "dig", 1),
                MissionConfig::new("b", "dig", 1).with_prerequisite("a"),
            ],
            sergeants: vec![SergeantConfig::new("rex").with_skill("dig").with_threads(1)],
            stock: vec![StockConfig::new("rope", 2)],
            ..OrganizationConfig::default()
        }
    }

    #[test]
    fn test_dependency_order_puts_prerequisites_first() {
        let cfg = chain();
        cfg.validate().unwrap();
        let names: Vec<_> = cfg
            .missions_in_dependency_order()
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut cfg = chain();
        cfg.missions[1].prerequisites.push("c".into());
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("cycle"), "{err}");
    }

    #[test]
    fn test_unknown_prerequisite_is_rejected() {
        let mut cfg = chain();
        cfg.missions[0].prerequisites.push("ghost".into());
        assert!(cfg.validate().unwrap_err().contains("unknown prerequisite"));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let mut cfg = chain();
        cfg.sergeants[0].work_hours = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = chain();
        cfg.missions[0].duration = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_json_parses_policy_wire_names() {
        let json = r#"{
            "runtime": { "time_unit_ms": 5 },
            "missions": [ { "name": "m", "skill": "dig", "duration": 2,
                            "items": [ { "name": "rope", "amount": 1 } ] } ],
            "sergeants": [ { "name": "rex", "skills": ["dig"], "max_missions": 2,
                             "work_hours": 1, "priority": "maxItems", "threads": 2 } ],
            "stock": [ { "name": "rope", "amount": 3 } ]
        }"#;
        let cfg = OrganizationConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.runtime.time_unit_ms, 5);
        assert_eq!(cfg.sergeants[0].priority, PriorityPolicy::MaxItems);
        assert_eq!(cfg.sergeants[0].backlog_capacity(), 2);
    }

    #[test]
    fn test_from_json_rejects_unknown_policy() {
        let json = r#"{ "sergeants": [ { "name": "rex", "max_missions": 1,
                        "work_hours": 1, "priority": "fastest" } ] }"#;
        assert!(OrganizationConfig::from_json_str(json).is_err());
    }
}
