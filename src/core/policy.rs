//! Sergeant priority policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::mission_holder::OrderKey;
use crate::core::DispatchError;

/// How a sergeant ranks candidate missions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityPolicy {
    /// Shortest initial duration first.
    #[serde(rename = "shortestMission")]
    ShortestMission,
    /// Longest initial duration first.
    #[serde(rename = "longestMission")]
    LongestMission,
    /// Fewest distinct items first.
    #[serde(rename = "minItems")]
    MinItems,
    /// Most distinct items first.
    #[serde(rename = "maxItems")]
    MaxItems,
}

impl PriorityPolicy {
    /// Every policy, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::ShortestMission,
        Self::LongestMission,
        Self::MinItems,
        Self::MaxItems,
    ];

    /// Readiness-index key and direction for this policy.
    #[must_use]
    pub const fn ordering(self) -> (OrderKey, bool) {
        match self {
            Self::ShortestMission => (OrderKey::Duration, false),
            Self::LongestMission => (OrderKey::Duration, true),
            Self::MinItems => (OrderKey::Items, false),
            Self::MaxItems => (OrderKey::Items, true),
        }
    }

    /// Wire name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShortestMission => "shortestMission",
            Self::LongestMission => "longestMission",
            Self::MinItems => "minItems",
            Self::MaxItems => "maxItems",
        }
    }
}

impl fmt::Display for PriorityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityPolicy {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == trimmed)
            .ok_or_else(|| {
                tracing::error!(policy = trimmed, "priority order is invalid");
                DispatchError::Config(format!("priority order \"{trimmed}\" is invalid"))
            })
    }
}
