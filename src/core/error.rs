//! Error types for dispatch operations.

use thiserror::Error;

use crate::core::worker_pool::PoolError;
use crate::core::MissionId;

/// Errors produced by the mission board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// A mission with this name already exists.
    #[error("mission `{0}` already exists")]
    DuplicateMission(String),
    /// No mission is known under this name or id.
    #[error("mission `{0}` doesn't exist")]
    UnknownMission(String),
    /// A prerequisite id does not refer to a mission on this board.
    #[error("prerequisite {0} doesn't exist")]
    UnknownPrerequisite(MissionId),
    /// The mission definition itself is unusable.
    #[error("mission `{name}` is invalid: {reason}")]
    InvalidMission {
        /// Offending mission name.
        name: String,
        /// Why it was refused.
        reason: String,
    },
}

/// Errors produced by the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarehouseError {
    /// The item was never stocked.
    #[error("item `{0}` doesn't exist in the warehouse")]
    UnknownItem(String),
    /// The warehouse was closed while the caller waited.
    #[error("warehouse closed")]
    Closed,
    /// Adding the amount would exceed the largest representable quantity.
    #[error("amount of `{0}` overflows")]
    Overflow(String),
    /// A borrower tried to return more than it holds.
    #[error("`{borrower}` returned {returned} of `{item}` but holds {held}")]
    NotOnLoan {
        /// Item name.
        item: String,
        /// Borrower name.
        borrower: String,
        /// Units being returned.
        returned: u32,
        /// Units actually on loan.
        held: u32,
    },
}

/// Top-level error for the dispatch system.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Configuration is malformed or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
    /// A sergeant with this name is already registered.
    #[error("sergeant `{0}` already exists")]
    DuplicateSergeant(String),
    /// The scheduler loop is already running or has stopped.
    #[error("scheduler already started")]
    AlreadyStarted,
    /// Board failure.
    #[error(transparent)]
    Board(#[from] BoardError),
    /// Warehouse failure.
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
    /// Worker pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// The scheduler thread could not be spawned.
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
