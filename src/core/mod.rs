//! Core dispatch abstractions: board, readiness index, sergeants, warehouse
//! and the scheduler loop.

pub mod audit;
pub mod board;
pub mod chief;
pub mod error;
pub mod executor;
pub mod mission;
pub mod mission_holder;
pub mod policy;
pub mod sergeant;
pub mod wake;
pub mod warehouse;
pub mod worker_pool;

pub use audit::{
    build_audit_event, AuditEvent, AuditSink, DispatchAction, InMemoryAuditSink, SharedAuditSink,
};
pub use board::{Board, ClaimRefusal, CompletedMission, Handoff, PendingMission};
pub use chief::{ChiefOfStaff, DispatchPass, SchedulerState, ShutdownReport, Straggler};
pub use error::{AppResult, BoardError, DispatchError, WarehouseError};
pub use executor::{CancelToken, UnitExecutor, UnitOutcome};
pub use mission::{
    normalize_items, Item, MissionId, MissionSnapshot, MissionSpec, MissionStatus, SergeantId,
};
pub use mission_holder::{HolderView, MissionHolder, OrderKey, RankedIter, ReadyMission};
pub use policy::PriorityPolicy;
pub use sergeant::{AcceptError, Sergeant, SergeantReport};
pub use wake::{StopReason, WakeSignal};
pub use warehouse::{Loan, StockItem, StockSnapshot, Warehouse};
pub use worker_pool::{PoolError, PoolShutdownReport, PoolStats, WorkerPool};
