//! # Mission Dispatch
//!
//! A concurrent mission-dispatch simulator. Named missions with skill and
//! item requirements, durations and prerequisite missions are handed out to
//! sergeants, bounded worker agents with their own thread pools, by a single
//! scheduler loop (the chief of staff).
//!
//! ## Components
//!
//! - **Board**: the mission arena and dependency graph. Every mutation is
//!   serialized under one lock; the last completion stops the scheduler.
//! - **MissionHolder**: the readiness index, kept sorted by duration and by
//!   item count so each sergeant's priority policy is a ranked walk.
//! - **Sergeant**: accepts work cycles into a bounded backlog; backpressure
//!   is a rejection, never a block.
//! - **Warehouse**: a fair blocking allocator with per-item FIFO queues.
//! - **ChiefOfStaff**: `scan -> distribute -> suspend`, woken by new
//!   missions, new sergeants and completion reports.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mission_dispatch::config::{DispatchConfig, SergeantConfig};
//! use mission_dispatch::core::{Board, ChiefOfStaff, MissionSpec, Warehouse};
//!
//! let board = Arc::new(Board::new());
//! let warehouse = Arc::new(Warehouse::new());
//! warehouse.add_stock("shovel", 1)?;
//! let chief = Arc::new(ChiefOfStaff::new(
//!     Arc::clone(&board),
//!     warehouse,
//!     DispatchConfig::default().with_time_unit_ms(10),
//!     None,
//! ));
//! chief.add_sergeant(&SergeantConfig::new("rex").with_skill("dig").with_work_hours(2))?;
//! board.create_mission(MissionSpec::new("well", "dig", 4).with_item("shovel", 1))?;
//! chief.start()?;
//! chief.await_stopped(Duration::from_secs(5));
//! let report = chief.shutdown(Duration::from_secs(1));
//! ```
//!
//! For complete scenarios, see `tests/scenarios_test.rs`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core dispatch abstractions: board, readiness index, sergeants, warehouse, scheduler.
pub mod core;
/// Configuration models for the organization and its runtime.
pub mod config;
/// Builders to construct an organization from configuration.
pub mod builders;
/// Operator console.
pub mod runtime;
/// Shared utilities.
pub mod util;
