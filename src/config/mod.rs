//! Configuration models for the organization and its runtime.

pub mod organization;
pub mod pool;

pub use organization::{MissionConfig, OrganizationConfig, SergeantConfig, StockConfig};
pub use pool::{DispatchConfig, WorkerPoolConfig};
