//! Builders to construct an organization from configuration.

pub mod organization;

pub use organization::{build_organization, Organization};
