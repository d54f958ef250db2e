//! Operator-facing runtime surface.

pub mod console;

pub use console::{Command, CompletedEntry, Console, ConsoleError, Reply};
