//! Worker pool and runtime configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wall time of one simulated work hour.
pub const DEFAULT_TIME_UNIT_MS: u64 = 1000;
/// Default grace period granted to running units at shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 60_000;
/// Default stack size of pool threads.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Configuration of one fixed-width worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Prefix for thread names.
    pub name: String,
    /// Number of dedicated threads.
    pub worker_count: usize,
    /// Backlog capacity; submissions beyond it are rejected.
    pub max_queue_depth: usize,
    /// Stack size of each thread in bytes.
    pub thread_stack_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".into(),
            worker_count: 1,
            max_queue_depth: 1,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl WorkerPoolConfig {
    /// Start from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread-name prefix.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the number of threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the backlog capacity.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, max_queue_depth: usize) -> Self {
        self.max_queue_depth = max_queue_depth;
        self
    }

    /// Set the per-thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}

/// Runtime knobs shared by every component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Wall-clock milliseconds per simulated work hour.
    pub time_unit_ms: u64,
    /// Grace period for running units at shutdown, applied twice at most.
    pub shutdown_grace_ms: u64,
    /// Stack size of sergeant pool threads.
    pub thread_stack_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: DEFAULT_TIME_UNIT_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl DispatchConfig {
    /// Set the wall time of one work hour.
    #[must_use]
    pub const fn with_time_unit_ms(mut self, time_unit_ms: u64) -> Self {
        self.time_unit_ms = time_unit_ms;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub const fn with_shutdown_grace_ms(mut self, shutdown_grace_ms: u64) -> Self {
        self.shutdown_grace_ms = shutdown_grace_ms;
        self
    }

    /// Wall time of one work hour.
    #[must_use]
    pub const fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    /// Shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Validate runtime values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }

    /// Parse runtime configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns the parse or validation error as text.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `DISPATCH_TIME_UNIT_MS` and
    /// `DISPATCH_SHUTDOWN_GRACE_MS`, after loading a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but not a number.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(v) = env_u64("DISPATCH_TIME_UNIT_MS")? {
            cfg.time_unit_ms = v;
        }
        if let Some(v) = env_u64("DISPATCH_SHUTDOWN_GRACE_MS")? {
            cfg.shutdown_grace_ms = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_u64(key: &str) -> Result<Option<u64>, String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(_) => Ok(None),
    }
}
