//! Dispatch journal.
//!
//! Records mission lifecycle events (hand-offs, rejections, completion) so
//! operators and tests can reconstruct what the scheduler did.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::util::clock::now_ms;

/// What happened to a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    /// First hand-off of the mission to its sergeant.
    Started,
    /// A work cycle was accepted into a sergeant's backlog.
    Handed,
    /// The sergeant's backlog was full; the mission stays eligible.
    Rejected,
    /// A work cycle could not run (configuration fault).
    Failed,
    /// The mission reached DONE.
    Completed,
    /// Every mission on the board reached DONE.
    AllComplete,
    /// The scheduler was cancelled.
    Cancelled,
}

/// Journal entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Mission name, empty for board-wide events.
    pub mission: String,
    /// Sergeant involved, if any.
    pub sergeant: Option<String>,
    /// Action taken.
    pub action: DispatchAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// Bounded in-memory journal. Clones share the same buffer.
#[derive(Debug, Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Events for one mission, oldest first.
    #[must_use]
    pub fn events_for(&self, mission: &str) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.mission == mission)
            .cloned()
            .collect()
    }

    /// Number of events with the given action.
    #[must_use]
    pub fn count(&self, action: DispatchAction) -> usize {
        self.events.lock().iter().filter(|e| e.action == action).count()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Shared handle to an optional sink.
pub type SharedAuditSink = Option<Arc<dyn AuditSink>>;

/// Helper to build an audit event from context.
pub fn build_audit_event(
    mission: impl Into<String>,
    sergeant: Option<&str>,
    action: DispatchAction,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        mission: mission.into(),
        sergeant: sergeant.map(str::to_string),
        action,
        created_at_ms: now_ms(),
        detail,
    }
}

/// Record into `sink` if one is attached.
pub(crate) fn record(sink: &SharedAuditSink, event: impl FnOnce() -> AuditEvent) {
    if let Some(sink) = sink {
        sink.record(event());
    }
}
