//! Tests for the dispatch journal

use mission_dispatch::core::{build_audit_event, AuditSink, DispatchAction, InMemoryAuditSink};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);

    let event = build_audit_event(
        "dig-well",
        Some("rex"),
        DispatchAction::Handed,
        Some("cycle 1".to_string()),
    );

    sink.record(event);
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].mission, "dig-well");
    assert_eq!(events[0].sergeant.as_deref(), Some("rex"));
    assert_eq!(events[0].action, DispatchAction::Handed);
    assert!(events[0].created_at_ms > 0);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event("m1", None, DispatchAction::Started, None));
    sink.record(build_audit_event("m2", None, DispatchAction::Started, None));
    sink.record(build_audit_event("m3", None, DispatchAction::Completed, None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].mission, "m2"); // First one popped
    assert_eq!(events[1].mission, "m3");
}

#[test]
fn test_clones_share_one_journal() {
    let sink = InMemoryAuditSink::new(8);
    let other = sink.clone();
    other.record(build_audit_event("m1", Some("rex"), DispatchAction::Rejected, None));
    other.record(build_audit_event("m2", Some("rex"), DispatchAction::Handed, None));

    assert_eq!(sink.count(DispatchAction::Rejected), 1);
    assert_eq!(sink.events_for("m2").len(), 1);
}

#[test]
fn test_event_serializes_action_in_snake_case() {
    let event = build_audit_event("", None, DispatchAction::AllComplete, None);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "all_complete");
}
