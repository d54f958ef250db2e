//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use mission_dispatch::builders::build_organization;
use mission_dispatch::config::{MissionConfig, OrganizationConfig, SergeantConfig, StockConfig};
use mission_dispatch::core::{DispatchAction, InMemoryAuditSink, SchedulerState, StopReason};

fn config() -> OrganizationConfig {
    let mut cfg = OrganizationConfig::from_json_str(r#"{ "runtime": { "time_unit_ms": 2 } }"#).unwrap();
    cfg.stock.push(StockConfig::new("shovel", 1));
    cfg.sergeants
        .push(SergeantConfig::new("rex").with_skill("dig").with_threads(1));
    cfg.missions.push(
        MissionConfig::new("well", "dig", 2)
            .with_item("shovel", 1)
            .with_prerequisite("survey"),
    );
    cfg.missions.push(MissionConfig::new("survey", "dig", 1));
    cfg
}

#[test]
fn test_build_organization_is_idle_until_started() {
    let org = build_organization(&config(), None).unwrap();
    assert_eq!(org.chief.state(), SchedulerState::Idle);
    assert_eq!(org.board.len(), 2);
    assert_eq!(org.chief.total_threads(), 1);
    org.chief.shutdown(Duration::from_secs(1));
}

#[test]
fn test_built_organization_runs_to_completion() {
    let journal = InMemoryAuditSink::new(100);
    let org = build_organization(&config(), Some(Arc::new(journal.clone()))).unwrap();
    org.chief.start().unwrap();
    assert_eq!(
        org.chief.await_stopped(Duration::from_secs(10)),
        Some(StopReason::AllComplete)
    );
    assert_eq!(journal.count(DispatchAction::Completed), 2);
    assert!(org.chief.shutdown(Duration::from_secs(1)).is_clean());
}

#[test]
fn test_duplicate_sergeant_in_config_is_refused() {
    let mut cfg = config();
    cfg.sergeants.push(SergeantConfig::new("rex").with_threads(1));
    assert!(build_organization(&cfg, None).is_err());
}
