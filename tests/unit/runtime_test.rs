//! Tests for the operator console

use std::time::Duration;

use mission_dispatch::builders::build_organization;
use mission_dispatch::config::{DispatchConfig, OrganizationConfig, SergeantConfig};
use mission_dispatch::core::{DispatchError, MissionStatus, StopReason, WarehouseError};
use mission_dispatch::runtime::{CompletedEntry, Console, ConsoleError, Reply};

fn console() -> Console {
    let cfg = OrganizationConfig {
        sergeants: vec![SergeantConfig::new("rex").with_skill("dig").with_threads(1)],
        ..OrganizationConfig::default()
    };
    let org = build_organization(&cfg, None).unwrap();
    Console::new(org, Duration::from_secs(1))
}

#[test]
fn test_add_item_then_list_warehouse() {
    let console = console();
    let reply = console.execute_line("addItem rope 3").unwrap();
    assert_eq!(
        reply,
        Reply::ItemAdded {
            name: "rope".into(),
            amount: 3
        }
    );
    let Reply::Stock(items) = console.execute_line("warehouse").unwrap() else {
        panic!("expected stock listing");
    };
    assert_eq!(items[0].name, "rope");
    assert_eq!(items[0].available, 3);
    console.execute_line("stop").unwrap();
}

#[test]
fn test_add_item_overflow_leaves_stock_unchanged() {
    let console = console();
    console.execute_line("addItem x 4294967295").unwrap();
    let err = console.execute_line("addItem x 4294967295").unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::Dispatch(DispatchError::Warehouse(WarehouseError::Overflow(_)))
    ));
    let Reply::Stock(items) = console.execute_line("warehouse").unwrap() else {
        panic!("expected stock listing");
    };
    assert_eq!(items[0].initial, u32::MAX);
    assert_eq!(items[0].available, u32::MAX);
    console.execute_line("stop").unwrap();
}

#[test]
fn test_add_mission_resolves_prerequisites_by_name() {
    let console = console();
    console.execute_line("addMission survey dig 1, ,").unwrap();
    console
        .execute_line("addMission well dig 2, shovel 1, survey")
        .unwrap();

    let Reply::Incomplete(pending) = console.execute_line("incompleteMissions").unwrap() else {
        panic!("expected incomplete listing");
    };
    assert_eq!(pending.len(), 2);
    let well = pending.iter().find(|m| m.name == "well").unwrap();
    assert_eq!(well.prerequisites, vec!["survey".to_string()]);
    assert_eq!(well.status, MissionStatus::Fresh);
    assert!(format!("{}", Reply::Incomplete(pending.clone())).contains("waiting for survey"));
    console.execute_line("stop").unwrap();
}

#[test]
fn test_add_mission_with_unknown_prerequisite_fails() {
    let console = console();
    let err = console
        .execute_line("addMission well dig 2, , ghost")
        .unwrap_err();
    assert!(matches!(err, ConsoleError::Dispatch(DispatchError::Board(_))));
    let Reply::Incomplete(pending) = console.execute_line("incompleteMissions").unwrap() else {
        panic!("expected incomplete listing");
    };
    assert!(pending.is_empty());
    console.execute_line("stop").unwrap();
}

#[test]
fn test_add_sergeant_and_list_roster() {
    let console = console();
    console
        .execute_line("addSergeant ace 1 2, haul, 3 maxItems")
        .unwrap();
    let err = console
        .execute_line("addSergeant ace 1 2, haul, 3 maxItems")
        .unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::Dispatch(DispatchError::DuplicateSergeant(_))
    ));

    let reply = console.execute_line("sergeants").unwrap();
    let Reply::Sergeants(roster) = &reply else {
        panic!("expected roster");
    };
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[1].name, "ace");
    assert!(reply.to_string().contains("maxItems"));
    console.execute_line("stop").unwrap();
}

#[test]
fn test_stop_reports_cancelled_shutdown() {
    let console = console();
    let Reply::Stopped(report) = console.execute_line("stop").unwrap() else {
        panic!("expected shutdown report");
    };
    assert_eq!(report.reason, Some(StopReason::Cancelled));
    assert!(report.is_clean());
}

#[test]
fn test_complete_missions_names_the_sergeant() {
    let cfg = OrganizationConfig {
        runtime: DispatchConfig::default().with_time_unit_ms(1),
        sergeants: vec![SergeantConfig::new("rex").with_skill("dig").with_threads(1)],
        ..OrganizationConfig::default()
    };
    let org = build_organization(&cfg, None).unwrap();
    let chief = org.chief.clone();
    let console = Console::new(org, Duration::from_secs(1));
    chief.start().unwrap();

    console.execute_line("addMission m dig 2, ,").unwrap();
    assert_eq!(
        chief.await_stopped(Duration::from_secs(10)),
        Some(StopReason::AllComplete)
    );
    let Reply::Completed(done) = console.execute_line("completeMissions").unwrap() else {
        panic!("expected completed listing");
    };
    assert_eq!(
        done,
        vec![CompletedEntry {
            mission: "m".into(),
            sergeant: Some("rex".into()),
        }]
    );
    console.execute_line("stop").unwrap();
}
