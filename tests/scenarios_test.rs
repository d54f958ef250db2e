//! End-to-end dispatch scenarios.
//!
//! These tests drive a real board, warehouse and scheduler with short work
//! hours and observe hand-offs through the dispatch journal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mission_dispatch::builders::{build_organization, Organization};
use mission_dispatch::config::{
    DispatchConfig, MissionConfig, OrganizationConfig, SergeantConfig, StockConfig,
};
use mission_dispatch::core::{
    AcceptError, Board, ChiefOfStaff, DispatchAction, InMemoryAuditSink, MissionSpec,
    MissionStatus, OrderKey, PoolError, PriorityPolicy, SergeantId, StopReason, Warehouse,
};

// ============================================================================
// HELPERS
// ============================================================================

const GRACE: Duration = Duration::from_secs(2);

fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn runtime(time_unit_ms: u64) -> DispatchConfig {
    DispatchConfig::default()
        .with_time_unit_ms(time_unit_ms)
        .with_shutdown_grace_ms(2_000)
}

fn setup(time_unit_ms: u64) -> (Arc<Board>, Arc<Warehouse>, Arc<ChiefOfStaff>, InMemoryAuditSink) {
    let journal = InMemoryAuditSink::new(10_000);
    let board = Arc::new(Board::new().with_audit(Arc::new(journal.clone())));
    let warehouse = Arc::new(Warehouse::new());
    let chief = Arc::new(ChiefOfStaff::new(
        Arc::clone(&board),
        Arc::clone(&warehouse),
        runtime(time_unit_ms),
        Some(Arc::new(journal.clone())),
    ));
    (board, warehouse, chief, journal)
}

fn handed_by(journal: &InMemoryAuditSink, mission: &str) -> Vec<String> {
    journal
        .events_for(mission)
        .into_iter()
        .filter(|e| e.action == DispatchAction::Handed)
        .filter_map(|e| e.sergeant)
        .collect()
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_single_mission_takes_two_cycles_and_completes_board() {
    let (board, warehouse, chief, journal) = setup(5);
    warehouse.add_stock("shovel", 1).unwrap();
    chief
        .add_sergeant(
            &SergeantConfig::new("W1")
                .with_skill("dig")
                .with_work_hours(2)
                .with_max_missions(1)
                .with_priority(PriorityPolicy::ShortestMission)
                .with_threads(1),
        )
        .unwrap();
    let m1 = board
        .create_mission(MissionSpec::new("M1", "dig", 4).with_item("shovel", 1))
        .unwrap();

    chief.start().unwrap();
    assert_eq!(
        chief.await_stopped(Duration::from_secs(10)),
        Some(StopReason::AllComplete)
    );

    let snapshot = board.mission(m1).unwrap();
    assert_eq!(snapshot.status, MissionStatus::Done);
    assert_eq!(snapshot.remaining, 0);
    assert_eq!(handed_by(&journal, "M1"), vec!["W1", "W1"]);
    assert_eq!(journal.count(DispatchAction::Started), 1);
    assert_eq!(journal.count(DispatchAction::AllComplete), 1);
    assert_eq!(warehouse.stock("shovel").unwrap().available, 1);

    let report = chief.shutdown(GRACE);
    assert!(report.is_clean());
    assert_eq!(report.reason, Some(StopReason::AllComplete));
}

#[test]
fn test_dependent_mission_hidden_until_prerequisite_done() {
    let (board, _warehouse, chief, _journal) = setup(20);
    chief
        .add_sergeant(&SergeantConfig::new("W1").with_skill("dig").with_threads(1))
        .unwrap();
    let m1 = board.create_mission(MissionSpec::new("M1", "dig", 1)).unwrap();
    let m2 = board
        .create_mission(MissionSpec::new("M2", "dig", 1).with_prerequisite(m1))
        .unwrap();
    let holder = board.holder();

    let pass = chief.dispatch_once();
    assert_eq!(pass.scanned, 1);
    assert_eq!(pass.handed, 1);
    for key in [OrderKey::Duration, OrderKey::Items] {
        for descending in [false, true] {
            assert!(!holder.ranked_ids(key, descending).contains(&m2));
        }
    }

    let sergeant = chief.sergeant("W1").unwrap();
    wait_for("M1 done and evicted", || {
        board.mission(m1).unwrap().status == MissionStatus::Done && !holder.contains(m1)
    });
    wait_for("W1 idle", || sergeant.stats().in_flight() == 0);
    assert!(board.mission(m2).unwrap().prerequisites.is_empty());

    let pass = chief.dispatch_once();
    assert_eq!(pass.scanned, 1);
    assert!(board.mission(m2).unwrap().in_readiness_index);
    assert_eq!(board.mission(m2).unwrap().assigned, Some(SergeantId(0)));
    chief.shutdown(GRACE);
}

#[test]
fn test_two_skilled_sergeants_only_one_binds() {
    let (board, warehouse, chief, journal) = setup(5);
    warehouse.add_stock("x", 0).unwrap();
    for name in ["first", "second"] {
        chief
            .add_sergeant(
                &SergeantConfig::new(name)
                    .with_skill("dig")
                    .with_max_missions(2)
                    .with_threads(2),
            )
            .unwrap();
    }
    let m = board
        .create_mission(MissionSpec::new("M", "dig", 1).with_item("x", 1))
        .unwrap();

    chief.start().unwrap();
    wait_for("M bound", || board.mission(m).unwrap().assigned.is_some());
    warehouse.add_stock("x", 1).unwrap();
    assert_eq!(
        chief.await_stopped(Duration::from_secs(10)),
        Some(StopReason::AllComplete)
    );

    assert_eq!(board.mission(m).unwrap().assigned, Some(SergeantId(0)));
    assert_eq!(handed_by(&journal, "M"), vec!["first"]);
    let roster = chief.roster();
    assert_eq!(roster[1].stats.submitted_tasks, 0);
    assert!(roster[1].missions.is_empty());
    chief.shutdown(GRACE);
}

#[test]
fn test_full_backlog_rejects_then_retries() {
    let (board, _warehouse, chief, journal) = setup(60);
    chief
        .add_sergeant(
            &SergeantConfig::new("W1")
                .with_skill("dig")
                .with_max_missions(1)
                .with_work_hours(1)
                .with_threads(1),
        )
        .unwrap();
    let m = board.create_mission(MissionSpec::new("M", "dig", 3)).unwrap();
    let sergeant = chief.sergeant("W1").unwrap();

    sergeant.accept(m).unwrap();
    wait_for("first cycle running", || sergeant.stats().active_tasks == 1);
    sergeant.accept(m).unwrap();
    assert_eq!(
        sergeant.accept(m),
        Err(AcceptError::Rejected(PoolError::QueueFull))
    );
    assert_eq!(board.mission(m).unwrap().dispatch_budget, 1);
    assert_eq!(journal.count(DispatchAction::Rejected), 1);

    chief.start().unwrap();
    assert_eq!(
        chief.await_stopped(Duration::from_secs(10)),
        Some(StopReason::AllComplete)
    );
    assert_eq!(handed_by(&journal, "M").len(), 3);
    assert_eq!(board.mission(m).unwrap().status, MissionStatus::Done);
    chief.shutdown(GRACE);
}

// ============================================================================
// INVARIANTS UNDER LOAD
// ============================================================================

#[test]
fn test_sticky_assignment_under_concurrent_sergeants() {
    let journal = InMemoryAuditSink::new(100_000);
    let mut cfg = OrganizationConfig {
        runtime: runtime(1),
        stock: vec![StockConfig::new("rope", 3), StockConfig::new("torch", 2)],
        ..OrganizationConfig::default()
    };
    for (idx, policy) in PriorityPolicy::ALL.into_iter().enumerate() {
        cfg.sergeants.push(
            SergeantConfig::new(format!("sgt-{idx}"))
                .with_skill("dig")
                .with_skill("haul")
                .with_max_missions(3)
                .with_work_hours(u32::try_from(idx % 2 + 1).unwrap())
                .with_priority(policy)
                .with_threads(2),
        );
    }
    for idx in 0..40u32 {
        let mut mission = MissionConfig::new(
            format!("m{idx}"),
            if idx % 2 == 0 { "dig" } else { "haul" },
            idx % 5 + 1,
        );
        if idx % 3 == 0 {
            mission = mission.with_item("rope", 1);
        }
        if idx % 4 == 0 {
            mission = mission.with_item("torch", 1);
        }
        if idx >= 10 && idx % 7 == 0 {
            mission = mission.with_prerequisite(format!("m{}", idx - 10));
        }
        cfg.missions.push(mission);
    }

    let Organization {
        board,
        warehouse,
        chief,
    } = build_organization(&cfg, Some(Arc::new(journal.clone()))).unwrap();
    chief.start().unwrap();
    assert_eq!(
        chief.await_stopped(Duration::from_secs(30)),
        Some(StopReason::AllComplete)
    );

    let mut owners: HashMap<String, String> = HashMap::new();
    for event in journal.events() {
        if event.action != DispatchAction::Handed {
            continue;
        }
        let sergeant = event.sergeant.unwrap();
        let owner = owners.entry(event.mission.clone()).or_insert_with(|| sergeant.clone());
        assert_eq!(*owner, sergeant, "mission {} handed to two sergeants", event.mission);
    }
    assert_eq!(owners.len(), 40);
    assert_eq!(board.completed().len(), 40);
    for stock in warehouse.snapshot() {
        assert_eq!(stock.available, stock.initial);
        assert!(stock.loans.is_empty());
    }
    assert!(chief.shutdown(GRACE).is_clean());
}

#[test]
fn test_readiness_index_never_holds_blocked_missions() {
    let (board, _warehouse, chief, _journal) = setup(3);
    chief
        .add_sergeant(
            &SergeantConfig::new("W1")
                .with_skill("dig")
                .with_max_missions(4)
                .with_threads(4),
        )
        .unwrap();
    // Diamond: a -> (b, c) -> d
    let a = board.create_mission(MissionSpec::new("a", "dig", 2)).unwrap();
    let b = board
        .create_mission(MissionSpec::new("b", "dig", 1).with_prerequisite(a))
        .unwrap();
    let c = board
        .create_mission(MissionSpec::new("c", "dig", 3).with_prerequisite(a))
        .unwrap();
    let d = board.create_mission(
        MissionSpec::new("d", "dig", 1)
            .with_prerequisite(b)
            .with_prerequisite(c),
    )
    .unwrap();
    let original: HashMap<_, Vec<_>> =
        HashMap::from([(a, vec![]), (b, vec![a]), (c, vec![a]), (d, vec![b, c])]);
    let holder = board.holder();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !board.all_complete() {
        assert!(Instant::now() < deadline, "board did not complete");
        chief.dispatch_once();
        for id in holder.ranked_ids(OrderKey::Duration, false) {
            for pre in &original[&id] {
                assert_eq!(
                    board.mission(*pre).unwrap().status,
                    MissionStatus::Done,
                    "{id} indexed before {pre} was done"
                );
            }
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    wait_for("index drained", || holder.is_empty());
    assert_eq!(chief.await_stopped(Duration::ZERO), Some(StopReason::AllComplete));
    chief.shutdown(GRACE);
}

#[test]
fn test_status_is_monotone_and_remaining_never_increases() {
    let (board, _warehouse, chief, _journal) = setup(2);
    chief
        .add_sergeant(
            &SergeantConfig::new("W1")
                .with_skill("dig")
                .with_work_hours(2)
                .with_max_missions(2)
                .with_threads(2),
        )
        .unwrap();
    board.create_mission(MissionSpec::new("long", "dig", 9)).unwrap();
    board.create_mission(MissionSpec::new("short", "dig", 3)).unwrap();
    chief.start().unwrap();

    let mut last: Vec<(MissionStatus, i64)> = vec![(MissionStatus::Fresh, 9), (MissionStatus::Fresh, 3)];
    while chief.await_stopped(Duration::from_millis(1)).is_none() {
        let snapshots = board.missions();
        assert_eq!(snapshots.len(), 2);
        for (snapshot, (status, remaining)) in snapshots.iter().zip(last.iter_mut()) {
            assert!(snapshot.status >= *status, "{} regressed", snapshot.name);
            assert!(snapshot.remaining <= *remaining, "{} grew", snapshot.name);
            *status = snapshot.status;
            *remaining = snapshot.remaining;
        }
    }
    for done in board.missions() {
        assert_eq!(done.status, MissionStatus::Done);
        assert_eq!(done.remaining, -1);
    }
    chief.shutdown(GRACE);
}

// ============================================================================
// SHUTDOWN
// ============================================================================

#[test]
fn test_shutdown_cancels_long_cycles_and_blocked_borrowers() {
    let (board, warehouse, chief, _journal) = setup(60_000);
    warehouse.add_stock("x", 0).unwrap();
    chief
        .add_sergeant(
            &SergeantConfig::new("W1")
                .with_skill("dig")
                .with_max_missions(2)
                .with_threads(2),
        )
        .unwrap();
    let sleeper = board.create_mission(MissionSpec::new("sleeper", "dig", 5)).unwrap();
    let blocked = board
        .create_mission(MissionSpec::new("blocked", "dig", 1).with_item("x", 1))
        .unwrap();

    chief.start().unwrap();
    wait_for("both bound", || {
        board.mission(sleeper).unwrap().assigned.is_some()
            && board.mission(blocked).unwrap().assigned.is_some()
    });
    wait_for("borrower waiting", || warehouse.stock("x").unwrap().waiting == 1);

    let started = Instant::now();
    let report = chief.shutdown(Duration::from_millis(100));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(report.forced);
    assert!(report.is_clean());
    assert_eq!(report.reason, Some(StopReason::Cancelled));
    assert_eq!(board.mission(sleeper).unwrap().status, MissionStatus::Fresh);
    assert_eq!(board.mission(blocked).unwrap().status, MissionStatus::Fresh);
    assert!(warehouse.is_closed());
}
