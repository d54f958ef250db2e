//! Tests for error types

use mission_dispatch::core::{BoardError, DispatchError, MissionId, PoolError, WarehouseError};

#[test]
fn test_duplicate_mission_error() {
    let err = BoardError::DuplicateMission("dig".to_string());
    assert_eq!(format!("{err}"), "mission `dig` already exists");
}

#[test]
fn test_unknown_prerequisite_error() {
    let err = BoardError::UnknownPrerequisite(MissionId(4));
    assert_eq!(format!("{err}"), "prerequisite m#4 doesn't exist");
}

#[test]
fn test_not_on_loan_error() {
    let err = WarehouseError::NotOnLoan {
        item: "rope".into(),
        borrower: "rex".into(),
        returned: 2,
        held: 1,
    };
    assert_eq!(format!("{err}"), "`rex` returned 2 of `rope` but holds 1");
}

#[test]
fn test_overflow_error() {
    let err = WarehouseError::Overflow("rope".into());
    assert_eq!(format!("{err}"), "amount of `rope` overflows");
}

#[test]
fn test_dispatch_error_wraps_transparently() {
    let err = DispatchError::from(WarehouseError::UnknownItem("torch".into()));
    assert_eq!(format!("{err}"), "item `torch` doesn't exist in the warehouse");

    let err = DispatchError::from(PoolError::QueueFull);
    assert_eq!(format!("{err}"), "task queue is full");
}

#[test]
fn test_config_error() {
    let err = DispatchError::Config("bad".to_string());
    assert_eq!(format!("{err}"), "configuration error: bad");
}
