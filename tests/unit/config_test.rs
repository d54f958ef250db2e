//! Tests for configuration validation

use mission_dispatch::config::{
    DispatchConfig, MissionConfig, OrganizationConfig, SergeantConfig, StockConfig,
    WorkerPoolConfig,
};
use mission_dispatch::core::PriorityPolicy;

#[test]
fn test_worker_pool_config_validation() {
    assert!(WorkerPoolConfig::new().validate().is_ok());
    assert!(WorkerPoolConfig::new().with_worker_count(0).validate().is_err());
    assert!(WorkerPoolConfig::new().with_max_queue_depth(0).validate().is_err());
    assert!(WorkerPoolConfig::new()
        .with_thread_stack_size(1024)
        .validate()
        .is_err());
}

#[test]
fn test_dispatch_config_defaults() {
    let cfg = DispatchConfig::default();
    assert_eq!(cfg.time_unit_ms, 1000);
    assert_eq!(cfg.shutdown_grace_ms, 60_000);
    assert_eq!(cfg.time_unit(), std::time::Duration::from_secs(1));
}

#[test]
fn test_dispatch_config_from_json_fills_defaults() {
    let cfg = DispatchConfig::from_json_str(r#"{ "time_unit_ms": 10 }"#).unwrap();
    assert_eq!(cfg.time_unit_ms, 10);
    assert_eq!(cfg.shutdown_grace_ms, 60_000);
    assert!(DispatchConfig::from_json_str("{ nope").is_err());
}

#[test]
fn test_sergeant_config_validation() {
    let valid = SergeantConfig::new("rex").with_skill("dig").with_threads(2);
    assert!(valid.validate().is_ok());
    assert!(valid.clone().with_max_missions(0).validate().is_err());
    assert!(valid.clone().with_threads(0).validate().is_err());
    assert!(SergeantConfig::new(" ").validate().is_err());
}

#[test]
fn test_sergeant_threads_default_to_cpu_count() {
    let cfg: SergeantConfig = serde_json::from_str(
        r#"{ "name": "rex", "max_missions": 1, "work_hours": 1, "priority": "minItems" }"#,
    )
    .unwrap();
    assert_eq!(cfg.threads, num_cpus::get());
    assert_eq!(cfg.priority, PriorityPolicy::MinItems);
    assert!(cfg.skills.is_empty());
}

#[test]
fn test_organization_duplicates_are_rejected() {
    let cfg = OrganizationConfig {
        stock: vec![StockConfig::new("rope", 1), StockConfig::new("rope", 2)],
        ..OrganizationConfig::default()
    };
    assert!(cfg.validate().unwrap_err().contains("duplicate stock"));

    let cfg = OrganizationConfig {
        missions: vec![MissionConfig::new("a", "dig", 1), MissionConfig::new("a", "dig", 2)],
        ..OrganizationConfig::default()
    };
    assert!(cfg.validate().unwrap_err().contains("duplicate mission"));
}

#[test]
fn test_organization_self_dependency_is_a_cycle() {
    let cfg = OrganizationConfig {
        missions: vec![MissionConfig::new("a", "dig", 1).with_prerequisite("a")],
        ..OrganizationConfig::default()
    };
    assert!(cfg.validate().unwrap_err().contains("cycle"));
}
