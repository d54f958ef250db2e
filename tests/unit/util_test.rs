//! Tests for utility functions

use mission_dispatch::util::{init_tracing, now_ms};

#[test]
fn test_now_ms_is_monotone_enough() {
    let first = now_ms();
    std::thread::sleep(std::time::Duration::from_millis(2));
    assert!(now_ms() >= first);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized twice without panicking");
}
