//! Tests for configuration parsing and validation

use std::time::Duration;

use ward_dispatch::config::DispatchConfig;

#[test]
fn test_config_from_json() {
    let cfg = DispatchConfig::from_json_str(
        r#"{
            "room_capacity": 3,
            "poll_interval_ms": 1000,
            "tenant_scan_timeout_ms": 4000,
            "capacity_retry_delay_ms": 50,
            "admission_retry_cooldown_ms": 0,
            "worker_join_timeout_ms": 750,
            "worker_stack_size": 131072,
            "retire_inactive_tenants": false
        }"#,
    )
    .unwrap();

    assert_eq!(cfg.room_capacity, 3);
    assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
    assert_eq!(cfg.tenant_scan_timeout(), Duration::from_secs(4));
    assert_eq!(cfg.capacity_retry_delay(), Duration::from_millis(50));
    assert_eq!(cfg.admission_retry_cooldown(), Duration::ZERO);
    assert_eq!(cfg.worker_join_timeout(), Duration::from_millis(750));
    assert_eq!(cfg.worker_stack_size, 131_072);
    assert!(!cfg.retire_inactive_tenants);
}

#[test]
fn test_partial_json_uses_defaults() {
    let cfg = DispatchConfig::from_json_str(r#"{"room_capacity": 8}"#).unwrap();
    assert_eq!(cfg.room_capacity, 8);
    assert_eq!(
        cfg,
        DispatchConfig::default().with_room_capacity(8)
    );
}

#[test]
fn test_json_rejects_invalid_values() {
    assert!(DispatchConfig::from_json_str(r#"{"room_capacity": 0}"#).is_err());
    assert!(DispatchConfig::from_json_str(r#"{"poll_interval_ms": 0}"#).is_err());
    assert!(DispatchConfig::from_json_str(r#"{"tenant_scan_timeout_ms": 0}"#).is_err());

    let err = DispatchConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_config_serializes_back() {
    let cfg = DispatchConfig::default().with_room_capacity(4);
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("\"room_capacity\":4"));
}

// Only test in this binary that touches DISPATCH_* variables.
#[test]
fn test_config_from_env() {
    std::env::set_var("DISPATCH_ROOM_CAPACITY", "7");
    std::env::set_var("DISPATCH_POLL_INTERVAL_MS", " 250 ");
    std::env::set_var("DISPATCH_RETIRE_INACTIVE_TENANTS", "false");

    let cfg = DispatchConfig::from_env().unwrap();
    assert_eq!(cfg.room_capacity, 7);
    assert_eq!(cfg.poll_interval(), Duration::from_millis(250));
    assert!(!cfg.retire_inactive_tenants);

    std::env::set_var("DISPATCH_ROOM_CAPACITY", "many");
    let err = DispatchConfig::from_env().unwrap_err();
    assert!(format!("{err:#}").contains("DISPATCH_ROOM_CAPACITY"));

    std::env::set_var("DISPATCH_ROOM_CAPACITY", "0");
    let err = DispatchConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("room_capacity"));

    std::env::remove_var("DISPATCH_ROOM_CAPACITY");
    std::env::remove_var("DISPATCH_POLL_INTERVAL_MS");
    std::env::remove_var("DISPATCH_RETIRE_INACTIVE_TENANTS");
}
