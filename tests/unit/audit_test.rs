//! Tests for audit sink

use ward_dispatch::core::{build_audit_event, AuditSink, DispatchAction, InMemoryAuditSink};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);

    sink.record(build_audit_event(
        "north",
        Some(4),
        DispatchAction::AdmissionFailed,
        Some("room locked".to_string()),
    ));

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tenant, "north");
    assert_eq!(events[0].patient_id, Some(4));
    assert_eq!(events[0].action, DispatchAction::AdmissionFailed);
    assert_eq!(events[0].detail.as_deref(), Some("room locked"));
    assert!(!events[0].event_id.is_empty());
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);

    for patient in 1..=3 {
        sink.record(build_audit_event("north", Some(patient), DispatchAction::Enqueued, None));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].patient_id, Some(2)); // First one popped
    assert_eq!(events[1].patient_id, Some(3));
}

#[test]
fn test_zero_capacity_sink_records_nothing() {
    let sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event("north", None, DispatchAction::TenantStarted, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_patients_with_filters_tenant_and_action() {
    let sink = InMemoryAuditSink::new(100);
    sink.record(build_audit_event("north", Some(1), DispatchAction::Enqueued, None));
    sink.record(build_audit_event("south", Some(2), DispatchAction::Enqueued, None));
    sink.record(build_audit_event("north", Some(3), DispatchAction::Enqueued, None));
    sink.record(build_audit_event("north", Some(1), DispatchAction::Admitted, None));
    sink.record(build_audit_event("north", None, DispatchAction::TenantStarted, None));

    assert_eq!(sink.patients_with("north", DispatchAction::Enqueued), vec![1, 3]);
    assert_eq!(sink.patients_with("north", DispatchAction::Admitted), vec![1]);
    assert!(sink.patients_with("north", DispatchAction::TenantStarted).is_empty());
}

#[test]
fn test_event_ids_are_unique() {
    let a = build_audit_event("north", None, DispatchAction::ScanFailed, None);
    let b = build_audit_event("north", None, DispatchAction::ScanFailed, None);
    assert_ne!(a.event_id, b.event_id);
}

#[test]
fn test_action_serializes_snake_case() {
    let event = build_audit_event("north", Some(9), DispatchAction::CapacityRace, None);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "capacity_race");
    assert_eq!(json["patient_id"], 9);
}
