//! Tests for error types

use ward_dispatch::core::DispatchError;

#[test]
fn test_error_display() {
    let err = DispatchError::Registry("connection refused".into());
    assert_eq!(err.to_string(), "tenant registry unavailable: connection refused");

    let err = DispatchError::WaitingList {
        tenant: "north".into(),
        reason: "timeout".into(),
    };
    assert_eq!(
        err.to_string(),
        "waiting list unavailable for tenant north: timeout"
    );

    let err = DispatchError::Admission {
        patient: 17,
        reason: "room locked".into(),
    };
    assert_eq!(err.to_string(), "admission failed for patient 17: room locked");

    let err = DispatchError::ScanTimeout("south".into());
    assert_eq!(err.to_string(), "dispatch for tenant south timed out");

    let err = DispatchError::InvalidConfig("room_capacity must be greater than 0".into());
    assert!(err.to_string().starts_with("invalid configuration:"));

    assert_eq!(
        DispatchError::Shutdown.to_string(),
        "dispatcher has been shut down"
    );
}

#[test]
fn test_worker_spawn_from_io_error() {
    let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads left");
    let err: DispatchError = io.into();
    assert!(matches!(err, DispatchError::WorkerSpawn(_)));
    assert_eq!(err.to_string(), "failed to spawn room worker: no threads left");
}

#[test]
fn test_error_converts_into_anyhow() {
    fn fails() -> ward_dispatch::core::AppResult<()> {
        Err(DispatchError::ScanTimeout("east".into()).into())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<DispatchError>().is_some());
}
