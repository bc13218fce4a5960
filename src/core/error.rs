//! Error types for dispatch operations.

use thiserror::Error;

use crate::util::serde::{PatientId, TenantCode};

/// Errors produced by dispatcher components and their collaborators.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The tenant registry could not list active tenants.
    #[error("tenant registry unavailable: {0}")]
    Registry(String),
    /// The waiting list of a tenant could not be read.
    #[error("waiting list unavailable for tenant {tenant}: {reason}")]
    WaitingList {
        /// Tenant whose waiting list failed.
        tenant: TenantCode,
        /// Backend-specific reason.
        reason: String,
    },
    /// The admission call for a patient failed.
    #[error("admission failed for patient {patient}: {reason}")]
    Admission {
        /// Patient whose admission failed.
        patient: PatientId,
        /// Backend-specific reason.
        reason: String,
    },
    /// A tenant's dispatch did not finish within the configured bound.
    #[error("dispatch for tenant {0} timed out")]
    ScanTimeout(TenantCode),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A room worker thread could not be spawned.
    #[error("failed to spawn room worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
    /// The dispatcher has been shut down.
    #[error("dispatcher has been shut down")]
    Shutdown,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
