//! Patient admission records and the collaborator seams the dispatcher consumes.
//!
//! The dispatcher owns none of the data it schedules. It reads snapshots from a
//! [`WaitingListSource`], asks a [`TenantRegistry`] which tenants exist, and
//! hands each patient to an [`AdmissionGateway`] exactly once per admission.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::DispatchError;
use crate::util::serde::{PatientId, Priority, TenantCode};

/// Wait status of a patient as reported by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaitStatus {
    /// Awaiting admission to a room.
    Waiting,
    /// Admitted and occupying a room.
    InRoom,
    /// Visit finished.
    Done,
}

/// Snapshot of a patient on a tenant's waiting list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    /// Unique patient identifier.
    pub id: PatientId,
    /// Status at the time the snapshot was taken.
    pub status: WaitStatus,
    /// Triage priority, carried through unchanged.
    #[serde(default)]
    pub priority: Priority,
    /// Arrival timestamp in milliseconds since epoch.
    pub arrived_at_ms: u128,
}

impl AdmissionRecord {
    /// A waiting record with normal priority.
    #[must_use]
    pub const fn waiting(id: PatientId, arrived_at_ms: u128) -> Self {
        Self {
            id,
            status: WaitStatus::Waiting,
            priority: Priority::Normal,
            arrived_at_ms,
        }
    }

    /// Replace the priority flag.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Whether the record is still awaiting admission.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.status == WaitStatus::Waiting
    }
}

/// Enumerates the tenants the supervisor should dispatch for.
#[async_trait]
pub trait TenantRegistry: Send + Sync + 'static {
    /// Codes of all currently active tenants.
    async fn active_tenants(&self) -> Result<Vec<TenantCode>, DispatchError>;
}

/// Read-only view of the patients awaiting admission for a tenant.
#[async_trait]
pub trait WaitingListSource: Send + Sync + 'static {
    /// Patients whose status is waiting, in the order they should be admitted.
    ///
    /// Must not have side effects on the source.
    async fn fetch_waiting(&self, tenant: &str) -> Result<Vec<AdmissionRecord>, DispatchError>;
}

/// Performs the state transition that moves a patient into a room.
///
/// Called from room worker threads. Implementations may block for as long as
/// the backend takes; the dispatcher imposes no timeout.
#[async_trait]
pub trait AdmissionGateway: Send + Sync + 'static {
    /// Admit `patient` of `tenant`.
    async fn admit(&self, tenant: &str, patient: PatientId) -> Result<(), DispatchError>;
}
