//! Dispatch event trail.
//!
//! Every enqueue, admission and failure is logged through `tracing`; when an
//! [`AuditSink`] is attached the same events are also recorded as structured
//! [`AuditEvent`]s.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;
use crate::util::serde::{PatientId, TenantCode};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    /// Dispatch state and room workers were created for a tenant.
    TenantStarted,
    /// A patient was placed on the waiting queue.
    Enqueued,
    /// The admission call succeeded.
    Admitted,
    /// The admission call failed; the patient was released.
    AdmissionFailed,
    /// A worker found no free room and requeued its patient.
    CapacityRace,
    /// A tenant's dispatch failed or timed out.
    ScanFailed,
    /// A tenant's dispatch state was torn down.
    TenantRetired,
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Tenant the event belongs to.
    pub tenant: TenantCode,
    /// Patient involved, if any.
    pub patient_id: Option<PatientId>,
    /// Action taken.
    pub action: DispatchAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context such as an error message.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Patients of `tenant` that saw `action`, in recording order.
    #[must_use]
    pub fn patients_with(&self, tenant: &str, action: DispatchAction) -> Vec<PatientId> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.tenant == tenant && e.action == action)
            .filter_map(|e| e.patient_id)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    tenant: impl Into<TenantCode>,
    patient_id: Option<PatientId>,
    action: DispatchAction,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        tenant: tenant.into(),
        patient_id,
        action,
        created_at_ms: now_ms(),
        detail,
    }
}
