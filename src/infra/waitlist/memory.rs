//! In-memory waiting list that also performs admissions.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::core::{AdmissionGateway, AdmissionRecord, DispatchError, WaitStatus, WaitingListSource};
use crate::util::serde::{PatientId, TenantCode};

/// Per-tenant waiting lists kept in arrival order.
///
/// Serves as both the [`WaitingListSource`] and the [`AdmissionGateway`]:
/// admitting a patient flips its status from waiting to in-room, so later
/// scans no longer return it.
#[derive(Debug, Default)]
pub struct InMemoryWaitlist {
    wards: RwLock<HashMap<TenantCode, Vec<AdmissionRecord>>>,
    admissions: Mutex<Vec<(TenantCode, PatientId)>>,
}

impl InMemoryWaitlist {
    /// Create an empty waitlist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patient arrival. A record with the same id replaces the
    /// previous one in place; returns `false` in that case.
    pub fn arrive(&self, tenant: &str, record: AdmissionRecord) -> bool {
        let mut wards = self.wards.write();
        let ward = wards.entry(tenant.to_owned()).or_default();
        if let Some(existing) = ward.iter_mut().find(|r| r.id == record.id) {
            *existing = record;
            return false;
        }
        ward.push(record);
        true
    }

    /// Current status of a patient.
    #[must_use]
    pub fn status(&self, tenant: &str, patient: PatientId) -> Option<WaitStatus> {
        self.wards
            .read()
            .get(tenant)
            .and_then(|ward| ward.iter().find(|r| r.id == patient))
            .map(|r| r.status)
    }

    /// Mark an in-room patient as done. Returns whether the transition happened.
    pub fn discharge(&self, tenant: &str, patient: PatientId) -> bool {
        let mut wards = self.wards.write();
        let Some(record) = wards
            .get_mut(tenant)
            .and_then(|ward| ward.iter_mut().find(|r| r.id == patient))
        else {
            return false;
        };
        if record.status != WaitStatus::InRoom {
            return false;
        }
        record.status = WaitStatus::Done;
        true
    }

    /// Admissions performed so far, in order.
    #[must_use]
    pub fn admissions(&self) -> Vec<(TenantCode, PatientId)> {
        self.admissions.lock().clone()
    }

    /// Patients admitted for `tenant`, in order.
    #[must_use]
    pub fn admitted(&self, tenant: &str) -> Vec<PatientId> {
        self.admissions
            .lock()
            .iter()
            .filter(|(t, _)| t == tenant)
            .map(|(_, p)| *p)
            .collect()
    }
}

#[async_trait]
impl WaitingListSource for InMemoryWaitlist {
    async fn fetch_waiting(&self, tenant: &str) -> Result<Vec<AdmissionRecord>, DispatchError> {
        Ok(self
            .wards
            .read()
            .get(tenant)
            .map(|ward| ward.iter().filter(|r| r.is_waiting()).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AdmissionGateway for InMemoryWaitlist {
    async fn admit(&self, tenant: &str, patient: PatientId) -> Result<(), DispatchError> {
        {
            let mut wards = self.wards.write();
            let record = wards
                .get_mut(tenant)
                .and_then(|ward| ward.iter_mut().find(|r| r.id == patient))
                .ok_or_else(|| DispatchError::Admission {
                    patient,
                    reason: format!("unknown patient for tenant {tenant}"),
                })?;
            if record.status != WaitStatus::Waiting {
                return Err(DispatchError::Admission {
                    patient,
                    reason: format!("patient is {:?}, not waiting", record.status),
                });
            }
            record.status = WaitStatus::InRoom;
        }
        self.admissions.lock().push((tenant.to_owned(), patient));
        Ok(())
    }
}
