//! Room workers: one dedicated OS thread per room slot.
//!
//! Each worker has its own single-threaded tokio runtime, so a slow admission
//! call occupies one worker and one room without blocking the supervisor's
//! async runtime or the tenant's other rooms.
//!
//! Worker loop:
//! - park on the tenant condition variable while the queue is empty;
//! - pop the head patient and release the tenant lock;
//! - acquire a room, or requeue the patient at the head and back off;
//! - run the admission call;
//! - release the room and the in-flight entry, whatever the outcome.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::runtime::Runtime;
use tracing::{debug, error, info};

use crate::core::{AdmissionGateway, AdmissionRecord, DispatchError, TenantDispatchState};
use crate::util::serde::PatientId;

/// Releases the room and in-flight entry of a patient when dropped, so a
/// panicking or failing admission can never leak either.
struct RoomLease<'a> {
    state: &'a TenantDispatchState,
    patient: PatientId,
    failure: Option<String>,
}

impl<'a> RoomLease<'a> {
    fn new(state: &'a TenantDispatchState, patient: PatientId) -> Self {
        Self {
            state,
            patient,
            failure: Some("admission interrupted".to_owned()),
        }
    }

    fn settle(mut self, outcome: Result<(), String>) {
        self.failure = outcome.err();
    }
}

impl Drop for RoomLease<'_> {
    fn drop(&mut self) {
        self.state.finish(self.patient, self.failure.take());
    }
}

/// A long-lived worker bound to one room slot of a tenant.
pub struct RoomWorker {
    worker_id: usize,
    state: Arc<TenantDispatchState>,
    gateway: Arc<dyn AdmissionGateway>,
    retry_delay: Duration,
}

impl RoomWorker {
    /// Create a worker for `state`. Nothing runs until [`spawn`](Self::spawn).
    pub fn new(
        worker_id: usize,
        state: Arc<TenantDispatchState>,
        gateway: Arc<dyn AdmissionGateway>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            worker_id,
            state,
            gateway,
            retry_delay,
        }
    }

    /// Start the worker on a dedicated thread.
    ///
    /// The thread runs until the tenant state is shut down.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::WorkerSpawn` if the OS refuses the thread.
    pub fn spawn(self, stack_size: usize) -> Result<JoinHandle<()>, DispatchError> {
        let name = format!("room-{}-{}", self.state.tenant(), self.worker_id);
        let handle = thread::Builder::new()
            .name(name)
            .stack_size(stack_size)
            .spawn(move || self.run())?;
        Ok(handle)
    }

    fn run(self) {
        let tenant = self.state.tenant().to_owned();
        let worker_id = self.worker_id;

        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!(tenant = %tenant, worker_id, error = %e, "failed to create room worker runtime");
                return;
            }
        };
        debug!(tenant = %tenant, worker_id, "room worker started");

        while let Some(record) = self.state.next_patient() {
            if !self.state.rooms().try_acquire() {
                self.state.requeue_front(record);
                thread::sleep(self.retry_delay);
                continue;
            }

            let lease = RoomLease::new(&self.state, record.id);
            match self.admit(&rt, &record) {
                Ok(()) => {
                    info!(tenant = %tenant, worker_id, patient = record.id, "patient admitted");
                    lease.settle(Ok(()));
                }
                Err(e) => {
                    error!(
                        tenant = %tenant,
                        worker_id,
                        patient = record.id,
                        error = %e,
                        "admission failed; patient released for a later scan"
                    );
                    lease.settle(Err(e.to_string()));
                }
            }
        }

        debug!(tenant = %tenant, worker_id, "room worker exiting");
    }

    /// Run the admission call on this worker's runtime.
    ///
    /// The call runs as its own task so a panic inside the gateway surfaces as a
    /// failed admission instead of unwinding the worker.
    fn admit(&self, rt: &Runtime, record: &AdmissionRecord) -> Result<(), DispatchError> {
        let gateway = Arc::clone(&self.gateway);
        let tenant = self.state.tenant().to_owned();
        let patient = record.id;

        rt.block_on(async move {
            let call = tokio::spawn(async move { gateway.admit(&tenant, patient).await });
            match call.await {
                Ok(result) => result,
                Err(join_err) => Err(DispatchError::Admission {
                    patient,
                    reason: format!("admission call aborted: {join_err}"),
                }),
            }
        })
    }
}
