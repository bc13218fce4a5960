//! Intake scanning: feeding newly waiting patients into a tenant's queue.

use std::sync::Arc;

use tracing::debug;

use crate::core::{DispatchError, TenantDispatchState, WaitingListSource};

/// Reads a tenant's waiting list and enqueues as many patients as there are
/// free rooms for.
///
/// The fetch is a read-only query and runs without the tenant lock. Dedup
/// against the in-flight set and the capacity cap are applied in the same
/// critical section as the enqueue, so concurrent scans of one tenant can never
/// enqueue a patient twice. Patients whose admission finished while the fetch
/// was in progress are skipped, since the list may still show them waiting.
#[derive(Clone)]
pub struct IntakeScanner {
    source: Arc<dyn WaitingListSource>,
}

impl IntakeScanner {
    /// Create a scanner over `source`.
    pub fn new(source: Arc<dyn WaitingListSource>) -> Self {
        Self { source }
    }

    /// Scan once for `state`'s tenant. Returns how many patients were enqueued.
    ///
    /// # Errors
    ///
    /// Propagates the source's error; nothing is enqueued in that case.
    pub async fn scan(&self, state: &TenantDispatchState) -> Result<usize, DispatchError> {
        let epoch = state.completion_epoch();
        let candidates = self.source.fetch_waiting(state.tenant()).await?;
        let candidate_count = candidates.len();
        let free_slots = state.rooms().available_count();

        let enqueued = if free_slots == 0 || candidates.is_empty() {
            0
        } else {
            state.enqueue_snapshot(candidates, free_slots, epoch)
        };

        debug!(
            tenant = %state.tenant(),
            candidates = candidate_count,
            free_slots,
            enqueued,
            "intake scan finished"
        );
        Ok(enqueued)
    }
}
