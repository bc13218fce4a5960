//! Per-tenant dispatch state.
//!
//! One [`TenantDispatchState`] exists per tenant. It bundles the waiting queue
//! and the in-flight set behind a single coarse lock, the condition variable
//! idle room workers park on, and the tenant's [`RoomCapacityManager`].
//!
//! Locking discipline:
//! - the waiting queue and the in-flight set only change under the tenant lock,
//!   and always together;
//! - room acquisition and release go through the capacity manager's atomics and
//!   never need the tenant lock, so admission calls run with the lock released.
//!
//! Invariant: a patient id is in the in-flight set iff it is queued or held by
//! exactly one room worker.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::DispatchConfig;
use crate::core::{build_audit_event, AdmissionRecord, AuditSink, DispatchAction, RoomCapacityManager};
use crate::util::serde::{PatientId, TenantCode};

/// Queue and in-flight bookkeeping guarded by the tenant lock.
#[derive(Debug, Default)]
struct DispatchLanes {
    waiting: VecDeque<AdmissionRecord>,
    in_flight: HashSet<PatientId>,
    /// Patients whose last admission failed, keyed to when they may be retried.
    cooling: HashMap<PatientId, Instant>,
    /// Completion sequence number of the last finished admission.
    completions: u64,
    /// Recently finished patients, keyed to their completion sequence and time.
    settled: HashMap<PatientId, (u64, Instant)>,
    shutdown: bool,
}

/// Lifetime counters (lock-free atomics).
#[derive(Debug, Default)]
struct DispatchCounters {
    enqueued: AtomicU64,
    admitted: AtomicU64,
    failed: AtomicU64,
    capacity_races: AtomicU64,
}

/// Point-in-time view of a tenant's dispatch state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Total rooms.
    pub capacity: usize,
    /// Rooms holding a patient.
    pub busy: usize,
    /// Patients on the waiting queue.
    pub queued: usize,
    /// Patients queued or being admitted.
    pub in_flight: usize,
    /// Patients enqueued since the state was created.
    pub enqueued_total: u64,
    /// Successful admissions.
    pub admitted_total: u64,
    /// Failed admissions.
    pub failed_total: u64,
    /// Times a worker found no free room after dequeuing.
    pub capacity_races: u64,
}

/// Dispatch state of one tenant, shared by its scanner and room workers.
pub struct TenantDispatchState {
    tenant: TenantCode,
    rooms: RoomCapacityManager,
    lanes: Mutex<DispatchLanes>,
    /// Signaled when patients are enqueued or the state shuts down.
    work_ready: Condvar,
    retry_cooldown: Duration,
    /// How long finished patients are remembered for stale-snapshot filtering.
    settle_window: Duration,
    counters: DispatchCounters,
    workers: Mutex<Vec<JoinHandle<()>>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl TenantDispatchState {
    /// Create an empty state with `config.room_capacity` idle rooms and no workers.
    pub fn new(
        tenant: impl Into<TenantCode>,
        config: &DispatchConfig,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            rooms: RoomCapacityManager::new(config.room_capacity),
            lanes: Mutex::new(DispatchLanes::default()),
            work_ready: Condvar::new(),
            retry_cooldown: config.admission_retry_cooldown(),
            settle_window: config.tenant_scan_timeout(),
            counters: DispatchCounters::default(),
            workers: Mutex::new(Vec::new()),
            audit,
        }
    }

    /// Tenant this state belongs to.
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// The tenant's room capacity manager.
    #[must_use]
    pub const fn rooms(&self) -> &RoomCapacityManager {
        &self.rooms
    }

    /// Enqueue waiting candidates, in the given order, up to `free_slots`.
    ///
    /// Candidates that are not waiting, already in flight, or cooling down after
    /// a failed admission are skipped. Patients already reserved by an earlier
    /// scan count against capacity, so the in-flight set never exceeds the
    /// number of rooms. Returns how many patients were enqueued.
    ///
    /// The candidates are treated as current. Use
    /// [`enqueue_snapshot`](Self::enqueue_snapshot) for a list read before
    /// taking the lock.
    pub fn enqueue_candidates<I>(&self, candidates: I, free_slots: usize) -> usize
    where
        I: IntoIterator<Item = AdmissionRecord>,
    {
        self.enqueue_inner(candidates, free_slots, None)
    }

    /// Completion sequence number to read before fetching a waiting list.
    #[must_use]
    pub fn completion_epoch(&self) -> u64 {
        self.lanes.lock().completions
    }

    /// Like [`enqueue_candidates`](Self::enqueue_candidates), for a list
    /// fetched after reading `epoch` from
    /// [`completion_epoch`](Self::completion_epoch).
    ///
    /// Patients whose admission finished after `epoch` are skipped: the list
    /// may predate that completion and still show them waiting. Completions
    /// are remembered for the tenant scan timeout, which bounds every
    /// supervisor-driven scan.
    pub fn enqueue_snapshot<I>(&self, candidates: I, free_slots: usize, epoch: u64) -> usize
    where
        I: IntoIterator<Item = AdmissionRecord>,
    {
        self.enqueue_inner(candidates, free_slots, Some(epoch))
    }

    fn enqueue_inner<I>(&self, candidates: I, free_slots: usize, epoch: Option<u64>) -> usize
    where
        I: IntoIterator<Item = AdmissionRecord>,
    {
        let now = Instant::now();
        let mut enqueued = Vec::new();
        {
            let mut lanes = self.lanes.lock();
            if lanes.shutdown {
                return 0;
            }
            lanes.cooling.retain(|_, until| *until > now);
            let window = self.settle_window;
            lanes
                .settled
                .retain(|_, (_, at)| now.saturating_duration_since(*at) < window);

            let budget = free_slots.min(
                self.rooms
                    .capacity()
                    .saturating_sub(lanes.in_flight.len()),
            );

            for record in candidates {
                if enqueued.len() >= budget {
                    break;
                }
                if !record.is_waiting() {
                    continue;
                }
                if lanes.in_flight.contains(&record.id) {
                    trace!(tenant = %self.tenant, patient = record.id, "already in flight");
                    continue;
                }
                if lanes.cooling.contains_key(&record.id) {
                    trace!(tenant = %self.tenant, patient = record.id, "cooling down after failed admission");
                    continue;
                }
                if let (Some(epoch), Some((seq, _))) = (epoch, lanes.settled.get(&record.id)) {
                    if *seq > epoch {
                        trace!(tenant = %self.tenant, patient = record.id, "finished after snapshot was taken");
                        continue;
                    }
                }
                lanes.in_flight.insert(record.id);
                enqueued.push(record.id);
                lanes.waiting.push_back(record);
            }
        }

        if enqueued.is_empty() {
            return 0;
        }

        self.work_ready.notify_all();
        self.counters
            .enqueued
            .fetch_add(enqueued.len() as u64, Ordering::Relaxed);
        for patient in &enqueued {
            self.record(DispatchAction::Enqueued, Some(*patient), None);
        }
        info!(
            tenant = %self.tenant,
            enqueued = enqueued.len(),
            patients = ?enqueued,
            "patients enqueued for admission"
        );
        enqueued.len()
    }

    /// Block until a patient is queued, then pop it.
    ///
    /// Returns `None` once the state has been shut down.
    pub(crate) fn next_patient(&self) -> Option<AdmissionRecord> {
        let mut lanes = self.lanes.lock();
        loop {
            if lanes.shutdown {
                return None;
            }
            if let Some(record) = lanes.waiting.pop_front() {
                return Some(record);
            }
            self.work_ready.wait(&mut lanes);
        }
    }

    /// Put a dequeued patient back at the head after a failed room acquisition.
    ///
    /// The patient stays in flight. If the state shut down meanwhile it is
    /// released instead.
    pub(crate) fn requeue_front(&self, record: AdmissionRecord) {
        let patient = record.id;
        {
            let mut lanes = self.lanes.lock();
            if lanes.shutdown {
                lanes.in_flight.remove(&patient);
                return;
            }
            lanes.waiting.push_front(record);
        }
        self.counters.capacity_races.fetch_add(1, Ordering::Relaxed);
        self.record(DispatchAction::CapacityRace, Some(patient), None);
        warn!(tenant = %self.tenant, patient, "no free room after dequeue; patient requeued");
    }

    /// Release the room held for `patient` and drop it from the in-flight set.
    ///
    /// `failure` carries the error message of a failed admission; such patients
    /// are held back from scans for the configured cooldown.
    pub(crate) fn finish(&self, patient: PatientId, failure: Option<String>) {
        self.rooms.release();
        {
            let mut lanes = self.lanes.lock();
            lanes.in_flight.remove(&patient);
            lanes.completions += 1;
            let seq = lanes.completions;
            lanes.settled.insert(patient, (seq, Instant::now()));
            if failure.is_some() && !self.retry_cooldown.is_zero() {
                lanes
                    .cooling
                    .insert(patient, Instant::now() + self.retry_cooldown);
            }
        }
        match failure {
            None => {
                self.counters.admitted.fetch_add(1, Ordering::Relaxed);
                self.record(DispatchAction::Admitted, Some(patient), None);
            }
            Some(reason) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.record(DispatchAction::AdmissionFailed, Some(patient), Some(reason));
            }
        }
    }

    /// Whether `patient` is queued or being admitted.
    #[must_use]
    pub fn in_flight_contains(&self, patient: PatientId) -> bool {
        self.lanes.lock().in_flight.contains(&patient)
    }

    /// Ids on the waiting queue, head first.
    #[must_use]
    pub fn queued_ids(&self) -> Vec<PatientId> {
        self.lanes.lock().waiting.iter().map(|r| r.id).collect()
    }

    /// Snapshot of counters and occupancy.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        let (queued, in_flight) = {
            let lanes = self.lanes.lock();
            (lanes.waiting.len(), lanes.in_flight.len())
        };
        DispatchStats {
            capacity: self.rooms.capacity(),
            busy: self.rooms.busy_count(),
            queued,
            in_flight,
            enqueued_total: self.counters.enqueued.load(Ordering::Relaxed),
            admitted_total: self.counters.admitted.load(Ordering::Relaxed),
            failed_total: self.counters.failed.load(Ordering::Relaxed),
            capacity_races: self.counters.capacity_races.load(Ordering::Relaxed),
        }
    }

    /// Hand worker thread handles to the state so they can be joined on teardown.
    pub fn attach_workers(&self, handles: Vec<JoinHandle<()>>) {
        self.workers.lock().extend(handles);
    }

    /// Number of attached worker threads not yet joined.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.lanes.lock().shutdown
    }

    /// Whether the state is shut down and no worker still holds a patient.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        let lanes = self.lanes.lock();
        lanes.shutdown && lanes.in_flight.is_empty()
    }

    /// Stop dispatching for this tenant.
    ///
    /// Queued patients are dropped from memory (they remain waiting at the
    /// source) and idle workers are woken so they exit. Workers holding a patient
    /// finish it first. Returns how many queued patients were dropped.
    pub fn shutdown(&self) -> usize {
        let dropped = {
            let mut lanes = self.lanes.lock();
            if lanes.shutdown {
                return 0;
            }
            lanes.shutdown = true;
            let queued: Vec<_> = lanes.waiting.drain(..).collect();
            for record in &queued {
                lanes.in_flight.remove(&record.id);
            }
            queued.len()
        };
        self.work_ready.notify_all();
        debug!(tenant = %self.tenant, dropped, "tenant dispatch state shut down");
        dropped
    }

    /// Join attached workers, waiting at most `timeout` for each.
    ///
    /// Workers that don't exit in time are detached.
    pub fn join_workers(&self, timeout: Duration) {
        let workers: Vec<_> = self.workers.lock().drain(..).collect();

        for (idx, worker) in workers.into_iter().enumerate() {
            let (tx, rx) = std::sync::mpsc::channel();
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });

            match rx.recv_timeout(timeout) {
                Ok(true) => debug!(tenant = %self.tenant, worker_id = idx, "room worker joined"),
                Ok(false) => warn!(tenant = %self.tenant, worker_id = idx, "room worker panicked"),
                Err(_) => {
                    warn!(tenant = %self.tenant, worker_id = idx, "room worker did not exit in time; detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }
    }

    pub(crate) fn record(
        &self,
        action: DispatchAction,
        patient: Option<PatientId>,
        detail: Option<String>,
    ) {
        if let Some(sink) = &self.audit {
            sink.record(build_audit_event(self.tenant.clone(), patient, action, detail));
        }
    }
}
