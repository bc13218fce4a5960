//! Shared test doubles for dispatcher integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use ward_dispatch::config::DispatchConfig;
use ward_dispatch::core::{
    AdmissionGateway, AdmissionRecord, DispatchError, TenantRegistry, WaitingListSource,
};
use ward_dispatch::infra::InMemoryWaitlist;
use ward_dispatch::util::{PatientId, TenantCode};

/// Test configuration: fast polling, short back-offs, long failure cooldown.
pub fn config(room_capacity: usize) -> DispatchConfig {
    DispatchConfig::new()
        .with_room_capacity(room_capacity)
        .with_poll_interval(Duration::from_millis(20))
        .with_tenant_scan_timeout(Duration::from_secs(2))
        .with_capacity_retry_delay(Duration::from_millis(10))
        .with_admission_retry_cooldown(Duration::from_secs(60))
        .with_worker_join_timeout(Duration::from_millis(500))
}

/// Waitlist with patients `ids` arriving at `tenant` in order.
pub fn waitlist_with(
    tenant: &str,
    ids: impl IntoIterator<Item = PatientId>,
) -> Arc<InMemoryWaitlist> {
    let list = Arc::new(InMemoryWaitlist::new());
    for id in ids {
        list.arrive(tenant, AdmissionRecord::waiting(id, u128::from(id)));
    }
    list
}

/// Poll `cond` from a blocking context until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Poll `cond` from async code until it holds or `timeout` elapses.
pub async fn wait_until_async(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// Gateway that delegates to a waitlist while recording calls and concurrency,
/// with scripted failures, panics and per-tenant stalls.
pub struct RecordingGateway {
    inner: Arc<InMemoryWaitlist>,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<PatientId>>,
    fail_always: Mutex<HashSet<PatientId>>,
    fail_once: Mutex<HashSet<PatientId>>,
    panic_on: Mutex<HashSet<PatientId>>,
    stalled: Mutex<HashMap<TenantCode, Duration>>,
}

impl RecordingGateway {
    pub fn new(inner: Arc<InMemoryWaitlist>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            fail_always: Mutex::new(HashSet::new()),
            fail_once: Mutex::new(HashSet::new()),
            panic_on: Mutex::new(HashSet::new()),
            stalled: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_always(self, patient: PatientId) -> Self {
        self.fail_always.lock().insert(patient);
        self
    }

    pub fn fail_once(self, patient: PatientId) -> Self {
        self.fail_once.lock().insert(patient);
        self
    }

    pub fn panic_on(self, patient: PatientId) -> Self {
        self.panic_on.lock().insert(patient);
        self
    }

    pub fn stall_tenant(self, tenant: &str, stall: Duration) -> Self {
        self.stalled.lock().insert(tenant.to_owned(), stall);
        self
    }

    pub fn calls(&self) -> Vec<PatientId> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, patient: PatientId) -> usize {
        self.calls.lock().iter().filter(|p| **p == patient).count()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdmissionGateway for RecordingGateway {
    async fn admit(&self, tenant: &str, patient: PatientId) -> Result<(), DispatchError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        self.calls.lock().push(patient);

        let stall = self.stalled.lock().get(tenant).copied();
        tokio::time::sleep(stall.unwrap_or(self.delay)).await;

        let should_panic = self.panic_on.lock().contains(&patient);
        if should_panic {
            self.active.fetch_sub(1, Ordering::SeqCst);
            panic!("gateway exploded for patient {patient}");
        }
        let always = self.fail_always.lock().contains(&patient);
        let once = self.fail_once.lock().remove(&patient);

        let result = if always || once {
            Err(DispatchError::Admission {
                patient,
                reason: "scripted failure".into(),
            })
        } else {
            self.inner.admit(tenant, patient).await
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Waiting-list source that can fail, stall, or return late per tenant.
pub struct ScriptedSource {
    inner: Arc<InMemoryWaitlist>,
    failing: Mutex<HashSet<TenantCode>>,
    stalled: Mutex<HashMap<TenantCode, Duration>>,
    lagging: Mutex<HashMap<TenantCode, Duration>>,
}

impl ScriptedSource {
    pub fn new(inner: Arc<InMemoryWaitlist>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            stalled: Mutex::new(HashMap::new()),
            lagging: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_failing(&self, tenant: &str, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(tenant.to_owned());
        } else {
            set.remove(tenant);
        }
    }

    /// Sleep before reading the list.
    pub fn stall(&self, tenant: &str, stall: Duration) {
        self.stalled.lock().insert(tenant.to_owned(), stall);
    }

    /// Read the list, then sleep before returning it.
    pub fn lag(&self, tenant: &str, lag: Duration) {
        self.lagging.lock().insert(tenant.to_owned(), lag);
    }
}

#[async_trait]
impl WaitingListSource for ScriptedSource {
    async fn fetch_waiting(&self, tenant: &str) -> Result<Vec<AdmissionRecord>, DispatchError> {
        let failing = self.failing.lock().contains(tenant);
        if failing {
            return Err(DispatchError::WaitingList {
                tenant: tenant.to_owned(),
                reason: "database unreachable".into(),
            });
        }
        let stall = self.stalled.lock().get(tenant).copied();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        let records = self.inner.fetch_waiting(tenant).await?;
        let lag = self.lagging.lock().get(tenant).copied();
        if let Some(lag) = lag {
            tokio::time::sleep(lag).await;
        }
        Ok(records)
    }
}

/// Registry that can be switched into a failing mode.
pub struct ToggleRegistry {
    tenants: Vec<TenantCode>,
    failing: AtomicBool,
}

impl ToggleRegistry {
    pub fn new(tenants: &[&str]) -> Self {
        Self {
            tenants: tenants.iter().map(|t| (*t).to_owned()).collect(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantRegistry for ToggleRegistry {
    async fn active_tenants(&self) -> Result<Vec<TenantCode>, DispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::Registry("registry offline".into()));
        }
        Ok(self.tenants.clone())
    }
}
