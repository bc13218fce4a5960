//! # Dispatch supervisor
//!
//! The periodic driver of the dispatcher. Every poll interval it asks the
//! tenant registry for active tenants and dispatches each of them on its own
//! task:
//!
//! ```text
//! run() ── interval tick ──► run_cycle()
//!                               │
//!            registry.active_tenants()
//!                               │
//!         retire tenants no longer listed (shutdown + join off-thread)
//!                               │
//!        ┌──────────────┬───────┴──────┬──────────────┐
//!        ▼              ▼              ▼              ▼
//!   dispatch(A)    dispatch(B)    dispatch(C)   ...  (JoinSet, each bounded
//!        │                                            by tenant_scan_timeout)
//!        ├─ known tenant ─► IntakeScanner::scan
//!        └─ first sight  ─► new TenantDispatchState
//!                           ─► initial scan
//!                           ─► install + start N RoomWorkers
//! ```
//!
//! A retired tenant stays in a draining set until every patient its workers
//! held has finished. The tenant is not started again before that, so a
//! patient still being admitted by the old state is never picked up by a new
//! one.
//!
//! Failures are contained per tenant: a failing or slow tenant shows up in the
//! cycle's [`CycleReport::failures`] and never delays or aborts its siblings or
//! the next cycle. A registry failure fails only the current cycle.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::core::{
    build_audit_event, AdmissionGateway, AuditSink, DispatchAction, DispatchError, DispatchStats,
    IntakeScanner, RoomWorker, TenantDispatchState, TenantRegistry, WaitingListSource,
};
use crate::util::serde::TenantCode;

/// Outcome of one supervisor cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Active tenants reported by the registry.
    pub tenants_seen: usize,
    /// Tenants whose dispatch state was created this cycle.
    pub tenants_started: Vec<TenantCode>,
    /// Tenants torn down because the registry no longer lists them.
    pub tenants_retired: Vec<TenantCode>,
    /// Patients enqueued across all tenants.
    pub enqueued: usize,
    /// Tenants whose dispatch failed, with the error message.
    pub failures: Vec<(TenantCode, String)>,
}

/// Result of dispatching a single tenant.
struct TenantDispatch {
    enqueued: usize,
    started: bool,
}

/// Drives intake scans and owns every tenant's dispatch state.
pub struct DispatchSupervisor {
    config: DispatchConfig,
    registry: Arc<dyn TenantRegistry>,
    scanner: IntakeScanner,
    gateway: Arc<dyn AdmissionGateway>,
    audit: Option<Arc<dyn AuditSink>>,
    tenants: RwLock<HashMap<TenantCode, Arc<TenantDispatchState>>>,
    /// Retired states whose workers may still hold a patient.
    draining: Mutex<HashMap<TenantCode, Arc<TenantDispatchState>>>,
    stopped: AtomicBool,
    stop_signal: Notify,
}

impl DispatchSupervisor {
    /// Create a supervisor. No tenant state exists until the first cycle.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` if the configuration is invalid.
    pub fn new(
        config: DispatchConfig,
        registry: Arc<dyn TenantRegistry>,
        source: Arc<dyn WaitingListSource>,
        gateway: Arc<dyn AdmissionGateway>,
    ) -> Result<Self, DispatchError> {
        config.validate().map_err(DispatchError::InvalidConfig)?;
        Ok(Self {
            config,
            registry,
            scanner: IntakeScanner::new(source),
            gateway,
            audit: None,
            tenants: RwLock::new(HashMap::new()),
            draining: Mutex::new(HashMap::new()),
            stopped: AtomicBool::new(false),
            stop_signal: Notify::new(),
        })
    }

    /// Attach an audit sink shared by every tenant created afterwards.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch state of `tenant`, if it has been started.
    #[must_use]
    pub fn tenant(&self, tenant: &str) -> Option<Arc<TenantDispatchState>> {
        self.tenants.read().get(tenant).cloned()
    }

    /// Codes of all tenants with dispatch state, sorted.
    #[must_use]
    pub fn tenant_codes(&self) -> Vec<TenantCode> {
        let mut codes: Vec<_> = self.tenants.read().keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Codes of retired tenants still waiting for in-flight admissions, sorted.
    #[must_use]
    pub fn draining_codes(&self) -> Vec<TenantCode> {
        let mut codes: Vec<_> = self.draining.lock().keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Per-tenant statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> HashMap<TenantCode, DispatchStats> {
        self.tenants
            .read()
            .iter()
            .map(|(code, state)| (code.clone(), state.stats()))
            .collect()
    }

    /// Run cycles every poll interval until [`shutdown`](Self::shutdown).
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            room_capacity = self.config.room_capacity,
            poll_interval_ms = self.config.poll_interval_ms,
            "dispatch supervisor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.stop_signal.notified() => break,
            }
            if self.stopped.load(Ordering::Acquire) {
                break;
            }
            match self.run_cycle().await {
                Ok(report) => debug!(
                    tenants = report.tenants_seen,
                    enqueued = report.enqueued,
                    failures = report.failures.len(),
                    "dispatch cycle finished"
                ),
                Err(DispatchError::Shutdown) => break,
                Err(e) => error!(error = %e, "dispatch cycle failed"),
            }
        }

        info!("dispatch supervisor stopped");
    }

    /// Run one supervisor cycle over all active tenants.
    ///
    /// # Errors
    ///
    /// Fails only when the registry cannot be read or the supervisor has been
    /// shut down. Per-tenant failures are reported in the [`CycleReport`].
    pub async fn run_cycle(self: &Arc<Self>) -> Result<CycleReport, DispatchError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(DispatchError::Shutdown);
        }

        let active = self.registry.active_tenants().await?;

        let mut seen = HashSet::new();
        let active: Vec<TenantCode> = active
            .into_iter()
            .filter(|code| seen.insert(code.clone()))
            .collect();

        let mut report = CycleReport {
            tenants_seen: active.len(),
            ..CycleReport::default()
        };

        if self.config.retire_inactive_tenants {
            report.tenants_retired = self.retire_missing(&seen);
        }
        self.prune_drained();

        let timeout = self.config.tenant_scan_timeout();
        let mut dispatches = JoinSet::new();
        for tenant in active {
            let this = Arc::clone(self);
            dispatches.spawn(async move {
                let outcome = tokio::time::timeout(timeout, this.dispatch_tenant(&tenant))
                    .await
                    .unwrap_or_else(|_| Err(DispatchError::ScanTimeout(tenant.clone())));
                (tenant, outcome)
            });
        }

        while let Some(joined) = dispatches.join_next().await {
            match joined {
                Ok((tenant, Ok(dispatch))) => {
                    report.enqueued += dispatch.enqueued;
                    if dispatch.started {
                        report.tenants_started.push(tenant);
                    }
                }
                Ok((tenant, Err(e))) => {
                    warn!(tenant = %tenant, error = %e, "tenant dispatch failed");
                    self.record(&tenant, DispatchAction::ScanFailed, Some(e.to_string()));
                    report.failures.push((tenant, e.to_string()));
                }
                Err(join_err) => {
                    error!(error = %join_err, "tenant dispatch task aborted");
                }
            }
        }

        report.tenants_started.sort();
        report.failures.sort();
        Ok(report)
    }

    /// Stop the loop, shut down every tenant and join their workers.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_signal.notify_one();
        info!("shutting down dispatch supervisor");

        self.draining.lock().clear();
        let states: Vec<_> = self.tenants.write().drain().map(|(_, s)| s).collect();
        for state in &states {
            state.shutdown();
        }

        let join_timeout = self.config.worker_join_timeout();
        let tenant_count = states.len();
        let joined = tokio::task::spawn_blocking(move || {
            for state in states {
                state.join_workers(join_timeout);
            }
        })
        .await;
        if let Err(e) = joined {
            error!(error = %e, "failed to join room workers");
        }

        info!(tenants = tenant_count, "dispatch supervisor shut down");
    }

    /// Scan a known tenant, or create, scan and start a new one.
    async fn dispatch_tenant(&self, tenant: &str) -> Result<TenantDispatch, DispatchError> {
        if let Some(state) = self.tenant(tenant) {
            let enqueued = self.scanner.scan(&state).await?;
            return Ok(TenantDispatch {
                enqueued,
                started: false,
            });
        }

        if self.draining.lock().contains_key(tenant) {
            debug!(tenant = %tenant, "previous dispatch state still draining; start deferred");
            return Ok(TenantDispatch {
                enqueued: 0,
                started: false,
            });
        }

        let state = Arc::new(TenantDispatchState::new(
            tenant,
            &self.config,
            self.audit.clone(),
        ));
        let enqueued = self.scanner.scan(&state).await?;

        {
            let mut tenants = self.tenants.write();
            if self.stopped.load(Ordering::Acquire) {
                state.shutdown();
                return Err(DispatchError::Shutdown);
            }
            if self.draining.lock().contains_key(tenant) {
                debug!(tenant = %tenant, "previous dispatch state still draining; start deferred");
                state.shutdown();
                return Ok(TenantDispatch {
                    enqueued: 0,
                    started: false,
                });
            }
            if tenants.contains_key(tenant) {
                // Another cycle installed this tenant first; its state wins.
                debug!(tenant = %tenant, "tenant started concurrently; discarding duplicate state");
                state.shutdown();
                return Ok(TenantDispatch {
                    enqueued: 0,
                    started: false,
                });
            }
            tenants.insert(tenant.to_owned(), Arc::clone(&state));
        }

        if let Err(e) = self.start_workers(&state) {
            self.tenants.write().remove(tenant);
            state.shutdown();
            return Err(e);
        }

        state.record(DispatchAction::TenantStarted, None, None);
        info!(
            tenant = %tenant,
            rooms = state.rooms().capacity(),
            enqueued,
            "tenant dispatch started"
        );
        Ok(TenantDispatch {
            enqueued,
            started: true,
        })
    }

    fn start_workers(&self, state: &Arc<TenantDispatchState>) -> Result<(), DispatchError> {
        let capacity = state.rooms().capacity();
        let mut handles = Vec::with_capacity(capacity);
        for worker_id in 0..capacity {
            let worker = RoomWorker::new(
                worker_id,
                Arc::clone(state),
                Arc::clone(&self.gateway),
                self.config.capacity_retry_delay(),
            );
            match worker.spawn(self.config.worker_stack_size) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(tenant = %state.tenant(), worker_id, error = %e, "failed to start room worker");
                    state.attach_workers(handles);
                    return Err(e);
                }
            }
        }
        state.attach_workers(handles);
        Ok(())
    }

    /// Remove and shut down tenants absent from `active`. Workers are joined on
    /// the blocking pool so the cycle never waits on them.
    fn retire_missing(&self, active: &HashSet<TenantCode>) -> Vec<TenantCode> {
        let retired: Vec<_> = {
            let mut tenants = self.tenants.write();
            let missing: Vec<_> = tenants
                .keys()
                .filter(|code| !active.contains(*code))
                .cloned()
                .collect();
            let retired: Vec<_> = missing
                .into_iter()
                .filter_map(|code| tenants.remove(&code).map(|state| (code, state)))
                .collect();
            // Registered while the map is still locked so a concurrent cycle
            // can't start the tenant in between.
            let mut draining = self.draining.lock();
            for (code, state) in &retired {
                draining.insert(code.clone(), Arc::clone(state));
            }
            retired
        };

        let join_timeout = self.config.worker_join_timeout();
        let mut codes = Vec::with_capacity(retired.len());
        for (code, state) in retired {
            let dropped = state.shutdown();
            state.record(DispatchAction::TenantRetired, None, None);
            info!(tenant = %code, dropped, "tenant no longer active; dispatch state retired");
            tokio::task::spawn_blocking(move || state.join_workers(join_timeout));
            codes.push(code);
        }
        codes.sort();
        codes
    }

    /// Forget retired states whose workers have let go of every patient.
    fn prune_drained(&self) {
        self.draining.lock().retain(|code, state| {
            let drained = state.is_drained();
            if drained {
                debug!(tenant = %code, "retired dispatch state drained");
            }
            !drained
        });
    }

    fn record(&self, tenant: &str, action: DispatchAction, detail: Option<String>) {
        if let Some(sink) = &self.audit {
            sink.record(build_audit_event(tenant, None, action, detail));
        }
    }
}

impl Drop for DispatchSupervisor {
    fn drop(&mut self) {
        // Signal workers so their threads exit; joining is left to shutdown().
        for state in self.tenants.get_mut().values() {
            state.shutdown();
        }
    }
}
