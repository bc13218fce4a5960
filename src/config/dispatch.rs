//! Dispatcher configuration.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Smallest stack a room worker thread may be given.
const MIN_WORKER_STACK_SIZE: usize = 64 * 1024;

/// Dispatcher configuration shared by every tenant.
///
/// Room capacity is the same for all tenants. The poll interval bounds the
/// latency between a patient arriving at the source and being enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Rooms per tenant; one room worker is started per room.
    pub room_capacity: usize,
    /// Period between supervisor cycles in milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound on one tenant's dispatch within a cycle, in milliseconds.
    pub tenant_scan_timeout_ms: u64,
    /// Worker back-off after a capacity race, in milliseconds.
    pub capacity_retry_delay_ms: u64,
    /// How long scans skip a patient whose admission failed, in milliseconds.
    pub admission_retry_cooldown_ms: u64,
    /// Per-worker join bound on teardown, in milliseconds.
    pub worker_join_timeout_ms: u64,
    /// Stack size of room worker threads in bytes.
    pub worker_stack_size: usize,
    /// Tear down dispatch state of tenants the registry no longer lists.
    pub retire_inactive_tenants: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            room_capacity: 5,
            poll_interval_ms: 3_000,
            tenant_scan_timeout_ms: 10_000,
            capacity_retry_delay_ms: 200,
            admission_retry_cooldown_ms: 5_000,
            worker_join_timeout_ms: 2_000,
            worker_stack_size: 2 * 1024 * 1024,
            retire_inactive_tenants: true,
        }
    }
}

impl DispatchConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set rooms per tenant.
    #[must_use]
    pub const fn with_room_capacity(mut self, room_capacity: usize) -> Self {
        self.room_capacity = room_capacity;
        self
    }

    /// Set the supervisor period.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Set the per-tenant dispatch bound.
    #[must_use]
    pub fn with_tenant_scan_timeout(mut self, timeout: Duration) -> Self {
        self.tenant_scan_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the capacity-race back-off.
    #[must_use]
    pub fn with_capacity_retry_delay(mut self, delay: Duration) -> Self {
        self.capacity_retry_delay_ms = duration_ms(delay);
        self
    }

    /// Set the failed-admission hold-back.
    #[must_use]
    pub fn with_admission_retry_cooldown(mut self, cooldown: Duration) -> Self {
        self.admission_retry_cooldown_ms = duration_ms(cooldown);
        self
    }

    /// Set the per-worker join bound.
    #[must_use]
    pub fn with_worker_join_timeout(mut self, timeout: Duration) -> Self {
        self.worker_join_timeout_ms = duration_ms(timeout);
        self
    }

    /// Enable or disable teardown of deactivated tenants.
    #[must_use]
    pub const fn with_retire_inactive_tenants(mut self, retire: bool) -> Self {
        self.retire_inactive_tenants = retire;
        self
    }

    /// Supervisor period.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-tenant dispatch bound.
    #[must_use]
    pub const fn tenant_scan_timeout(&self) -> Duration {
        Duration::from_millis(self.tenant_scan_timeout_ms)
    }

    /// Capacity-race back-off.
    #[must_use]
    pub const fn capacity_retry_delay(&self) -> Duration {
        Duration::from_millis(self.capacity_retry_delay_ms)
    }

    /// Failed-admission hold-back.
    #[must_use]
    pub const fn admission_retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.admission_retry_cooldown_ms)
    }

    /// Per-worker join bound.
    #[must_use]
    pub const fn worker_join_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_join_timeout_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.room_capacity == 0 {
            return Err("room_capacity must be greater than 0".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".into());
        }
        if self.tenant_scan_timeout_ms == 0 {
            return Err("tenant_scan_timeout_ms must be greater than 0".into());
        }
        if self.worker_stack_size < MIN_WORKER_STACK_SIZE {
            return Err(format!(
                "worker_stack_size must be at least {MIN_WORKER_STACK_SIZE} bytes"
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by `DISPATCH_*` environment
    /// variables. A `.env` file in the working directory is loaded first if present.
    ///
    /// # Errors
    ///
    /// Fails when a variable is set but does not parse, or the result is invalid.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        env_override("DISPATCH_ROOM_CAPACITY", &mut cfg.room_capacity)?;
        env_override("DISPATCH_POLL_INTERVAL_MS", &mut cfg.poll_interval_ms)?;
        env_override(
            "DISPATCH_TENANT_SCAN_TIMEOUT_MS",
            &mut cfg.tenant_scan_timeout_ms,
        )?;
        env_override(
            "DISPATCH_CAPACITY_RETRY_DELAY_MS",
            &mut cfg.capacity_retry_delay_ms,
        )?;
        env_override(
            "DISPATCH_ADMISSION_RETRY_COOLDOWN_MS",
            &mut cfg.admission_retry_cooldown_ms,
        )?;
        env_override(
            "DISPATCH_WORKER_JOIN_TIMEOUT_MS",
            &mut cfg.worker_join_timeout_ms,
        )?;
        env_override(
            "DISPATCH_RETIRE_INACTIVE_TENANTS",
            &mut cfg.retire_inactive_tenants,
        )?;

        cfg.validate()
            .map_err(|e| anyhow!("dispatch configuration invalid: {e}"))?;
        Ok(cfg)
    }
}

fn env_override<T>(key: &str, target: &mut T) -> AppResult<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Ok(raw) = std::env::var(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}"))?;
    }
    Ok(())
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
