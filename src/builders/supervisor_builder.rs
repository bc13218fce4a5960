//! Builder for [`DispatchSupervisor`].

use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::core::{
    AdmissionGateway, AuditSink, DispatchError, DispatchSupervisor, TenantRegistry,
    WaitingListSource,
};

/// Assembles a [`DispatchSupervisor`] from configuration and its collaborators.
pub struct SupervisorBuilder {
    config: DispatchConfig,
    registry: Option<Arc<dyn TenantRegistry>>,
    source: Option<Arc<dyn WaitingListSource>>,
    gateway: Option<Arc<dyn AdmissionGateway>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl SupervisorBuilder {
    /// Start a builder with `config`.
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            registry: None,
            source: None,
            gateway: None,
            audit: None,
        }
    }

    /// Configuration the supervisor will be built with.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Tenant registry enumerating active tenants.
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn TenantRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Source of waiting patients.
    #[must_use]
    pub fn waiting_list(mut self, source: Arc<dyn WaitingListSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Gateway performing admissions.
    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn AdmissionGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Optional audit sink for dispatch events.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Build the supervisor.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` when a collaborator is missing or
    /// the configuration does not validate.
    pub fn build(self) -> Result<Arc<DispatchSupervisor>, DispatchError> {
        let registry = self
            .registry
            .ok_or_else(|| DispatchError::InvalidConfig("tenant registry is required".into()))?;
        let source = self
            .source
            .ok_or_else(|| DispatchError::InvalidConfig("waiting list source is required".into()))?;
        let gateway = self
            .gateway
            .ok_or_else(|| DispatchError::InvalidConfig("admission gateway is required".into()))?;

        let mut supervisor = DispatchSupervisor::new(self.config, registry, source, gateway)?;
        if let Some(audit) = self.audit {
            supervisor = supervisor.with_audit(audit);
        }
        Ok(Arc::new(supervisor))
    }
}
