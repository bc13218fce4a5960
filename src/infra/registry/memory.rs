//! In-memory tenant registry.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::core::{DispatchError, TenantRegistry};
use crate::util::serde::TenantCode;

/// Tenant registry backed by a mutable in-memory list, for development and tests.
#[derive(Debug, Default)]
pub struct StaticTenantRegistry {
    tenants: RwLock<Vec<TenantCode>>,
}

impl StaticTenantRegistry {
    /// Create a registry listing `tenants` as active.
    pub fn new<I, T>(tenants: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TenantCode>,
    {
        Self {
            tenants: RwLock::new(tenants.into_iter().map(Into::into).collect()),
        }
    }

    /// Mark `tenant` active. No-op if it already is.
    pub fn activate(&self, tenant: impl Into<TenantCode>) {
        let tenant = tenant.into();
        let mut tenants = self.tenants.write();
        if !tenants.contains(&tenant) {
            tenants.push(tenant);
        }
    }

    /// Remove `tenant` from the active list.
    pub fn deactivate(&self, tenant: &str) {
        self.tenants.write().retain(|t| t != tenant);
    }

    /// Replace the whole active list.
    pub fn set_active<I, T>(&self, tenants: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<TenantCode>,
    {
        *self.tenants.write() = tenants.into_iter().map(Into::into).collect();
    }
}

#[async_trait]
impl TenantRegistry for StaticTenantRegistry {
    async fn active_tenants(&self) -> Result<Vec<TenantCode>, DispatchError> {
        Ok(self.tenants.read().clone())
    }
}
