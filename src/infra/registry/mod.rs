//! Tenant registry backends.

pub mod memory;

pub use memory::StaticTenantRegistry;
