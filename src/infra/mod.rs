//! Infrastructure adapters for the dispatcher's collaborators.

pub mod registry;
pub mod waitlist;

pub use registry::StaticTenantRegistry;
pub use waitlist::InMemoryWaitlist;
