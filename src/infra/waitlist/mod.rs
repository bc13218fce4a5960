//! Waiting-list and admission backends.

pub mod memory;

pub use memory::InMemoryWaitlist;
