//! # Ward Dispatch
//!
//! A multi-tenant patient-to-room dispatch scheduler for hospital operations
//! backends.
//!
//! Each tenant (hospital instance) has a bounded pool of examination rooms. The
//! dispatcher continuously admits waiting patients into free rooms without
//! double-assigning a patient, without exceeding room capacity, and without
//! letting one tenant's slow backend hold up another tenant.
//!
//! ## Components
//!
//! - **`RoomCapacityManager`**: lock-free busy counter; the sole authority on
//!   how many rooms are free.
//! - **`TenantDispatchState`**: per-tenant waiting queue and in-flight set
//!   behind one lock, plus the condition variable idle workers park on.
//! - **`RoomWorker`**: one dedicated OS thread per room, each with its own
//!   single-threaded tokio runtime for the admission call.
//! - **`IntakeScanner`**: reads the waiting list and enqueues as many patients
//!   as there are free rooms, skipping patients already in flight.
//! - **`DispatchSupervisor`**: periodic driver that fans out over active
//!   tenants in parallel, lazily creating state and workers on first sight.
//!
//! The persistence layer, tenant registry and admission call are collaborators
//! behind the `TenantRegistry`, `WaitingListSource` and `AdmissionGateway`
//! traits. In-memory implementations live in [`infra`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ward_dispatch::builders::SupervisorBuilder;
//! use ward_dispatch::config::DispatchConfig;
//! use ward_dispatch::core::AdmissionRecord;
//! use ward_dispatch::infra::{InMemoryWaitlist, StaticTenantRegistry};
//! use ward_dispatch::util::now_ms;
//!
//! let waitlist = Arc::new(InMemoryWaitlist::new());
//! waitlist.arrive("st-mary", AdmissionRecord::waiting(1, now_ms()));
//!
//! let supervisor = SupervisorBuilder::new(DispatchConfig::from_env()?)
//!     .registry(Arc::new(StaticTenantRegistry::new(["st-mary"])))
//!     .waiting_list(waitlist.clone())
//!     .gateway(waitlist)
//!     .build()?;
//!
//! tokio::spawn(Arc::clone(&supervisor).run());
//! // ...
//! supervisor.shutdown().await;
//! ```
//!
//! For complete scenarios, see `tests/dispatch_algorithm_test.rs` and
//! `tests/supervisor_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core dispatch abstractions and capacity accounting.
pub mod core;
/// Configuration models for the dispatcher.
pub mod config;
/// Builders to construct the dispatcher from configuration.
pub mod builders;
/// Infrastructure adapters for registries and waiting lists.
pub mod infra;
/// Shared utilities.
pub mod util;
