//! Core dispatch abstractions: capacity accounting, per-tenant state, room
//! workers, intake scanning and the supervisor that drives them.

pub mod admission;
pub mod audit;
pub mod capacity;
pub mod error;
pub mod room_worker;
pub mod scanner;
pub mod supervisor;
pub mod tenant_state;

pub use admission::{AdmissionGateway, AdmissionRecord, TenantRegistry, WaitStatus, WaitingListSource};
pub use audit::{build_audit_event, AuditEvent, AuditSink, DispatchAction, InMemoryAuditSink};
pub use capacity::RoomCapacityManager;
pub use error::{AppResult, DispatchError};
pub use room_worker::RoomWorker;
pub use scanner::IntakeScanner;
pub use supervisor::{CycleReport, DispatchSupervisor};
pub use tenant_state::{DispatchStats, TenantDispatchState};
