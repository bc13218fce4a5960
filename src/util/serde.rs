//! Identifier and priority types shared across the dispatcher.

use serde::{Deserialize, Serialize};

/// Code identifying one tenant (hospital instance).
pub type TenantCode = String;

/// Patient identifier as issued by the persistence layer.
pub type PatientId = u64;

/// Priority flag carried on waiting-list records.
///
/// The dispatcher preserves source order and never re-sorts by priority; the
/// flag travels with the record so downstream collaborators can use it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Routine visit.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Flagged as urgent by triage.
    High,
    /// Emergency.
    Critical,
}
