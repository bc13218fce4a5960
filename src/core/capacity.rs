//! Room capacity accounting.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks how many examination rooms of a tenant are occupied.
///
/// The busy counter only moves through compare-and-swap, so room workers
/// acquire and release without holding the tenant lock, and readers can take
/// a lock-free snapshot of how many rooms are free.
#[derive(Debug)]
pub struct RoomCapacityManager {
    capacity: usize,
    busy: AtomicUsize,
}

impl RoomCapacityManager {
    /// Create a manager for `capacity` rooms, all idle.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            busy: AtomicUsize::new(0),
        }
    }

    /// Total number of rooms.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rooms currently holding a patient.
    #[must_use]
    pub fn busy_count(&self) -> usize {
        self.busy.load(Ordering::Acquire)
    }

    /// Rooms free right now. Never negative.
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.capacity.saturating_sub(self.busy_count())
    }

    /// Occupy one room if any is free.
    pub fn try_acquire(&self) -> bool {
        let mut current = self.busy.load(Ordering::Acquire);
        loop {
            if current >= self.capacity {
                return false;
            }
            match self.busy.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Free one room.
    ///
    /// # Panics
    ///
    /// In debug builds, panics when no room is busy (a double release). Release
    /// builds log the defect and leave the counter at zero.
    pub fn release(&self) {
        let mut current = self.busy.load(Ordering::Acquire);
        loop {
            if current == 0 {
                tracing::error!("room released while none were busy; ignoring");
                debug_assert!(current > 0, "room released while none were busy");
                return;
            }
            match self.busy.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}
