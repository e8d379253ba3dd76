//! Interrupt to poller handoff flag

use core::sync::atomic::{AtomicBool, Ordering};

/// A single-producer, single-consumer event flag
///
/// The interrupt handler raises the flag after it finishes writing the data
/// the flag guards. The polling task observes the flag before it reads that
/// data. The release store pairs with the acquire load so those writes are
/// visible to the poller.
pub struct Signal(AtomicBool);

impl Signal {
    pub const fn new() -> Self {
        Signal(AtomicBool::new(false))
    }

    /// Publish the event
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Consume the event, returning `true` if it was raised
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}
