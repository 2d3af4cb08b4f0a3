//! Shared sampling interval.
//!
//! Written by the control channel (BLE task), read by the sampler.  A
//! single atomic is enough: there is no multi-field invariant, and a rate
//! change only needs to be visible from the next cycle on.

use core::sync::atomic::{AtomicU32, Ordering};

use log::info;

#[derive(Debug)]
pub struct RateState {
    interval_ms: AtomicU32,
    min_ms: u32,
    max_ms: u32,
}

impl RateState {
    /// `initial` is clamped into `[min_ms, max_ms]`.
    pub fn new(initial: u32, min_ms: u32, max_ms: u32) -> Self {
        Self {
            interval_ms: AtomicU32::new(initial.clamp(min_ms, max_ms)),
            min_ms,
            max_ms,
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms.load(Ordering::Relaxed)
    }

    /// Store `requested` clamped to the configured bounds and return the
    /// value actually applied.
    pub fn set_clamped(&self, requested: u32) -> u32 {
        let applied = requested.clamp(self.min_ms, self.max_ms);
        let previous = self.interval_ms.swap(applied, Ordering::Relaxed);
        if previous != applied {
            info!(
                "sampling interval {} ms -> {} ms (requested {})",
                previous, applied, requested
            );
        }
        applied
    }
}
