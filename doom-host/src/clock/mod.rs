//! Steady-clock time source for the guest.
//!
//! The epoch is captured lazily on the first reading, so the first value the
//! guest observes is always 0. Once set it is never replaced.

use std::sync::OnceLock;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct MonotonicClock {
    epoch: OnceLock<Instant>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole milliseconds since the epoch, capturing the epoch on first use.
    ///
    /// Saturates at `i32::MAX` (~24.8 days) rather than wrapping.
    pub fn elapsed_millis(&self) -> i32 {
        let now = Instant::now();
        let epoch = *self.epoch.get_or_init(|| now);
        let millis = now.saturating_duration_since(epoch).as_millis();
        i32::try_from(millis).unwrap_or(i32::MAX)
    }

    pub fn epoch(&self) -> Option<Instant> {
        self.epoch.get().copied()
    }
}
