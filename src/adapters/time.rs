//! Monotonic time source for edge timestamps.
//!
//! On the board the echo interrupt reads the high-resolution timer; on the
//! host the simulated echo uses `std::time::Instant`.  Both report
//! nanoseconds since the clock was created.

use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Nanoseconds since construction (monotonic).
    pub fn now_ns(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Microseconds since construction (monotonic).
    pub fn uptime_us(&self) -> u64 {
        self.now_ns() / 1_000
    }
}
