//! Exponential backoff for supervisor rechecks.
//!
//! `next_check_at = now + base × 2^failures`. No jitter is applied.

use chrono::{DateTime, Duration, Utc};

/// Converts whole seconds into a [`Duration`], saturating at the largest
/// representable span.
#[must_use]
pub fn duration_from_secs(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Recheck delay calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_delay_secs: u64,
}

impl Backoff {
    /// Creates a calculator with the given base delay.
    #[must_use]
    pub const fn new(base_delay_secs: u64) -> Self {
        Self { base_delay_secs }
    }

    /// Returns the delay in seconds after `failures` failed attempts.
    ///
    /// Saturates instead of overflowing for very large failure counts.
    #[must_use]
    pub fn delay_secs(self, failures: u32) -> u64 {
        let factor = 1_u64.checked_shl(failures).unwrap_or(u64::MAX);
        self.base_delay_secs.saturating_mul(factor)
    }

    /// Returns the delay after `failures` failed attempts.
    #[must_use]
    pub fn delay(self, failures: u32) -> Duration {
        duration_from_secs(self.delay_secs(failures))
    }

    /// Returns when the next check should run.
    #[must_use]
    pub fn next_check_at(self, now: DateTime<Utc>, failures: u32) -> DateTime<Utc> {
        now.checked_add_signed(self.delay(failures))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
