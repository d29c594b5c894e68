//! Clock handles shared across services.
//!
//! Every service receives its clock by injection. Production wiring uses
//! [`mockable::DefaultClock`]; tests and simulations use [`ManualClock`] so
//! that scheduling, lease expiry, and webhook timeouts can be stepped
//! deterministically.

use chrono::{DateTime, Duration, Local, Utc};
use mockable::Clock;
use std::sync::{Arc, PoisonError, RwLock};

/// Type-erased clock shared by the engine's services.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Settable clock whose clones observe the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Moves the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *guard = instant;
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *guard += delta;
    }

    /// Moves the clock forward by a whole number of seconds.
    pub fn advance_secs(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use mockable::Clock;

    #[test]
    fn clones_share_the_same_instant() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid instant");
        let clock = ManualClock::new(start);
        let observer = clock.clone();

        clock.advance_secs(90);

        assert_eq!(observer.utc(), start + Duration::seconds(90));
    }

    #[test]
    fn set_replaces_the_current_instant() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid instant");
        let later = Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).single().expect("valid instant");
        let clock = ManualClock::new(start);

        clock.set(later);

        assert_eq!(clock.utc(), later);
    }
}
