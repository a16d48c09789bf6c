//! Clock collaborator interface for the simulation universal time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use thiserror::Error;

/// Errors surfaced when reading the simulation clock.
#[derive(Debug, Error, Clone)]
pub enum ClockError {
    /// The simulation backend could not be reached.
    #[error("simulation clock unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the simulation's universal time.
///
/// The clock advances externally and unevenly; callers must tolerate large
/// forward jumps and backward jumps across a state reload.
pub trait ClockSource: Send + Sync {
    /// Returns the current universal time.
    fn now(&self) -> Result<DateTime<Utc>, ClockError>;
}

/// Manually advanced clock used by the demo runtime and tests.
#[derive(Debug, Clone)]
pub struct SimClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl SimClock {
    /// Creates a clock reading the given universal time.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward (or backward, for reload scenarios).
    pub fn advance(&self, delta: Duration) {
        let mut now = self.inner.lock();
        *now += delta;
    }

    /// Sets the clock to an absolute reading.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.inner.lock() = now;
    }
}

impl ClockSource for SimClock {
    fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        Ok(*self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn advances_and_rewinds() {
        let start = Utc.with_ymd_and_hms(1951, 1, 1, 0, 0, 0).unwrap();
        let clock = SimClock::new(start);
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now().unwrap(), start + Duration::seconds(90));
        clock.set(start);
        assert_eq!(clock.now().unwrap(), start);
    }
}
