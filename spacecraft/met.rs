//! Mission-elapsed-time display.

use std::fmt;

use chrono::{DateTime, Utc};

const SECONDS_IN_MINUTE: i64 = 60;
const SECONDS_IN_HOUR: i64 = 3600;
const SECONDS_IN_DAY: i64 = 86_400;
// Approximation, not accounting for leap years.
const SECONDS_IN_YEAR: i64 = 31_536_000;

/// Mission elapsed time, rendered as `T+ 0Y, 000D, 00:00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Met {
    seconds: i64,
}

impl Met {
    /// Creates a MET from whole seconds since launch; clamps negative input to zero.
    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        Self {
            seconds: if seconds < 0 { 0 } else { seconds },
        }
    }

    /// Elapsed time between launch and the current universal time.
    #[must_use]
    pub fn since(launch: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::from_seconds((now - launch).num_seconds())
    }

    /// Whole seconds since launch.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        self.seconds
    }
}

impl fmt::Display for Met {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (years, rest) = (self.seconds / SECONDS_IN_YEAR, self.seconds % SECONDS_IN_YEAR);
        let (days, rest) = (rest / SECONDS_IN_DAY, rest % SECONDS_IN_DAY);
        let (hours, rest) = (rest / SECONDS_IN_HOUR, rest % SECONDS_IN_HOUR);
        let (minutes, seconds) = (rest / SECONDS_IN_MINUTE, rest % SECONDS_IN_MINUTE);
        write!(
            f,
            "T+ {years:01}Y, {days:03}D, {hours:02}:{minutes:02}:{seconds:02}"
        )
    }
}
