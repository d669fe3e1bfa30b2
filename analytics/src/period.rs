//! Reporting periods and their time windows.
//!
//! All windows are computed in UTC (the fixed locale of the system) from an
//! injected "now", so snapshots are deterministic under test.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A reporting period, the cache key for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Since UTC midnight.
    Today,
    /// Trailing 7 days (sliding, not calendar-aligned).
    Week,
    /// Trailing 30 days (sliding, not calendar-aligned).
    Month,
    /// Unbounded.
    All,
}

impl Period {
    /// All periods, in cache-restore order.
    pub const ALL_PERIODS: [Self; 4] = [Self::Today, Self::Week, Self::Month, Self::All];

    /// Inclusive start of the period's window, `None` when unbounded.
    #[must_use]
    pub fn window_start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Today => {
                let midnight = now.date_naive().and_hms_opt(0, 0, 0)?;
                Utc.from_local_datetime(&midnight).single()
            }
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(now - Duration::days(30)),
            Self::All => None,
        }
    }

    /// The same-length window immediately preceding the current one, as
    /// `(start, end)` with `end` exclusive. `None` for [`Period::All`],
    /// which has no comparison.
    ///
    /// For `Week` this is the 7 days before the trailing-7 window — sliding
    /// windows, never calendar-aligned. For `Today` it is yesterday up to
    /// the same time of day.
    #[must_use]
    pub fn previous_window(self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.window_start(now)?;
        let length = now - start;
        Some((start - length, start))
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
            Self::All => "all",
        };
        write!(f, "{s}")
    }
}
