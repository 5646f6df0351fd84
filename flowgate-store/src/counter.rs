//! Per-license usage counter with day/month reset boundaries.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Daily and monthly usage counts for one license.
///
/// Counts are reset exactly once when a stored reset marker no longer
/// matches the current day or month; the reset and any subsequent
/// increment happen inside the store's per-license critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub daily_count: u32,
    pub monthly_count: u32,
    /// The day the daily count was last reset for.
    pub last_reset_daily: NaiveDate,
    /// First-of-month marker for the monthly count.
    pub last_reset_monthly: NaiveDate,
}

impl UsageCounter {
    /// A fresh counter as created lazily on the first metered action.
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            daily_count: 0,
            monthly_count: 0,
            last_reset_daily: today,
            last_reset_monthly: first_of_month(today),
        }
    }

    /// Zeroes counts whose reset marker no longer matches `today`.
    ///
    /// Daily and monthly boundaries are evaluated independently; the
    /// monthly marker is normalized to the first of the month.
    pub fn reset_boundaries(&mut self, today: NaiveDate) {
        if self.last_reset_daily != today {
            self.daily_count = 0;
            self.last_reset_daily = today;
        }

        if self.last_reset_monthly.year() != today.year()
            || self.last_reset_monthly.month() != today.month()
        {
            self.monthly_count = 0;
            self.last_reset_monthly = first_of_month(today);
        }
    }
}

/// The first day of the month containing `date`.
#[must_use]
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
