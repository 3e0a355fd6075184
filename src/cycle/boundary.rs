//! Cycle boundaries
//!
//! Cycles start on a fixed set of days of the month. Given those days,
//! any date maps to the exclusive end date of the cycle containing it.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Highest day allowed as a cycle start, so every month contains it.
pub const MAX_CYCLE_DAY: u32 = 28;

/// Sorted, de-duplicated days of the month on which new cycles begin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct CycleDates(Vec<u32>);

impl CycleDates {
    /// Build from raw days, rejecting an empty list or days outside 1..=28.
    pub fn new(days: impl IntoIterator<Item = u32>) -> Result<Self, ConfigError> {
        let mut days: Vec<u32> = days.into_iter().collect();
        if days.is_empty() {
            return Err(ConfigError::EmptyCycleDates);
        }
        if let Some(&bad) = days.iter().find(|d| !(1..=MAX_CYCLE_DAY).contains(*d)) {
            return Err(ConfigError::CycleDateOutOfRange(bad));
        }
        days.sort_unstable();
        days.dedup();
        Ok(Self(days))
    }

    /// The configured days in ascending order.
    #[must_use]
    pub fn days(&self) -> &[u32] {
        &self.0
    }

    /// Number of cycles per month.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no cycle-start days are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a new cycle begins on `date`.
    #[must_use]
    pub fn is_boundary(&self, date: NaiveDate) -> bool {
        self.0.contains(&date.day())
    }
}

impl TryFrom<Vec<u32>> for CycleDates {
    type Error = ConfigError;

    fn try_from(days: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl From<CycleDates> for Vec<u32> {
    fn from(dates: CycleDates) -> Self {
        dates.0
    }
}

/// Compute the exclusive end date of the cycle containing `target`,
/// together with the index of that end day within `dates`.
///
/// A target on a configured day ends at the following configured day.
/// Otherwise the cycle ends at the first configured day after the
/// target. Either way, running off the end of the list wraps to the
/// first configured day of the next month.
#[must_use]
pub fn resolve_cycle_end_date(target: NaiveDate, dates: &CycleDates) -> (NaiveDate, usize) {
    let days = dates.days();
    let day = target.day();

    let index = days.iter().position(|&d| d == day).map_or_else(
        || days.iter().position(|&d| d > day).unwrap_or(0),
        |i| (i + 1) % days.len(),
    );
    let end_day = days[index];

    let month_start = target - Days::new(u64::from(target.day0()));
    let end_month = if end_day > day {
        month_start
    } else {
        month_start + Months::new(1)
    };

    (end_month + Days::new(u64::from(end_day - 1)), index)
}

/// Index of the cycle-start slot that precedes the end slot `end_index`.
#[must_use]
pub const fn start_slot(end_index: usize, slots: usize) -> usize {
    (end_index + slots - 1) % slots
}
