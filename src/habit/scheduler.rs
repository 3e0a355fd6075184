//! Habit scheduler
//!
//! Walks the dates of a run in ascending order, resolves the cycle that
//! owns each date and creates one tracker entry per due habit.

use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::cycle::boundary::{resolve_cycle_end_date, CycleDates};
use crate::cycle::manager::CycleManager;
use crate::error::{RecordStoreError, RunError};
use crate::habit::calendar::HolidayCalendar;
use crate::habit::definition::HabitDefinition;
use crate::habit::occurrence::HabitOccurrence;
use crate::store::RecordStore;

/// Which dates a run covers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Only today
    #[default]
    Daily,
    /// Today and the six days after it
    Weekly,
    /// Today through the end of the month
    Monthly,
    /// Today through the end of the current cycle
    Cyclic,
}

impl RunMode {
    /// Date span enumerated by this mode, `None` for a single day.
    #[must_use]
    pub const fn span(self) -> Option<DateSpan> {
        match self {
            Self::Daily => None,
            Self::Weekly => Some(DateSpan::Week),
            Self::Monthly => Some(DateSpan::Month),
            Self::Cyclic => Some(DateSpan::Cyclic),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Cyclic => "cyclic",
        })
    }
}

/// A multi-day range starting today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpan {
    /// Seven days
    Week,
    /// Until the last day of the month
    Month,
    /// Until the day before the current cycle ends
    Cyclic,
}

/// Dates of `span` starting at `today`, ascending. Cloning the iterator
/// restarts the sequence.
#[must_use]
pub fn enumerate_dates(
    span: DateSpan,
    today: NaiveDate,
    dates: &CycleDates,
) -> impl Iterator<Item = NaiveDate> + Clone {
    let end = match span {
        DateSpan::Week => today + Days::new(7),
        DateSpan::Month => today - Days::new(u64::from(today.day0())) + Months::new(1),
        DateSpan::Cyclic => resolve_cycle_end_date(today, dates).0,
    };
    today.iter_days().take_while(move |d| *d < end)
}

/// Enabled habits due on `date`.
pub fn filter_due_habits<'a>(
    date: NaiveDate,
    habits: &'a [HabitDefinition],
    calendar: &'a dyn HolidayCalendar,
) -> impl Iterator<Item = &'a HabitDefinition> + 'a {
    habits.iter().filter(move |h| h.is_due(date, calendar))
}

/// A habit whose tracker entry could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedOccurrence {
    /// Habit name
    pub habit: String,
    /// Error reported by the store
    pub reason: String,
}

/// What happened on one date of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReport {
    /// The processed date
    pub date: NaiveDate,
    /// Id of the cycle owning the date
    pub cycle_id: String,
    /// Name of that cycle
    pub cycle_name: String,
    /// Habits with a new tracker entry
    pub created: Vec<String>,
    /// Habits whose entry failed
    pub failed: Vec<FailedOccurrence>,
}

/// Result of a full run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Mode the run used
    pub mode: RunMode,
    /// Anchor date of the run
    pub today: NaiveDate,
    /// One entry per processed date, ascending
    pub days: Vec<DayReport>,
}

impl RunReport {
    /// Total tracker entries created.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.days.iter().map(|d| d.created.len()).sum()
    }

    /// Total tracker entries that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.days.iter().map(|d| d.failed.len()).sum()
    }
}

/// A run stopped by a fatal error, with the dates finished before it.
#[derive(Debug, Error)]
#[error("run aborted after {} processed date(s)", .partial.days.len())]
pub struct RunAborted {
    /// Dates processed before the failure
    pub partial: RunReport,
    /// The fatal error
    #[source]
    pub source: RunError,
}

/// Creates habit occurrences for the dates of a run.
pub struct HabitScheduler {
    store: Arc<dyn RecordStore>,
    tracker_collection: String,
    habits: Vec<HabitDefinition>,
    calendar: Box<dyn HolidayCalendar>,
    cycles: CycleManager,
}

impl HabitScheduler {
    /// Create a scheduler writing to `tracker_collection`.
    ///
    /// `cycles` should have been created for the same "today" that is
    /// later passed to [`HabitScheduler::run`].
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        tracker_collection: impl Into<String>,
        habits: Vec<HabitDefinition>,
        calendar: Box<dyn HolidayCalendar>,
        cycles: CycleManager,
    ) -> Self {
        Self {
            store,
            tracker_collection: tracker_collection.into(),
            habits,
            calendar,
            cycles,
        }
    }

    /// The cycle manager, for inspecting conflicts after a run.
    #[must_use]
    pub const fn cycles(&self) -> &CycleManager {
        &self.cycles
    }

    /// Create tracker entries for every habit due on `date`.
    ///
    /// # Errors
    /// Returns an error if the owning cycle cannot be resolved. Failures
    /// creating individual entries are recorded in the report instead.
    pub async fn materialize_occurrences(
        &mut self,
        date: NaiveDate,
    ) -> Result<DayReport, RunError> {
        let cycle = self.cycles.get_or_create_cycle(date).await?;
        let cycle_id = cycle
            .id
            .ok_or_else(|| RecordStoreError::Parse(format!("cycle '{}' has no id", cycle.name)))?;

        let occurrences: Vec<HabitOccurrence> =
            filter_due_habits(date, &self.habits, self.calendar.as_ref())
                .map(|habit| HabitOccurrence::new(habit, date, &cycle_id))
                .collect();

        let mut report = DayReport {
            date,
            cycle_id,
            cycle_name: cycle.name,
            created: Vec::new(),
            failed: Vec::new(),
        };

        for occurrence in occurrences {
            let result = self
                .store
                .create_record(
                    &self.tracker_collection,
                    occurrence.to_fields(),
                    occurrence.icon.clone(),
                )
                .await;
            match result {
                Ok(_) => report.created.push(occurrence.habit_name),
                Err(err) => {
                    warn!(
                        habit = %occurrence.habit_name,
                        %date,
                        error = %err,
                        "failed to create habit occurrence"
                    );
                    report.failed.push(FailedOccurrence {
                        habit: occurrence.habit_name,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            %date,
            cycle = %report.cycle_name,
            created = report.created.len(),
            failed = report.failed.len(),
            "processed date"
        );
        Ok(report)
    }

    /// Process every date covered by `mode`, starting at `today`.
    ///
    /// # Errors
    /// Returns the first fatal error together with the dates processed
    /// before it. Later dates are not processed.
    pub async fn run(&mut self, mode: RunMode, today: NaiveDate) -> Result<RunReport, RunAborted> {
        let dates: Vec<NaiveDate> = match mode.span() {
            None => vec![today],
            Some(span) => enumerate_dates(span, today, self.cycles.dates()).collect(),
        };
        info!(%mode, %today, dates = dates.len(), habits = self.habits.len(), "starting run");

        let mut report = RunReport {
            mode,
            today,
            days: Vec::with_capacity(dates.len()),
        };
        for date in dates {
            match self.materialize_occurrences(date).await {
                Ok(day) => report.days.push(day),
                Err(source) => {
                    warn!(
                        %date,
                        processed = report.days.len(),
                        created = report.created_count(),
                        error = %source,
                        "run aborted"
                    );
                    return Err(RunAborted {
                        partial: report,
                        source,
                    });
                }
            }
        }
        Ok(report)
    }
}
