//! Cycle records
//!
//! A cycle covers the half-open date range `[start, end)` and moves
//! through Upcoming, Active and Archive. Cycles whose schedule was
//! invalidated by a configuration change are parked in Error.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::cycle::boundary::{start_slot, CycleDates};
use crate::store::{FieldValue, Fields, Icon, Record};

/// Title property of a cycle record.
pub const NAME_PROPERTY: &str = "Name";
/// Date range property of a cycle record.
pub const DATE_RANGE_PROPERTY: &str = "Date Range";
/// Status property of a cycle record.
pub const STATUS_PROPERTY: &str = "Status";

/// Icon used for new cycles when nothing else is configured.
pub const DEFAULT_CYCLE_ICON: &str = "🌘";

/// Lifecycle state of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleStatus {
    /// Scheduled but not yet started
    Upcoming,
    /// The cycle currently collecting habit occurrences
    Active,
    /// Finished
    Archive,
    /// Invalidated by a schedule conflict
    Error,
}

impl CycleStatus {
    /// Name of the select option in the record store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "Upcoming",
            Self::Active => "Active",
            Self::Archive => "Archive",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Upcoming" => Ok(Self::Upcoming),
            "Active" => Ok(Self::Active),
            "Archive" => Ok(Self::Archive),
            "Error" => Ok(Self::Error),
            other => Err(format!("unknown cycle status '{other}'")),
        }
    }
}

/// A grouping period for habit occurrences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Record id, absent until the cycle is persisted
    pub id: Option<String>,
    /// First day of the cycle
    pub start: NaiveDate,
    /// Day after the last day of the cycle
    pub end: NaiveDate,
    /// Lifecycle state
    pub status: CycleStatus,
    /// Display name
    pub name: String,
    /// Icon shown next to the record
    pub icon: Option<Icon>,
}

impl Cycle {
    /// A cycle that has not been persisted yet.
    ///
    /// `end_index` is the slot of `end` within `dates`, as returned by
    /// [`crate::cycle::boundary::resolve_cycle_end_date`].
    #[must_use]
    pub fn planned(
        start: NaiveDate,
        end: NaiveDate,
        end_index: usize,
        dates: &CycleDates,
        status: CycleStatus,
        icon: Option<Icon>,
    ) -> Self {
        Self {
            id: None,
            start,
            end,
            status,
            name: cycle_name(start, end_index, dates),
            icon,
        }
    }

    /// Whether `date` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Whether the cycle covers exactly `[start, end)`.
    #[must_use]
    pub fn spans(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start == start && self.end == end
    }

    /// Parse a cycle record. Records without a complete date range or a
    /// known status are not usable cycles.
    #[must_use]
    pub fn from_record(record: &Record) -> Option<Self> {
        let (start, end) = record.date(DATE_RANGE_PROPERTY)?;
        let status = record.select(STATUS_PROPERTY)?.parse().ok()?;
        Some(Self {
            id: Some(record.id.clone()),
            start,
            end: end?,
            status,
            name: record.title(NAME_PROPERTY).unwrap_or_default().to_string(),
            icon: record.icon.clone(),
        })
    }

    /// Fields written when the cycle is created.
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut fields = status_fields(self.status);
        fields.insert(
            NAME_PROPERTY.to_string(),
            FieldValue::Title(self.name.clone()),
        );
        fields.insert(
            DATE_RANGE_PROPERTY.to_string(),
            FieldValue::Date {
                start: self.start,
                end: Some(self.end),
            },
        );
        fields
    }
}

/// Fields for a status-only update.
#[must_use]
pub fn status_fields(status: CycleStatus) -> Fields {
    let mut fields = Fields::new();
    fields.insert(
        STATUS_PROPERTY.to_string(),
        FieldValue::Select(status.as_str().to_string()),
    );
    fields
}

/// Month name of the start date, suffixed with the slot number when
/// several cycles share a month.
#[must_use]
pub fn cycle_name(start: NaiveDate, end_index: usize, dates: &CycleDates) -> String {
    let month = start.format("%B");
    if dates.len() > 1 {
        format!("{month} (part {})", start_slot(end_index, dates.len()) + 1)
    } else {
        month.to_string()
    }
}
