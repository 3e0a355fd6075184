//! Habits
//!
//! Habit definitions, the rules deciding when they are due, and the
//! scheduler that turns due habits into tracker entries.

pub mod calendar;
pub mod catalog;
pub mod definition;
pub mod occurrence;
pub mod scheduler;

pub use calendar::{HolidayCalendar, HolidayRegion, NoHolidays, UsFederalHolidays};
pub use catalog::fetch_habits;
pub use definition::{Frequency, HabitDefinition, HabitStatus};
pub use occurrence::HabitOccurrence;
pub use scheduler::{
    enumerate_dates, filter_due_habits, DateSpan, DayReport, FailedOccurrence, HabitScheduler,
    RunAborted, RunMode, RunReport,
};
