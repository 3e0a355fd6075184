//! Cadence - habit scheduler and cycle manager
//!
//! Cadence creates one habit-tracker entry per due habit on each date of
//! a run, grouping entries into cycles that start on configured days of
//! the month and move through Upcoming, Active and Archive.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod cli;
pub mod config;
pub mod cycle;
pub mod doctor;
pub mod error;
pub mod habit;
pub mod log;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use cli::{render_diagnostic_report, render_run_summary, RunDisplay};
pub use config::{write_habits, Settings, SettingsProvider, TomlSettingsFile};
pub use cycle::{resolve_cycle_end_date, Cycle, CycleConflict, CycleDates, CycleManager, CycleStatus};
pub use doctor::{diagnose, DiagnosticReport};
pub use error::{ConfigError, RecordStoreError, RunError};
pub use habit::{
    enumerate_dates, fetch_habits, filter_due_habits, Frequency, HabitDefinition, HabitScheduler,
    RunAborted, RunMode, RunReport,
};
pub use log::{JsonlLogger, RunOutcome};
pub use store::{InMemoryRecordStore, NotionRecordStore, RecordStore};
