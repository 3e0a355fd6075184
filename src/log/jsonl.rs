//! JSONL (JSON Lines) run log
//!
//! Provides append-only logging of run outcomes to `.cadence/runs.jsonl`

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use crate::cycle::manager::CycleConflict;
use crate::habit::scheduler::{DayReport, FailedOccurrence, RunMode, RunReport};

/// How a run ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every date was processed
    Completed,
    /// A fatal error stopped the run
    Aborted,
}

/// Represents the outcome of a single run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunOutcome {
    /// ISO 8601 timestamp of when the run finished
    pub timestamp: DateTime<Utc>,
    /// Anchor date of the run
    pub today: NaiveDate,
    /// Mode the run used
    pub mode: RunMode,
    /// How the run ended
    pub status: RunStatus,
    /// Fatal error message for aborted runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-date results
    #[serde(default)]
    pub days: Vec<DayReport>,
    /// Upcoming cycles flagged as conflicting during the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
    /// Duration of the run in seconds
    pub duration_secs: u64,
}

impl RunOutcome {
    /// Outcome of a run that processed every date.
    #[must_use]
    pub fn completed(report: &RunReport, conflicts: &[CycleConflict], duration_secs: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            today: report.today,
            mode: report.mode,
            status: RunStatus::Completed,
            error: None,
            days: report.days.clone(),
            conflicts: conflicts.iter().map(ToString::to_string).collect(),
            duration_secs,
        }
    }

    /// Outcome of a run stopped by a fatal error. `partial` holds the
    /// dates processed before the failure.
    #[must_use]
    pub fn aborted(
        partial: &RunReport,
        conflicts: &[CycleConflict],
        error: &str,
        duration_secs: u64,
    ) -> Self {
        Self {
            status: RunStatus::Aborted,
            error: Some(error.to_string()),
            ..Self::completed(partial, conflicts, duration_secs)
        }
    }

    /// Occurrences that could not be created, across all dates.
    pub fn failures(&self) -> impl Iterator<Item = &FailedOccurrence> {
        self.days.iter().flat_map(|d| d.failed.iter())
    }

    /// Number of occurrences created.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.days.iter().map(|d| d.created.len()).sum()
    }
}

/// JSONL logger for run history
///
/// Provides append-only logging to `.cadence/runs.jsonl`.
/// Each line is a JSON object representing a single run outcome.
pub struct JsonlLogger {
    log_path: PathBuf,
}

impl JsonlLogger {
    /// Create a new JSONL logger
    ///
    /// # Arguments
    /// * `log_dir` - Directory where runs.jsonl will be stored (typically `.cadence`)
    ///
    /// # Errors
    /// Returns an error if the log directory cannot be created
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        Ok(Self {
            log_path: log_dir.join("runs.jsonl"),
        })
    }

    /// Append a run outcome to the log
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the outcome cannot be
    /// serialized, or the write fails
    pub fn append(&self, outcome: &RunOutcome) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open log file: {}", self.log_path.display()))?;

        let json =
            serde_json::to_string(outcome).context("Failed to serialize run outcome to JSON")?;

        writeln!(file, "{json}").context("Failed to write to log file")?;

        Ok(())
    }

    /// Read all run outcomes from the log, oldest first
    ///
    /// # Errors
    /// Returns an error if the log file cannot be read or a line is not
    /// a valid outcome
    pub fn read_all(&self) -> Result<Vec<RunOutcome>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.log_path)
            .with_context(|| format!("Failed to read log file: {}", self.log_path.display()))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(line_num, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Failed to parse line {} as JSON", line_num + 1))
            })
            .collect()
    }

    /// Get the path to the log file
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
