//! Cadence doctor: diagnostics and health checks
//!
//! Analyzes `cadence.toml` and `.cadence/runs.jsonl` to diagnose issues
//! and suggest fixes. Returns a structured report with categories:
//! errors (must fix), warnings (should fix), info (suggestions).

use std::collections::BTreeMap;

use crate::config::{Settings, API_KEY_ENV};
use crate::log::RunOutcome;

/// Severity level for a diagnostic finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    /// Must fix: runs cannot succeed
    Error,
    /// Should fix: runs succeed but produce surprising results
    Warning,
    /// Suggestion
    Info,
}

/// A single diagnostic finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Severity of the finding
    pub severity: Severity,
    /// Short code for the finding (e.g., "C001")
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Suggested fix (optional)
    pub suggestion: Option<String>,
}

/// Diagnostic report from `cadence --check`
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    /// All findings, in order of severity (errors first)
    pub findings: Vec<Finding>,
}

impl DiagnosticReport {
    /// Returns true if the report has no findings at all
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Returns the number of errors
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(&Severity::Error)
    }

    /// Returns the number of warnings
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count(&Severity::Warning)
    }

    /// Returns the number of info items
    #[must_use]
    pub fn info_count(&self) -> usize {
        self.count(&Severity::Info)
    }

    fn count(&self, severity: &Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| &f.severity == severity)
            .count()
    }
}

/// Run all diagnostic checks and return a report.
#[must_use]
pub fn diagnose(settings: &Settings, log: &[RunOutcome]) -> DiagnosticReport {
    let mut findings = Vec::new();

    check_enabled_habits(settings, &mut findings);
    check_day_counts(settings, &mut findings);
    check_duplicate_names(settings, &mut findings);
    check_api_key(settings.api_key().is_some(), &mut findings);
    check_failed_occurrences(log, &mut findings);
    check_cycle_layout(settings, &mut findings);

    // Sort: errors first, then warnings, then info
    findings.sort_by_key(|f| match f.severity {
        Severity::Error => 0,
        Severity::Warning => 1,
        Severity::Info => 2,
    });

    DiagnosticReport { findings }
}

/// C001: Nothing would be scheduled
fn check_enabled_habits(settings: &Settings, findings: &mut Vec<Finding>) {
    if settings.enabled_habits().next().is_some() {
        return;
    }
    findings.push(Finding {
        severity: Severity::Warning,
        code: "C001".to_string(),
        message: format!(
            "No enabled habits ({} defined); runs will only manage cycles",
            settings.habits.len()
        ),
        suggestion: Some(
            "Set `status = \"On\"` on a habit or run with --refresh-habits".to_string(),
        ),
    });
}

/// C002: Explicit days that disagree with the frequency label
fn check_day_counts(settings: &Settings, findings: &mut Vec<Finding>) {
    for habit in &settings.habits {
        let (Some(days), Some(expected)) = (&habit.days, habit.frequency.weekly_count()) else {
            continue;
        };
        if days.len() != expected {
            findings.push(Finding {
                severity: Severity::Warning,
                code: "C002".to_string(),
                message: format!(
                    "Habit '{}' is '{}' but lists {} day(s)",
                    habit.name,
                    habit.frequency,
                    days.len()
                ),
                suggestion: Some(
                    "The day list wins; align the frequency or the days".to_string(),
                ),
            });
        }
    }
}

/// C003: Tracker entries are keyed by habit name
fn check_duplicate_names(settings: &Settings, findings: &mut Vec<Finding>) {
    for name in settings.duplicate_habit_names() {
        findings.push(Finding {
            severity: Severity::Warning,
            code: "C003".to_string(),
            message: format!("Habit name '{name}' is used more than once"),
            suggestion: Some("Rename one of the habits so tracker entries can be told apart".to_string()),
        });
    }
}

/// C004: No credentials
fn check_api_key(has_key: bool, findings: &mut Vec<Finding>) {
    if has_key {
        return;
    }
    findings.push(Finding {
        severity: Severity::Error,
        code: "C004".to_string(),
        message: "No API key configured".to_string(),
        suggestion: Some(format!(
            "Set `api_key` under [notion] in cadence.toml or export {API_KEY_ENV}"
        )),
    });
}

/// C005: Occurrences that failed in past runs, grouped by habit
fn check_failed_occurrences(log: &[RunOutcome], findings: &mut Vec<Finding>) {
    let mut by_habit: BTreeMap<&str, (usize, &str)> = BTreeMap::new();
    for failure in log.iter().flat_map(RunOutcome::failures) {
        let entry = by_habit
            .entry(failure.habit.as_str())
            .or_insert((0, failure.reason.as_str()));
        entry.0 += 1;
        entry.1 = failure.reason.as_str();
    }

    for (habit, (count, last_reason)) in by_habit {
        findings.push(Finding {
            severity: Severity::Warning,
            code: "C005".to_string(),
            message: format!(
                "Habit '{habit}' failed to record {count} time(s); last error: {last_reason}"
            ),
            suggestion: Some(format!(
                "Check that '{habit}' is an option of the tracker's Habit property"
            )),
        });
    }
}

/// C006: A single start day means one cycle per month
fn check_cycle_layout(settings: &Settings, findings: &mut Vec<Finding>) {
    let dates = &settings.cycles.dates;
    if dates.len() == 1 {
        findings.push(Finding {
            severity: Severity::Info,
            code: "C006".to_string(),
            message: format!(
                "Cycles start only on day {}; each cycle spans a whole month",
                dates.days()[0]
            ),
            suggestion: Some("Add more days to [cycles] dates for shorter cycles".to_string()),
        });
    }
}
