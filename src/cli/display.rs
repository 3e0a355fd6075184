//! Rich CLI display for runs and diagnostics
//!
//! All output goes to stderr so stdout remains clean for piping.

use chrono::NaiveDate;
use colored::Colorize;

use crate::cycle::manager::CycleConflict;
use crate::doctor::{DiagnosticReport, Severity};
use crate::habit::scheduler::{DayReport, RunMode, RunReport};

/// Display handler for a run
pub struct RunDisplay {
    mode: RunMode,
    today: NaiveDate,
}

impl RunDisplay {
    /// Create a display handler for a run anchored at `today`
    #[must_use]
    pub const fn new(mode: RunMode, today: NaiveDate) -> Self {
        Self { mode, today }
    }

    /// Print the run header
    pub fn print_header(&self) {
        eprintln!(
            "\n{} {}",
            "===".bold().cyan(),
            format!("Cadence: {} run from {}", self.mode, self.today)
                .bold()
                .cyan()
        );
        eprintln!("{}", "─".repeat(50).dimmed());
    }

    /// Render one processed date
    pub fn render_day(&self, day: &DayReport) {
        eprintln!("  {}", format_day_line(day));
        for failure in &day.failed {
            eprintln!(
                "    {} {} {}",
                "✗".red().bold(),
                failure.habit.bold(),
                truncate(&failure.reason, 100).red()
            );
        }
    }

    /// Render the post-run summary
    pub fn render_summary(&self, report: &RunReport, conflicts: &[CycleConflict]) {
        eprintln!("{}", "─".repeat(50).dimmed());

        let failed = report.failed_count();
        let status = if failed == 0 {
            "COMPLETED".green().bold().to_string()
        } else {
            "COMPLETED WITH FAILURES".yellow().bold().to_string()
        };
        eprintln!("  {status}");
        eprintln!(
            "  {} {} date(s) | {} created | {failed} failed",
            "Stats:".dimmed(),
            report.days.len(),
            report.created_count()
        );

        for conflict in conflicts {
            eprintln!("  {} {conflict}", "⚠".yellow().bold());
        }

        eprintln!();
    }
}

/// Print a full run: header, each date and the summary
pub fn render_run_summary(report: &RunReport, conflicts: &[CycleConflict]) {
    let display = RunDisplay::new(report.mode, report.today);
    display.print_header();
    for day in &report.days {
        display.render_day(day);
    }
    display.render_summary(report, conflicts);
}

/// Print a diagnostic report
pub fn render_diagnostic_report(report: &DiagnosticReport) {
    if report.is_clean() {
        eprintln!("{} No issues found", "✓".green().bold());
        return;
    }

    for finding in &report.findings {
        let label = match finding.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
        };
        eprintln!("{label} [{}] {}", finding.code.dimmed(), finding.message);
        if let Some(suggestion) = &finding.suggestion {
            eprintln!("  {} {suggestion}", "→".dimmed());
        }
    }

    eprintln!(
        "\n{} error(s), {} warning(s), {} info",
        report.error_count(),
        report.warning_count(),
        report.info_count()
    );
}

/// One-line summary of a processed date
fn format_day_line(day: &DayReport) -> String {
    let created = if day.created.is_empty() {
        "nothing due".to_string()
    } else {
        day.created.join(", ")
    };
    format!(
        "{} {} [{}] {created}",
        day.date,
        day.date.format("%a"),
        day.cycle_name
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars - 3).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
