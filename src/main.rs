//! Cadence - habit scheduler and cycle manager
//!
//! CLI entry point.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cadence::config::API_KEY_ENV;
use cadence::habit::HabitDefinition;
use cadence::{
    diagnose, fetch_habits, render_diagnostic_report, render_run_summary, write_habits,
    CycleManager, HabitScheduler, JsonlLogger, NotionRecordStore, RecordStore, RunMode,
    RunOutcome, Settings, SettingsProvider, TomlSettingsFile,
};

/// Habit scheduler and cycle manager
///
/// Creates habit-tracker entries for every habit due on the dates of a
/// run and keeps the cycles those entries belong to up to date.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Path to the cadence.toml settings file
    #[arg(long, default_value = "cadence.toml")]
    config: PathBuf,

    /// Dates to process (defaults to the configured run mode)
    #[arg(long, value_enum)]
    mode: Option<RunMode>,

    /// Run as if today were this date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Reload habit definitions from the habits collection before running
    #[arg(long)]
    refresh_habits: bool,

    /// Diagnose settings and run history without touching the record store
    #[arg(long)]
    check: bool,

    /// Directory for the run log (.cadence by default)
    #[arg(long, default_value = ".cadence")]
    log_dir: PathBuf,
}

/// Build the scheduler and cycle manager for one run.
fn build_scheduler(
    store: Arc<dyn RecordStore>,
    settings: &Settings,
    today: NaiveDate,
) -> HabitScheduler {
    let cycles = CycleManager::new(
        store.clone(),
        settings.notion.cycles_collection.clone(),
        settings.cycles.dates.clone(),
        today,
    )
    .with_default_icon(settings.cycles.icon.clone());

    HabitScheduler::new(
        store,
        settings.notion.habit_tracker_collection.clone(),
        settings.habits.clone(),
        settings.run.holidays.calendar(),
        cycles,
    )
}

/// Fetch habits from the habits collection and persist them to `path`.
async fn refresh_habits(
    store: &dyn RecordStore,
    settings: &Settings,
    path: &Path,
) -> Result<Vec<HabitDefinition>> {
    let habits = fetch_habits(store, &settings.notion.habits_collection)
        .await
        .context("Failed to fetch habits")?;
    write_habits(path, &habits)
        .with_context(|| format!("Failed to write habits to '{}'", path.display()))?;
    eprintln!("Refreshed {} habit(s) into {}", habits.len(), path.display());
    Ok(habits)
}

/// Run the scheduler and append the outcome to the run log, whether the
/// run completed or aborted.
async fn execute_and_log(
    scheduler: &mut HabitScheduler,
    logger: &JsonlLogger,
    mode: RunMode,
    today: NaiveDate,
) -> Result<()> {
    let started = Instant::now();
    let result = scheduler.run(mode, today).await;
    let duration_secs = started.elapsed().as_secs();

    match result {
        Ok(report) => {
            let conflicts = scheduler.cycles().conflicts();
            logger
                .append(&RunOutcome::completed(&report, conflicts, duration_secs))
                .context("Failed to write to run log")?;
            render_run_summary(&report, conflicts);
            Ok(())
        }
        Err(aborted) => {
            let conflicts = scheduler.cycles().conflicts();
            logger
                .append(&RunOutcome::aborted(
                    &aborted.partial,
                    conflicts,
                    &aborted.source.to_string(),
                    duration_secs,
                ))
                .context("Failed to write to run log")?;
            if !aborted.partial.days.is_empty() {
                render_run_summary(&aborted.partial, conflicts);
            }
            Err(aborted).with_context(|| format!("Run starting {today} aborted"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadence=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings_file = TomlSettingsFile::new(&cli.config);
    let mut settings = settings_file
        .load()
        .with_context(|| format!("Failed to load settings from '{}'", cli.config.display()))?;
    let logger = JsonlLogger::new(&cli.log_dir).context("Failed to initialize run log")?;

    if cli.check {
        let history = logger.read_all().context("Failed to read run log")?;
        let report = diagnose(&settings, &history);
        render_diagnostic_report(&report);
        if report.error_count() > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let api_key = settings.api_key().with_context(|| {
        format!("No API key found: set api_key under [notion] or export {API_KEY_ENV}")
    })?;
    let store: Arc<dyn RecordStore> = Arc::new(NotionRecordStore::new(api_key));

    if cli.refresh_habits {
        settings.habits = refresh_habits(store.as_ref(), &settings, settings_file.path()).await?;
    }

    let today = cli.date.unwrap_or_else(|| Local::now().date_naive());
    let mode = cli.mode.unwrap_or(settings.run.mode);

    let mut scheduler = build_scheduler(store, &settings, today);
    execute_and_log(&mut scheduler, &logger, mode, today).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence::cycle::CycleStatus;
    use cadence::{Cycle, InMemoryRecordStore};
    use std::io::Write as IoWrite;
    use tempfile::{NamedTempFile, TempDir};

    const SETTINGS: &str = r#"
[notion]
api_key = "secret"
habit_tracker_collection = "tracker"
cycles_collection = "cycles"
habits_collection = "habits"

[cycles]
dates = [1, 15]

[run]
holidays = "none"

[[habit]]
id = "h1"
name = "Read"
frequency = "Daily"

[[habit]]
id = "h2"
name = "Lift"
frequency = "2x Week"
"#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["cadence"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("cadence.toml"));
        assert_eq!(cli.log_dir, PathBuf::from(".cadence"));
        assert!(cli.mode.is_none());
        assert!(cli.date.is_none());
        assert!(!cli.check);
        assert!(!cli.refresh_habits);
    }

    #[test]
    fn test_cli_parses_mode_and_date() {
        let cli = Cli::try_parse_from([
            "cadence",
            "--mode",
            "weekly",
            "--date",
            "2023-04-10",
            "--refresh-habits",
        ])
        .unwrap();
        assert_eq!(cli.mode, Some(RunMode::Weekly));
        assert_eq!(cli.date, Some(date(2023, 4, 10)));
        assert!(cli.refresh_habits);
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["cadence", "--date", "10/04/2023"]).is_err());
        assert!(Cli::try_parse_from(["cadence", "--mode", "hourly"]).is_err());
    }

    #[tokio::test]
    async fn test_execute_and_log_records_completed_run() {
        let settings = Settings::parse(SETTINGS).unwrap();
        let store = Arc::new(InMemoryRecordStore::new());
        let temp_dir = TempDir::new().unwrap();
        let logger = JsonlLogger::new(temp_dir.path()).unwrap();
        let today = date(2023, 4, 10);

        let mut scheduler = build_scheduler(store.clone(), &settings, today);
        execute_and_log(&mut scheduler, &logger, RunMode::Weekly, today)
            .await
            .unwrap();

        // Read on all seven dates, Lift on Tuesday and Thursday.
        assert_eq!(store.records("tracker").len(), 9);
        let cycles: Vec<Cycle> = store
            .records("cycles")
            .iter()
            .filter_map(Cycle::from_record)
            .collect();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].status, CycleStatus::Archive);
        assert_eq!(cycles[1].status, CycleStatus::Active);
        assert_eq!(cycles[1].start, date(2023, 4, 15));

        let history = logger.read_all().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].days.len(), 7);
        assert_eq!(history[0].created_count(), 9);
    }

    #[tokio::test]
    async fn test_execute_and_log_records_aborted_run() {
        let settings = Settings::parse(SETTINGS).unwrap();
        let store = Arc::new(InMemoryRecordStore::new());
        store.fail_queries();
        let temp_dir = TempDir::new().unwrap();
        let logger = JsonlLogger::new(temp_dir.path()).unwrap();
        let today = date(2023, 4, 10);

        let mut scheduler = build_scheduler(store, &settings, today);
        let err = execute_and_log(&mut scheduler, &logger, RunMode::Daily, today)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("aborted"));
        let history = logger.read_all().unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].error.as_deref().unwrap().contains("503"));
        assert!(history[0].days.is_empty());
    }

    #[tokio::test]
    async fn test_execute_and_log_keeps_days_before_abort() {
        let settings = Settings::parse(SETTINGS).unwrap();
        let today = date(2023, 4, 10);

        // Queries needed to resolve the cycle for the first date alone.
        let reference = Arc::new(InMemoryRecordStore::new());
        build_scheduler(reference.clone(), &settings, today)
            .run(RunMode::Daily, today)
            .await
            .unwrap();

        let store = Arc::new(InMemoryRecordStore::new());
        store.fail_queries_after(reference.query_count());
        let temp_dir = TempDir::new().unwrap();
        let logger = JsonlLogger::new(temp_dir.path()).unwrap();

        let mut scheduler = build_scheduler(store.clone(), &settings, today);
        let err = execute_and_log(&mut scheduler, &logger, RunMode::Weekly, today)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("aborted"));
        let history = logger.read_all().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, cadence::log::RunStatus::Aborted);
        // 10th through 14th share the cached cycle; the boundary on the 15th fails.
        let dates: Vec<NaiveDate> = history[0].days.iter().map(|d| d.date).collect();
        let expected: Vec<NaiveDate> = (10..=14).map(|d| date(2023, 4, d)).collect();
        assert_eq!(dates, expected);
        assert_eq!(history[0].created_count(), store.records("tracker").len());
    }

    #[tokio::test]
    async fn test_refresh_habits_rewrites_settings() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SETTINGS.as_bytes()).unwrap();
        let settings = Settings::parse(SETTINGS).unwrap();

        let store = InMemoryRecordStore::new();
        store.insert(
            "habits",
            cadence::store::Fields::from([
                (
                    "Name".to_string(),
                    cadence::store::FieldValue::Title("Swim".to_string()),
                ),
                (
                    "Frequency".to_string(),
                    cadence::store::FieldValue::Select("1x Week".to_string()),
                ),
            ]),
            None,
        );

        let habits = refresh_habits(&store, &settings, file.path()).await.unwrap();

        assert_eq!(habits.len(), 1);
        let reloaded = TomlSettingsFile::new(file.path()).load().unwrap();
        assert_eq!(reloaded.habits, habits);
        assert_eq!(reloaded.notion.cycles_collection, "cycles");
    }
}
