//! Shared test utilities
//!
//! Common helpers used across test modules. Only compiled in test builds.

use chrono::{NaiveDate, Utc};

use crate::habit::definition::{Frequency, HabitDefinition, HabitStatus};
use crate::habit::scheduler::{DayReport, FailedOccurrence, RunMode};
use crate::log::jsonl::{RunOutcome, RunStatus};

/// An enabled habit named `name` with no explicit days.
#[must_use]
pub fn make_habit(name: &str, frequency: Frequency) -> HabitDefinition {
    HabitDefinition {
        id: format!("habit-{}", name.to_lowercase().replace(' ', "-")),
        name: name.to_string(),
        frequency,
        days: None,
        status: HabitStatus::On,
        icon: None,
    }
}

/// One habit per frequency, named after it, plus `3x Week days` which
/// overrides its frequency with Monday, Thursday and Friday.
#[must_use]
pub fn sample_habits() -> Vec<HabitDefinition> {
    let mut habits: Vec<HabitDefinition> = [
        Frequency::Daily,
        Frequency::Workday,
        Frequency::OnceAWeek,
        Frequency::TwiceAWeek,
        Frequency::ThreeTimesAWeek,
        Frequency::FourTimesAWeek,
        Frequency::FiveTimesAWeek,
        Frequency::SixTimesAWeek,
    ]
    .into_iter()
    .map(|f| make_habit(&f.to_string(), f))
    .collect();

    let mut custom = make_habit("3x Week days", Frequency::ThreeTimesAWeek);
    custom.days = Some(vec![
        chrono::Weekday::Mon,
        chrono::Weekday::Thu,
        chrono::Weekday::Fri,
    ]);
    habits.push(custom);
    habits
}

/// A day report for 2023-04-10 with the given created and failed habits.
#[must_use]
pub fn make_day_report(created: &[&str], failed: &[&str]) -> DayReport {
    DayReport {
        date: NaiveDate::from_ymd_opt(2023, 4, 10).unwrap(),
        cycle_id: "cycle-1".to_string(),
        cycle_name: "April".to_string(),
        created: created.iter().map(ToString::to_string).collect(),
        failed: failed
            .iter()
            .map(|habit| FailedOccurrence {
                habit: (*habit).to_string(),
                reason: "API error (500): boom".to_string(),
            })
            .collect(),
    }
}

/// A completed daily `RunOutcome` holding `days`.
#[must_use]
pub fn make_test_outcome(days: Vec<DayReport>) -> RunOutcome {
    RunOutcome {
        timestamp: Utc::now(),
        today: NaiveDate::from_ymd_opt(2023, 4, 10).unwrap(),
        mode: RunMode::Daily,
        status: RunStatus::Completed,
        error: None,
        days,
        conflicts: Vec::new(),
        duration_secs: 2,
    }
}
