//! Habit catalog refresh from the habits collection

use tracing::{info, warn};

use crate::error::{ConfigError, RecordStoreError};
use crate::habit::definition::{parse_weekday_list, Frequency, HabitDefinition, HabitStatus};
use crate::store::{Record, RecordStore};

/// Title property of a habit record.
pub const NAME_PROPERTY: &str = "Name";
/// Frequency select of a habit record.
pub const FREQUENCY_PROPERTY: &str = "Frequency";
/// Status select of a habit record.
pub const STATUS_PROPERTY: &str = "Status";
/// Optional comma-separated weekdays of a habit record.
pub const DAYS_PROPERTY: &str = "Days";

/// Load every habit from the habits collection. Records that do not
/// describe a valid habit are skipped with a warning.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn fetch_habits(
    store: &dyn RecordStore,
    habits_collection: &str,
) -> Result<Vec<HabitDefinition>, RecordStoreError> {
    let records = store.query(habits_collection, None).await?;
    let total = records.len();

    let habits: Vec<HabitDefinition> = records
        .iter()
        .filter_map(|record| match habit_from_record(record) {
            Ok(habit) => Some(habit),
            Err(err) => {
                warn!(record = %record.id, error = %err, "skipping habit record");
                None
            }
        })
        .collect();

    info!(fetched = habits.len(), skipped = total - habits.len(), "refreshed habits");
    Ok(habits)
}

/// Convert a habit record. Only a status of `On` enables the habit;
/// any other or missing status leaves it `Off`.
///
/// # Errors
/// Returns an error if the name or frequency is missing, or if the
/// frequency or a weekday is not recognized.
pub fn habit_from_record(record: &Record) -> Result<HabitDefinition, ConfigError> {
    let name = record
        .title(NAME_PROPERTY)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ConfigError::Missing("habit name"))?;
    let frequency: Frequency = record
        .select(FREQUENCY_PROPERTY)
        .ok_or(ConfigError::Missing("habit frequency"))?
        .parse()?;
    let status = match record.select(STATUS_PROPERTY) {
        Some(s) if s.trim().eq_ignore_ascii_case("on") => HabitStatus::On,
        _ => HabitStatus::Off,
    };
    let days = match record.rich_text(DAYS_PROPERTY) {
        Some(text) => parse_weekday_list(text)?,
        None => None,
    };

    Ok(HabitDefinition {
        id: record.id.clone(),
        name: name.to_string(),
        frequency,
        days,
        status,
        icon: record.icon.clone(),
    })
}
