//! Settings parser
//!
//! Parses `cadence.toml` into collection ids, cycle dates, run options
//! and habit definitions. Habits can be rewritten in place after a
//! catalog refresh without disturbing the rest of the file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use toml_edit::{ArrayOfTables, DocumentMut, Item, Table};

use crate::cycle::boundary::CycleDates;
use crate::error::ConfigError;
use crate::habit::calendar::HolidayRegion;
use crate::habit::definition::HabitDefinition;
use crate::habit::scheduler::RunMode;
use crate::store::Icon;

/// Environment variable that overrides `notion.api_key`.
pub const API_KEY_ENV: &str = "CADENCE_API_KEY";

/// Record store access
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotionSettings {
    /// Integration token, unless provided through the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Collection receiving habit occurrences
    #[serde(default)]
    pub habit_tracker_collection: String,
    /// Collection holding cycles
    #[serde(default)]
    pub cycles_collection: String,
    /// Collection holding habit definitions
    #[serde(default)]
    pub habits_collection: String,
}

/// Cycle layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleSettings {
    /// Days of the month on which cycles start
    pub dates: CycleDates,
    /// Icon for new cycles when no previous cycle provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
}

/// Run defaults
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSettings {
    /// Dates covered when no mode is given on the command line
    #[serde(default)]
    pub mode: RunMode,
    /// Holiday calendar for `Workday` habits
    #[serde(default)]
    pub holidays: HolidayRegion,
}

/// Top-level settings parsed from cadence.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Record store access
    pub notion: NotionSettings,
    /// Cycle layout
    pub cycles: CycleSettings,
    /// Run defaults
    #[serde(default)]
    pub run: RunSettings,
    /// Habit definitions
    #[serde(default, rename = "habit")]
    pub habits: Vec<HabitDefinition>,
}

impl Settings {
    /// Parse settings content from a string
    ///
    /// # Errors
    /// Returns an error if the content is not valid TOML, does not match
    /// the schema, or fails validation.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check invariants serde cannot express.
    ///
    /// # Errors
    /// Returns the first blank collection id or blank habit field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let collections = [
            (
                "notion.habit_tracker_collection",
                &self.notion.habit_tracker_collection,
            ),
            ("notion.cycles_collection", &self.notion.cycles_collection),
            ("notion.habits_collection", &self.notion.habits_collection),
        ];
        for (key, value) in collections {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }

        for (i, habit) in self.habits.iter().enumerate() {
            if habit.id.trim().is_empty() {
                return Err(ConfigError::InvalidHabit {
                    index: i + 1,
                    field: "id",
                });
            }
            if habit.name.trim().is_empty() {
                return Err(ConfigError::InvalidHabit {
                    index: i + 1,
                    field: "name",
                });
            }
        }

        Ok(())
    }

    /// The API key, preferring the environment over the file.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(self.notion.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())
    }

    /// Habits with status `On`.
    pub fn enabled_habits(&self) -> impl Iterator<Item = &HabitDefinition> {
        self.habits.iter().filter(|h| h.is_enabled())
    }

    /// Names used by more than one habit, each reported once.
    #[must_use]
    pub fn duplicate_habit_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for habit in &self.habits {
            let name = habit.name.as_str();
            if !seen.insert(name) && !duplicates.contains(&name) {
                duplicates.push(name);
            }
        }
        duplicates
    }
}

/// Pick the first non-blank key, `env` taking precedence over `file`.
#[must_use]
pub fn resolve_api_key(file: Option<&str>, env: Option<String>) -> Option<String> {
    env.filter(|k| !k.trim().is_empty())
        .or_else(|| file.filter(|k| !k.trim().is_empty()).map(str::to_string))
}

/// Source of settings for a run.
pub trait SettingsProvider {
    /// Load and validate the settings.
    ///
    /// # Errors
    /// Returns an error if the settings are unreadable or invalid.
    fn load(&self) -> Result<Settings, ConfigError>;
}

/// Settings stored in a TOML file on disk
#[derive(Debug, Clone)]
pub struct TomlSettingsFile {
    path: PathBuf,
}

impl TomlSettingsFile {
    /// Settings at `path`
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsProvider for TomlSettingsFile {
    fn load(&self) -> Result<Settings, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        Settings::parse(&content)
    }
}

#[derive(Serialize)]
struct HabitTables<'a> {
    habit: &'a [HabitDefinition],
}

/// Replace the `[[habit]]` tables of the settings file at `path`.
/// Everything else in the file, comments included, is kept as written.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed or written.
pub fn write_habits(path: &Path, habits: &[HabitDefinition]) -> Result<(), ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut doc: DocumentMut = content.parse()?;

    doc.remove("habit");
    if !habits.is_empty() {
        doc.insert("habit", Item::ArrayOfTables(habit_tables(habits)?));
    }

    fs::write(path, doc.to_string()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Render habits as fresh `[[habit]]` tables. Nested values such as
/// `icon` are written inline so each habit stays a single table.
fn habit_tables(habits: &[HabitDefinition]) -> Result<ArrayOfTables, ConfigError> {
    let rendered: DocumentMut = toml::to_string(&HabitTables { habit: habits })?.parse()?;

    let mut tables = ArrayOfTables::new();
    for habit in rendered
        .get("habit")
        .and_then(Item::as_array_of_tables)
        .into_iter()
        .flatten()
    {
        let mut table = Table::new();
        for (key, item) in habit {
            if let Ok(value) = item.clone().into_value() {
                table.insert(key, Item::Value(value));
            }
        }
        tables.push(table);
    }
    Ok(tables)
}
