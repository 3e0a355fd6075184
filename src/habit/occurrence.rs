//! Habit occurrence records written to the habit tracker

use chrono::NaiveDate;

use crate::habit::definition::HabitDefinition;
use crate::store::{FieldValue, Fields, Icon};

/// Title property of a tracker entry.
pub const NAME_PROPERTY: &str = "Name";
/// Date of the occurrence.
pub const DATE_PROPERTY: &str = "Date";
/// Relation to the owning cycle.
pub const CYCLE_PROPERTY: &str = "Cycle";
/// Checkbox set when the habit was done.
pub const PROGRESS_PROPERTY: &str = "Progress";
/// Checkbox set when the day does not count either way.
pub const NEUTRAL_PROPERTY: &str = "Neutral";
/// Checkbox set until the habit is done.
pub const MISSED_PROPERTY: &str = "Missed";
/// Free-form notes about a setback.
pub const SETBACK_NOTES_PROPERTY: &str = "Setback Notes";
/// Select keyed by habit name.
pub const HABIT_PROPERTY: &str = "Habit";
/// Relation to the habit record.
pub const HABIT_RELATION_PROPERTY: &str = "Habit (Relation)";

/// One due habit on one date, written once and never read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitOccurrence {
    /// Name of the habit
    pub habit_name: String,
    /// Id of the habit record
    pub habit_id: String,
    /// Date the habit is due
    pub date: NaiveDate,
    /// Id of the cycle owning the date
    pub cycle_id: String,
    /// Icon copied from the habit
    pub icon: Option<Icon>,
}

impl HabitOccurrence {
    /// A fresh occurrence, recorded as missed until the user checks it off.
    #[must_use]
    pub fn new(habit: &HabitDefinition, date: NaiveDate, cycle_id: &str) -> Self {
        Self {
            habit_name: habit.name.clone(),
            habit_id: habit.id.clone(),
            date,
            cycle_id: cycle_id.to_string(),
            icon: habit.icon.clone(),
        }
    }

    /// Tracker fields for a new entry.
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let text = |s: &str| s.to_string();
        Fields::from([
            (text(NAME_PROPERTY), FieldValue::Title(self.habit_name.clone())),
            (
                text(DATE_PROPERTY),
                FieldValue::Date {
                    start: self.date,
                    end: None,
                },
            ),
            (
                text(CYCLE_PROPERTY),
                FieldValue::Relation(vec![self.cycle_id.clone()]),
            ),
            (text(PROGRESS_PROPERTY), FieldValue::Checkbox(false)),
            (text(NEUTRAL_PROPERTY), FieldValue::Checkbox(false)),
            (text(MISSED_PROPERTY), FieldValue::Checkbox(true)),
            (text(SETBACK_NOTES_PROPERTY), FieldValue::RichText(String::new())),
            (text(HABIT_PROPERTY), FieldValue::Select(self.habit_name.clone())),
            (
                text(HABIT_RELATION_PROPERTY),
                FieldValue::Relation(vec![self.habit_id.clone()]),
            ),
        ])
    }
}
