//! Habit definitions
//!
//! A habit is due on a date either because the date's weekday is in its
//! explicit day list, or, when no list is given, because its frequency
//! rule selects that weekday.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::habit::calendar::HolidayCalendar;
use crate::store::Icon;

/// How often a habit recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    /// Every day
    Daily,
    /// Monday to Friday, skipping public holidays
    Workday,
    /// Wednesday
    OnceAWeek,
    /// Tuesday and Thursday
    TwiceAWeek,
    /// Monday, Wednesday and Friday
    ThreeTimesAWeek,
    /// Monday, Tuesday, Thursday and Saturday
    FourTimesAWeek,
    /// Every day but Thursday and Sunday
    FiveTimesAWeek,
    /// Every day but Sunday
    SixTimesAWeek,
}

impl Frequency {
    /// Target occurrences per week for the `Nx Week` rules.
    #[must_use]
    pub const fn weekly_count(self) -> Option<usize> {
        match self {
            Self::Daily | Self::Workday => None,
            Self::OnceAWeek => Some(1),
            Self::TwiceAWeek => Some(2),
            Self::ThreeTimesAWeek => Some(3),
            Self::FourTimesAWeek => Some(4),
            Self::FiveTimesAWeek => Some(5),
            Self::SixTimesAWeek => Some(6),
        }
    }

    /// Whether the rule selects `weekday`.
    #[must_use]
    pub const fn is_due(self, weekday: Weekday, is_holiday: bool) -> bool {
        use Weekday::{Fri, Mon, Sat, Sun, Thu, Tue, Wed};

        match self {
            Self::Daily => true,
            Self::Workday => !is_holiday && !matches!(weekday, Sat | Sun),
            Self::OnceAWeek => matches!(weekday, Wed),
            Self::TwiceAWeek => matches!(weekday, Tue | Thu),
            Self::ThreeTimesAWeek => matches!(weekday, Mon | Wed | Fri),
            Self::FourTimesAWeek => matches!(weekday, Mon | Tue | Thu | Sat),
            Self::FiveTimesAWeek => matches!(weekday, Mon | Tue | Wed | Fri | Sat),
            Self::SixTimesAWeek => !matches!(weekday, Sun),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("Daily"),
            Self::Workday => f.write_str("Workday"),
            other => write!(f, "{}x Week", other.weekly_count().unwrap_or_default()),
        }
    }
}

impl FromStr for Frequency {
    type Err = ConfigError;

    /// Accepts `Daily`, `Workday` and `Nx Week` in any case, with or
    /// without a space or slash before `Week`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '/')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "daily" => Ok(Self::Daily),
            "workday" => Ok(Self::Workday),
            "1xweek" => Ok(Self::OnceAWeek),
            "2xweek" => Ok(Self::TwiceAWeek),
            "3xweek" => Ok(Self::ThreeTimesAWeek),
            "4xweek" => Ok(Self::FourTimesAWeek),
            "5xweek" => Ok(Self::FiveTimesAWeek),
            "6xweek" => Ok(Self::SixTimesAWeek),
            _ => Err(ConfigError::UnknownFrequency(s.to_string())),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(frequency: Frequency) -> Self {
        frequency.to_string()
    }
}

/// Whether a habit is being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HabitStatus {
    /// Occurrences are created
    #[default]
    #[serde(alias = "on", alias = "ON")]
    On,
    /// The habit is paused
    #[serde(alias = "off", alias = "OFF")]
    Off,
}

impl FromStr for HabitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            _ => Err(format!("unknown habit status '{s}'")),
        }
    }
}

/// A recurring habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitDefinition {
    /// Identifier of the habit record
    pub id: String,
    /// Display name, also used as the tracker's habit option
    pub name: String,
    /// Recurrence rule
    pub frequency: Frequency,
    /// Explicit weekdays, overriding `frequency` when present
    #[serde(default, skip_serializing_if = "Option::is_none", with = "weekday_list")]
    pub days: Option<Vec<Weekday>>,
    /// Tracking status
    #[serde(default)]
    pub status: HabitStatus,
    /// Icon copied onto each occurrence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
}

impl HabitDefinition {
    /// Whether occurrences should be created at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.status == HabitStatus::On
    }

    /// Whether the habit is due on `date`.
    #[must_use]
    pub fn is_due(&self, date: NaiveDate, calendar: &dyn HolidayCalendar) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let weekday = date.weekday();
        match &self.days {
            Some(days) => days.contains(&weekday),
            None => self
                .frequency
                .is_due(weekday, self.frequency == Frequency::Workday && calendar.is_holiday(date)),
        }
    }
}

/// English name of a weekday.
#[must_use]
pub const fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parse a weekday from its English name or three-letter abbreviation,
/// ignoring case and surrounding whitespace.
pub fn parse_weekday(name: &str) -> Result<Weekday, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Ok(Weekday::Mon),
        "tuesday" | "tue" => Ok(Weekday::Tue),
        "wednesday" | "wed" => Ok(Weekday::Wed),
        "thursday" | "thu" => Ok(Weekday::Thu),
        "friday" | "fri" => Ok(Weekday::Fri),
        "saturday" | "sat" => Ok(Weekday::Sat),
        "sunday" | "sun" => Ok(Weekday::Sun),
        _ => Err(ConfigError::UnknownWeekday(name.trim().to_string())),
    }
}

/// Parse a comma-separated weekday list such as `"Monday, Thursday"`.
/// Blank input yields `None`.
pub fn parse_weekday_list(text: &str) -> Result<Option<Vec<Weekday>>, ConfigError> {
    parse_weekdays(text.split(','))
}

fn parse_weekdays<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> Result<Option<Vec<Weekday>>, ConfigError> {
    let days = names
        .into_iter()
        .filter(|n| !n.trim().is_empty())
        .map(parse_weekday)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((!days.is_empty()).then_some(days))
}

/// Serde adapter accepting either `"Monday, Friday"` or
/// `["Monday", "Friday"]`, written back as a list of full names.
mod weekday_list {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_weekday_list, parse_weekdays, weekday_name};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Csv(String),
        List(Vec<String>),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<Weekday>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parsed = match Option::<Repr>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(Repr::Csv(text)) => parse_weekday_list(&text),
            Some(Repr::List(names)) => parse_weekdays(names.iter().map(String::as_str)),
        };
        parsed.map_err(serde::de::Error::custom)
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(days: &Option<Vec<Weekday>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match days {
            Some(days) => serializer.collect_seq(days.iter().map(|d| weekday_name(*d))),
            None => serializer.serialize_none(),
        }
    }
}
