//! Public holiday calendars used by the `Workday` frequency

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Answers whether a date is a public holiday.
pub trait HolidayCalendar: Send + Sync {
    /// Whether `date` is a holiday.
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// Calendar with no holidays.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

impl HolidayCalendar for NoHolidays {
    fn is_holiday(&self, _date: NaiveDate) -> bool {
        false
    }
}

/// United States federal holidays, including observed days for fixed-date
/// holidays that fall on a weekend.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsFederalHolidays;

impl UsFederalHolidays {
    /// All federal holidays observed in `year`, in no particular order.
    #[must_use]
    pub fn holidays_in(year: i32) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(12);

        // New Year's Day of the following year can be observed on Dec 31.
        for (y, month, day) in [
            (year, 1, 1),
            (year, 6, 19),
            (year, 7, 4),
            (year, 11, 11),
            (year, 12, 25),
            (year + 1, 1, 1),
        ] {
            if month == 6 && y < 2021 {
                continue;
            }
            if let Some(date) = NaiveDate::from_ymd_opt(y, month, day) {
                let observed = observed(date);
                if observed.year() == year {
                    days.push(observed);
                }
            }
        }

        let floating = [
            (year >= 1986).then(|| nth_weekday(year, 1, Weekday::Mon, 3)),
            Some(nth_weekday(year, 2, Weekday::Mon, 3)),
            Some(last_weekday(year, 5, Weekday::Mon)),
            Some(nth_weekday(year, 9, Weekday::Mon, 1)),
            Some(nth_weekday(year, 10, Weekday::Mon, 2)),
            Some(nth_weekday(year, 11, Weekday::Thu, 4)),
        ];
        days.extend(floating.into_iter().flatten().flatten());
        days
    }
}

impl HolidayCalendar for UsFederalHolidays {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        Self::holidays_in(date.year()).contains(&date)
    }
}

/// Which holiday calendar to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayRegion {
    /// United States federal holidays
    #[default]
    Us,
    /// No holidays
    None,
}

impl HolidayRegion {
    /// The calendar for this region.
    #[must_use]
    pub fn calendar(self) -> Box<dyn HolidayCalendar> {
        match self {
            Self::Us => Box::new(UsFederalHolidays),
            Self::None => Box::new(NoHolidays),
        }
    }
}

/// Saturday holidays are observed on Friday, Sunday holidays on Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Days::new(1),
        Weekday::Sun => date + Days::new(1),
        _ => date,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    nth_weekday(year, month, weekday, 5).or_else(|| nth_weekday(year, month, weekday, 4))
}
