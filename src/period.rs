//! Reporting periods and the Russian calendar names used in report labels.

use crate::Result;
use anyhow::{ensure, Context};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The display format for dates in report titles and on the command line.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

const DAY_NAMES: [&str; 7] = [
    "Понедельник",
    "Вторник",
    "Среда",
    "Четверг",
    "Пятница",
    "Суббота",
    "Воскресенье",
];

const MONTH_NAMES: [&str; 12] = [
    "Январь",
    "Февраль",
    "Март",
    "Апрель",
    "Май",
    "Июнь",
    "Июль",
    "Август",
    "Сентябрь",
    "Октябрь",
    "Ноябрь",
    "Декабрь",
];

/// The localized day name for an ISO weekday number (Monday = 1), or `""` when out of range.
pub fn day_name(number: u32) -> &'static str {
    number
        .checked_sub(1)
        .and_then(|ix| DAY_NAMES.get(ix as usize))
        .copied()
        .unwrap_or("")
}

/// The localized month name for a month number (January = 1), or `""` when out of range.
pub fn month_name(number: u32) -> &'static str {
    number
        .checked_sub(1)
        .and_then(|ix| MONTH_NAMES.get(ix as usize))
        .copied()
        .unwrap_or("")
}

/// The 1-based week of the month a day falls in, counting 7-day blocks from the 1st.
pub fn week_of_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Period {
    from: NaiveDate,
    to: NaiveDate,
}

impl Period {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        ensure!(
            from <= to,
            "The period start {} is after its end {}",
            from.format(DATE_FORMAT),
            to.format(DATE_FORMAT)
        );
        Ok(Self { from, to })
    }

    /// Parses a custom period from two `dd.mm.yyyy` strings.
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// The first day after the period, which the OLAP endpoint wants as an exclusive bound.
    pub fn end_exclusive(&self) -> NaiveDate {
        self.to.checked_add_days(Days::new(1)).unwrap_or(self.to)
    }

    /// e.g. `"03 (Март)"`, the label the pivot sheet puts over every group column.
    pub fn month_label(&self) -> String {
        format!("{:02} ({})", self.from.month(), month_name(self.from.month()))
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.from.format(DATE_FORMAT),
            self.to.format(DATE_FORMAT)
        )
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .with_context(|| format!("Unable to parse '{s}' as a dd.mm.yyyy date"))
}

/// The quick period choices.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    serde::Serialize,
    serde::Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodPreset {
    Today,
    Yesterday,
    CurrentWeek,
    LastWeek,
    #[default]
    CurrentMonth,
    LastMonth,
    CurrentYear,
    LastYear,
}

serde_plain::derive_display_from_serialize!(PeriodPreset);
serde_plain::derive_fromstr_from_deserialize!(PeriodPreset);

impl PeriodPreset {
    /// Resolves the preset relative to `today`. Weeks start on Monday.
    pub fn resolve(self, today: NaiveDate) -> Period {
        let week_start = today - Days::new(u64::from(today.weekday().num_days_from_monday()));
        let month_start = today.with_day(1).unwrap_or(today);
        let (from, to) = match self {
            PeriodPreset::Today => (today, today),
            PeriodPreset::Yesterday => {
                let y = today - Days::new(1);
                (y, y)
            }
            PeriodPreset::CurrentWeek => (week_start, week_start + Days::new(6)),
            PeriodPreset::LastWeek => {
                let start = week_start - Days::new(7);
                (start, start + Days::new(6))
            }
            PeriodPreset::CurrentMonth => {
                (month_start, month_start + Months::new(1) - Days::new(1))
            }
            PeriodPreset::LastMonth => (month_start - Months::new(1), month_start - Days::new(1)),
            PeriodPreset::CurrentYear => (ymd(today.year(), 1, 1), ymd(today.year(), 12, 31)),
            PeriodPreset::LastYear => (
                ymd(today.year() - 1, 1, 1),
                ymd(today.year() - 1, 12, 31),
            ),
        };
        Period { from, to }
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_day_and_month_names() {
        assert_eq!(day_name(1), "Понедельник");
        assert_eq!(day_name(7), "Воскресенье");
        assert_eq!(day_name(0), "");
        assert_eq!(day_name(8), "");
        assert_eq!(month_name(3), "Март");
        assert_eq!(month_name(13), "");
    }

    #[test]
    fn test_week_of_month() {
        assert_eq!(week_of_month(d(2024, 3, 1)), 1);
        assert_eq!(week_of_month(d(2024, 3, 7)), 1);
        assert_eq!(week_of_month(d(2024, 3, 8)), 2);
        assert_eq!(week_of_month(d(2024, 3, 29)), 5);
    }

    #[test]
    fn test_presets() {
        // A Wednesday
        let today = d(2024, 3, 13);
        let check = |p: PeriodPreset, from: NaiveDate, to: NaiveDate| {
            let period = p.resolve(today);
            assert_eq!((period.from(), period.to()), (from, to), "{p}");
        };
        check(PeriodPreset::Today, today, today);
        check(PeriodPreset::Yesterday, d(2024, 3, 12), d(2024, 3, 12));
        check(PeriodPreset::CurrentWeek, d(2024, 3, 11), d(2024, 3, 17));
        check(PeriodPreset::LastWeek, d(2024, 3, 4), d(2024, 3, 10));
        check(PeriodPreset::CurrentMonth, d(2024, 3, 1), d(2024, 3, 31));
        check(PeriodPreset::LastMonth, d(2024, 2, 1), d(2024, 2, 29));
        check(PeriodPreset::CurrentYear, d(2024, 1, 1), d(2024, 12, 31));
        check(PeriodPreset::LastYear, d(2023, 1, 1), d(2023, 12, 31));
    }

    #[test]
    fn test_last_month_across_year() {
        let period = PeriodPreset::LastMonth.resolve(d(2024, 1, 20));
        assert_eq!(period.from(), d(2023, 12, 1));
        assert_eq!(period.to(), d(2023, 12, 31));
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(PeriodPreset::CurrentMonth.to_string(), "current-month");
        assert_eq!(
            PeriodPreset::from_str("last-week").unwrap(),
            PeriodPreset::LastWeek
        );
    }

    #[test]
    fn test_parse_custom_period() {
        let period = Period::parse("01.03.2024", "15.03.2024").unwrap();
        assert_eq!(period.to_string(), "01.03.2024-15.03.2024");
        assert_eq!(period.end_exclusive(), d(2024, 3, 16));
        assert_eq!(period.month_label(), "03 (Март)");
    }

    #[test]
    fn test_parse_rejects_reversed_and_garbage() {
        assert!(Period::parse("15.03.2024", "01.03.2024").is_err());
        assert!(Period::parse("2024-03-01", "15.03.2024").is_err());
    }
}
