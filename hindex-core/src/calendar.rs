//! Calendar-aware decoding of CF style time coordinates.
//!
//! Model output stores time as an offset from a reference date (`days since 1960-01-01`)
//! interpreted in the model's own calendar. Seasonal grouping only needs the calendar
//! year and month of every time step, which is what this module recovers.
//!
//! The `standard`/`gregorian` calendar is treated as proleptic Gregorian; hindcast
//! records never reach back to the 1582 Julian/Gregorian switch.
//!
//! ```rust
//! use hindex_core::calendar::{Calendar, TimeUnits, YearMonth};
//!
//! let units = TimeUnits::parse("days since 1960-01-01").unwrap();
//! assert_eq!(units.year_month(45.0, Calendar::Day360).unwrap(), YearMonth::new(1960, 2));
//! assert_eq!(units.year_month(45.0, Calendar::Standard).unwrap(), YearMonth::new(1960, 2));
//! ```

use crate::errors::{HindexError, HindexResult};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const CUMULATIVE_DAYS: [i64; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

/// Calendars used by CMIP-style model output
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    /// Mixed Gregorian calendar, handled as proleptic Gregorian
    #[default]
    Standard,
    ProlepticGregorian,
    Julian,
    /// 365 days every year
    NoLeap,
    /// 366 days every year
    AllLeap,
    /// Twelve 30-day months
    Day360,
}

impl Calendar {
    pub fn is_leap_year(&self, year: i32) -> bool {
        match self {
            Calendar::Standard | Calendar::ProlepticGregorian => {
                (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
            }
            Calendar::Julian => year.rem_euclid(4) == 0,
            Calendar::NoLeap | Calendar::Day360 => false,
            Calendar::AllLeap => true,
        }
    }

    pub fn days_in_month(&self, year: i32, month: u32) -> u32 {
        if *self == Calendar::Day360 {
            return 30;
        }
        let idx = (month as usize).clamp(1, 12);
        let days = (CUMULATIVE_DAYS[idx] - CUMULATIVE_DAYS[idx - 1]) as u32;
        if month == 2 && self.is_leap_year(year) {
            days + 1
        } else {
            days
        }
    }

    fn uses_chrono(&self) -> bool {
        matches!(self, Calendar::Standard | Calendar::ProlepticGregorian)
    }

    /// Days since 0000-01-01 for calendars that chrono does not model
    fn ordinal(&self, date: CalendarDate) -> i64 {
        let year = date.year as i64;
        let month = date.month as usize;
        let day = date.day as i64 - 1;
        match self {
            Calendar::Day360 => year * 360 + (month as i64 - 1) * 30 + day,
            Calendar::NoLeap => year * 365 + CUMULATIVE_DAYS[month - 1] + day,
            Calendar::AllLeap => {
                let leap_day = if month > 2 { 1 } else { 0 };
                year * 366 + CUMULATIVE_DAYS[month - 1] + leap_day + day
            }
            Calendar::Julian | Calendar::Standard | Calendar::ProlepticGregorian => {
                let leap_years_before = match self {
                    Calendar::Julian => (year + 3).div_euclid(4),
                    _ => {
                        (year + 3).div_euclid(4) - (year + 99).div_euclid(100)
                            + (year + 399).div_euclid(400)
                    }
                };
                let leap_day = if month > 2 && self.is_leap_year(date.year) {
                    1
                } else {
                    0
                };
                year * 365 + leap_years_before + CUMULATIVE_DAYS[month - 1] + leap_day + day
            }
        }
    }

    fn from_ordinal(&self, ordinal: i64) -> CalendarDate {
        let mean_year = match self {
            Calendar::Day360 => 360.0,
            Calendar::NoLeap => 365.0,
            Calendar::AllLeap => 366.0,
            _ => 365.25,
        };
        let mut year = (ordinal as f64 / mean_year).floor() as i32;
        while self.ordinal(CalendarDate::new(year, 1, 1)) > ordinal {
            year -= 1;
        }
        while self.ordinal(CalendarDate::new(year + 1, 1, 1)) <= ordinal {
            year += 1;
        }

        let mut remaining = ordinal - self.ordinal(CalendarDate::new(year, 1, 1));
        let mut month = 1;
        while month < 12 && remaining >= self.days_in_month(year, month) as i64 {
            remaining -= self.days_in_month(year, month) as i64;
            month += 1;
        }
        CalendarDate::new(year, month, remaining as u32 + 1)
    }

    /// Move `date` by a whole number of days
    pub fn add_days(&self, date: CalendarDate, days: i64) -> HindexResult<CalendarDate> {
        if self.uses_chrono() {
            let start = date.to_naive()?;
            let shifted = start
                .checked_add_signed(Duration::days(days))
                .ok_or_else(|| HindexError::Error(format!("{} + {} days overflows", date, days)))?;
            return Ok(CalendarDate::new(
                shifted.year(),
                shifted.month(),
                shifted.day(),
            ));
        }
        Ok(self.from_ordinal(self.ordinal(date) + days))
    }

    /// Signed number of days from `from` to `to`
    pub fn days_between(&self, from: CalendarDate, to: CalendarDate) -> HindexResult<i64> {
        if self.uses_chrono() {
            return Ok(to.to_naive()?.signed_duration_since(from.to_naive()?).num_days());
        }
        Ok(self.ordinal(to) - self.ordinal(from))
    }
}

impl FromStr for Calendar {
    type Err = HindexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Calendar::Standard),
            "proleptic_gregorian" => Ok(Calendar::ProlepticGregorian),
            "julian" => Ok(Calendar::Julian),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "366_day" => Ok(Calendar::AllLeap),
            "360_day" => Ok(Calendar::Day360),
            other => Err(HindexError::InvalidCalendar(other.to_string())),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Calendar::Standard => "standard",
            Calendar::ProlepticGregorian => "proleptic_gregorian",
            Calendar::Julian => "julian",
            Calendar::NoLeap => "noleap",
            Calendar::AllLeap => "all_leap",
            Calendar::Day360 => "360_day",
        };
        write!(f, "{}", name)
    }
}

/// A calendar month, the unit seasonal aggregation works in
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    /// 1 = January
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The month `n` months after this one (negative moves backwards)
    pub fn offset(&self, n: i32) -> Self {
        let zero_based = self.year * 12 + self.month as i32 - 1 + n;
        Self {
            year: zero_based.div_euclid(12),
            month: zero_based.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    pub fn year_month(&self) -> YearMonth {
        YearMonth::new(self.year, self.month)
    }

    fn to_naive(self) -> HindexResult<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .ok_or_else(|| HindexError::Error(format!("{} is not a valid date", self)))
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn days_per_unit(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0 / 86400.0,
            TimeUnit::Minutes => 1.0 / 1440.0,
            TimeUnit::Hours => 1.0 / 24.0,
            TimeUnit::Days => 1.0,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

/// Parsed `<unit> since <reference>` time units
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeUnits {
    unit: TimeUnit,
    reference: CalendarDate,
    /// Time of day of the reference, as a fraction of a day
    reference_fraction: f64,
}

impl TimeUnits {
    pub fn days_since(reference: CalendarDate) -> Self {
        Self {
            unit: TimeUnit::Days,
            reference,
            reference_fraction: 0.0,
        }
    }

    pub fn parse(units: &str) -> HindexResult<Self> {
        let invalid = || HindexError::InvalidTimeUnits(units.to_string());
        let lowered = units.trim().to_lowercase();
        let (unit, reference) = lowered.split_once(" since ").ok_or_else(invalid)?;

        let unit = match unit.trim() {
            "s" | "sec" | "secs" | "second" | "seconds" => TimeUnit::Seconds,
            "min" | "mins" | "minute" | "minutes" => TimeUnit::Minutes,
            "h" | "hr" | "hrs" | "hour" | "hours" => TimeUnit::Hours,
            "d" | "day" | "days" => TimeUnit::Days,
            _ => return Err(invalid()),
        };

        let reference = reference.trim().replace('t', " ");
        let mut parts = reference.split_whitespace();
        let date = parts.next().ok_or_else(invalid)?;
        let mut ymd = date.splitn(3, '-');
        // A leading '-' would denote a negative year; CMIP references never use one
        let year: i32 = ymd.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let month: u32 = ymd.next().and_then(|v| v.parse().ok()).unwrap_or(1);
        let day: u32 = ymd.next().and_then(|v| v.parse().ok()).unwrap_or(1);
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(invalid());
        }

        let mut reference_fraction = 0.0;
        if let Some(clock) = parts.next() {
            let mut hms = clock.trim_end_matches('z').split(':');
            let hours: f64 = hms.next().and_then(|v| v.parse().ok()).unwrap_or(0.0);
            let minutes: f64 = hms.next().and_then(|v| v.parse().ok()).unwrap_or(0.0);
            let seconds: f64 = hms.next().and_then(|v| v.parse().ok()).unwrap_or(0.0);
            reference_fraction = (hours * 3600.0 + minutes * 60.0 + seconds) / 86400.0;
        }

        Ok(Self {
            unit,
            reference: CalendarDate::new(year, month, day),
            reference_fraction,
        })
    }

    pub fn reference(&self) -> CalendarDate {
        self.reference
    }

    /// Calendar date of an encoded time value
    pub fn decode(&self, value: f64, calendar: Calendar) -> HindexResult<CalendarDate> {
        if !value.is_finite() {
            return Err(HindexError::Error(format!(
                "Cannot decode non-finite time value {}",
                value
            )));
        }
        let days = (value * self.unit.days_per_unit() + self.reference_fraction).floor() as i64;
        calendar.add_days(self.reference, days)
    }

    pub fn year_month(&self, value: f64, calendar: Calendar) -> HindexResult<YearMonth> {
        Ok(self.decode(value, calendar)?.year_month())
    }

    /// Encode midnight of `date` as a value in these units
    pub fn encode(&self, date: CalendarDate, calendar: Calendar) -> HindexResult<f64> {
        let days = calendar.days_between(self.reference, date)? as f64 - self.reference_fraction;
        Ok(days / self.unit.days_per_unit())
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} since {}", self.unit.name(), self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_calendar_names() {
        assert_eq!("gregorian".parse::<Calendar>().unwrap(), Calendar::Standard);
        assert_eq!("365_day".parse::<Calendar>().unwrap(), Calendar::NoLeap);
        assert_eq!("360_day".parse::<Calendar>().unwrap(), Calendar::Day360);
        assert!("lunar".parse::<Calendar>().is_err());
    }

    #[test]
    fn parses_time_units() {
        let units = TimeUnits::parse("hours since 1850-1-1 00:00:00").unwrap();
        assert_eq!(units.reference(), CalendarDate::new(1850, 1, 1));
        assert_eq!(units.to_string(), "hours since 1850-01-01");

        let iso = TimeUnits::parse("days since 1960-11-01T12:00:00").unwrap();
        assert_eq!(iso.decode(0.0, Calendar::Standard).unwrap(), CalendarDate::new(1960, 11, 1));
        assert_eq!(iso.decode(0.5, Calendar::Standard).unwrap(), CalendarDate::new(1960, 11, 2));

        assert!(TimeUnits::parse("fortnights since 1960-01-01").is_err());
        assert!(TimeUnits::parse("days").is_err());
    }

    #[test]
    fn decodes_standard_calendar_across_leap_day() {
        let units = TimeUnits::parse("days since 1960-02-28").unwrap();
        assert_eq!(units.decode(1.0, Calendar::Standard).unwrap(), CalendarDate::new(1960, 2, 29));
        assert_eq!(units.decode(1.0, Calendar::NoLeap).unwrap(), CalendarDate::new(1960, 3, 1));
        assert_eq!(units.decode(1.0, Calendar::Day360).unwrap(), CalendarDate::new(1960, 2, 29));
        assert_eq!(units.decode(2.0, Calendar::Day360).unwrap(), CalendarDate::new(1960, 2, 30));
    }

    #[test]
    fn decodes_negative_offsets() {
        let units = TimeUnits::parse("days since 1961-01-01").unwrap();
        for calendar in [
            Calendar::Standard,
            Calendar::Julian,
            Calendar::NoLeap,
            Calendar::AllLeap,
            Calendar::Day360,
        ] {
            assert_eq!(
                units.year_month(-1.0, calendar).unwrap(),
                YearMonth::new(1960, 12),
                "{}",
                calendar
            );
        }
    }

    #[test]
    fn encode_then_decode_recovers_dates() {
        let units = TimeUnits::parse("days since 1850-01-01").unwrap();
        for calendar in [
            Calendar::ProlepticGregorian,
            Calendar::Julian,
            Calendar::NoLeap,
            Calendar::AllLeap,
            Calendar::Day360,
        ] {
            for date in [
                CalendarDate::new(1960, 11, 16),
                CalendarDate::new(2000, 2, 28),
                CalendarDate::new(1849, 12, 31),
            ] {
                let encoded = units.encode(date, calendar).unwrap();
                assert_eq!(units.decode(encoded, calendar).unwrap(), date, "{}", calendar);
            }
        }
    }

    #[test]
    fn julian_and_gregorian_differ_on_century_years() {
        assert!(Calendar::Julian.is_leap_year(1900));
        assert!(!Calendar::Standard.is_leap_year(1900));
        assert!(Calendar::Standard.is_leap_year(2000));
        assert_eq!(Calendar::Julian.days_in_month(1900, 2), 29);
        assert_eq!(Calendar::AllLeap.days_in_month(1901, 2), 29);
    }

    #[test]
    fn year_month_offset_wraps_years() {
        let start = YearMonth::new(1960, 11);
        assert_eq!(start.offset(2), YearMonth::new(1961, 1));
        assert_eq!(start.offset(-11), YearMonth::new(1959, 12));
        assert_eq!(start.offset(0), start);
    }
}
