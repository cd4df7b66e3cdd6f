//! Local calendar-day arithmetic.
//!
//! Dates are parsed from their separate year/month/day components and never
//! routed through a UTC timestamp, so "today" cannot drift across midnight
//! with the device offset.

use crate::infrastructure::error::PlannerError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type CalendarDate = NaiveDate;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    /// 0 = Sunday .. 6 = Saturday.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn from_date(date: CalendarDate) -> Self {
        Self::from_weekday(date.weekday())
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => Self::Sunday,
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
        }
    }

    /// Accepts full English day names and their three-letter abbreviations,
    /// case-insensitively.
    pub fn from_name(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|day| {
            let name = day.name().to_ascii_lowercase();
            normalized == name || (normalized.len() == 3 && name.starts_with(&normalized))
        })
    }

    /// Day numbers run Monday = 1 .. Sunday = 7.
    pub fn from_day_number(number: u8) -> Option<Self> {
        match number {
            7 => Some(Self::Sunday),
            1..=6 => Self::from_index(number as usize),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sunday => "Sunday",
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn parse_local_date(value: &str) -> Result<CalendarDate, PlannerError> {
    let segments = value.split('-').collect::<Vec<_>>();
    let [year, month, day] = segments.as_slice() else {
        return Err(malformed_date(value, "expected three '-' separated segments"));
    };
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return Err(malformed_date(value, "expected YYYY-MM-DD"));
    }

    let year = parse_component::<i32>(year, value)?;
    let month = parse_component::<u32>(month, value)?;
    let day = parse_component::<u32>(day, value)?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| malformed_date(value, "no such calendar day"))
}

pub fn format_date(date: CalendarDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

fn parse_component<T: FromStr>(segment: &str, original: &str) -> Result<T, PlannerError> {
    if !segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(malformed_date(original, "segments must be numeric"));
    }
    segment
        .parse::<T>()
        .map_err(|_| malformed_date(original, "segments must be numeric"))
}

fn malformed_date(value: &str, reason: &str) -> PlannerError {
    PlannerError::MalformedDate(format!("'{value}': {reason}"))
}

/// The Sunday on or before `date`.
pub fn week_start(date: CalendarDate) -> CalendarDate {
    let offset = DayOfWeek::from_date(date).index() as i64;
    date - Duration::days(offset)
}

pub fn week_dates(week_start: CalendarDate) -> [CalendarDate; 7] {
    std::array::from_fn(|offset| week_start + Duration::days(offset as i64))
}

pub fn month_dates(year: i32, month: u32) -> Result<Vec<CalendarDate>, PlannerError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        PlannerError::MalformedDate(format!("'{year:04}-{month:02}': no such month"))
    })?;
    Ok(first
        .iter_days()
        .take_while(|date| date.month() == month)
        .collect())
}

/// Minutes since midnight for a strict "HH:MM" value.
pub fn parse_hhmm(value: &str) -> Option<u32> {
    let (hour, minute) = value.trim().split_once(':')?;
    if hour.len() != 2 || minute.len() != 2 {
        return None;
    }
    let hour = hour.parse::<u32>().ok()?;
    let minute = minute.parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

/// Formats minutes since midnight, wrapping past 24:00.
pub fn format_hhmm(minutes: u32) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Length of the span from `start` to `end`, crossing midnight when `end`
/// is earlier in the day.
pub fn span_minutes(start: u32, end: u32) -> u32 {
    if end >= start {
        end - start
    } else {
        MINUTES_PER_DAY - start + end
    }
}
