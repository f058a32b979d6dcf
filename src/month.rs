use chrono::{Datelike, Month, NaiveDate};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::ops::{Add, Sub};

use crate::error::{Error, ErrorKind, Result};

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_of_month(month: &Month, year: i32) -> u32 {
    match month {
        Month::February if is_leap_year(year) => 29,
        Month::February => 28,
        Month::April | Month::June | Month::September | Month::November => 30,
        _ => 31,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Prev,
    Next,
}

impl Direction {
    pub fn delta(self) -> i32 {
        match self {
            Direction::Prev => -1,
            Direction::Next => 1,
        }
    }
}

/// A calendar month without a day component.
///
/// Values are always valid: the month lies in `1..=12` and the year in
/// `MIN_YEAR..=MAX_YEAR`. Field order makes the derived ordering
/// chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawYearMonth")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawYearMonth {
    year: i32,
    month: u32,
}

impl TryFrom<RawYearMonth> for YearMonth {
    type Error = Error;

    fn try_from(raw: RawYearMonth) -> Result<Self> {
        YearMonth::new(raw.year, raw.month)
    }
}

impl YearMonth {
    pub const MIN: YearMonth = YearMonth {
        year: MIN_YEAR,
        month: 1,
    };
    pub const MAX: YearMonth = YearMonth {
        year: MAX_YEAR,
        month: 12,
    };

    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::new(
                ErrorKind::InvalidMonth,
                &format!("{} is not in 1..=12", month),
            ));
        }

        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::new(
                ErrorKind::InvalidYear,
                &format!("{} is not in {}..={}", year, MIN_YEAR, MAX_YEAR),
            ));
        }

        Ok(YearMonth { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// One-based month number.
    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn as_month(&self) -> Month {
        Month::from_u32(self.month).unwrap_or(Month::January)
    }

    pub fn num_days(&self) -> u32 {
        days_of_month(&self.as_month(), self.year)
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .expect("year and month are validated on construction")
    }

    /// The month containing `date`. Dates outside the supported year range
    /// saturate to `MIN`/`MAX`.
    pub fn of<T: Datelike>(date: &T) -> Self {
        YearMonth::from_total_months(date.year() as i64 * 12 + date.month0() as i64)
    }

    pub fn contains<T: Datelike>(&self, date: &T) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn succ(&self) -> Self {
        *self + 1
    }

    pub fn pred(&self) -> Self {
        *self - 1
    }

    pub fn step(&self, direction: Direction) -> Self {
        *self + direction.delta()
    }

    fn total_months(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_total_months(total: i64) -> Self {
        let clamped = total.clamp(Self::MIN.total_months(), Self::MAX.total_months());

        YearMonth {
            year: clamped.div_euclid(12) as i32,
            month: clamped.rem_euclid(12) as u32 + 1,
        }
    }
}

impl Default for YearMonth {
    fn default() -> Self {
        YearMonth::from(chrono::Local::now().date_naive())
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        YearMonth::of(&date)
    }
}

impl Add<i32> for YearMonth {
    type Output = YearMonth;
    fn add(self, rhs: i32) -> Self::Output {
        YearMonth::from_total_months(self.total_months() + rhs as i64)
    }
}

impl Sub<i32> for YearMonth {
    type Output = YearMonth;
    fn sub(self, rhs: i32) -> Self::Output {
        YearMonth::from_total_months(self.total_months() - rhs as i64)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
