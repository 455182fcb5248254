//! Dates, periods and day count conventions.
//!
//! This module provides:
//! - `Date`: Type-safe date wrapper around chrono::NaiveDate
//! - `Period`: Tenors such as `3M` or `10Y` used to build simulation grids
//! - `DayCountConvention`: Year fraction conventions
//!
//! # Examples
//!
//! ```
//! use xrisk_core::types::time::{Date, DayCountConvention, Period};
//!
//! let start = Date::from_ymd(2024, 1, 1).unwrap();
//! let end = start.add_period("6M".parse::<Period>().unwrap()).unwrap();
//! assert_eq!(end, Date::from_ymd(2024, 7, 1).unwrap());
//!
//! let yf = DayCountConvention::Actual365Fixed.year_fraction(start, end);
//! assert!((yf - 0.4986).abs() < 0.001);
//! ```

use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use super::error::DateError;

/// Type-safe date wrapper around chrono::NaiveDate.
///
/// Serialises as ISO 8601 (`YYYY-MM-DD`).
///
/// # Examples
///
/// ```
/// use xrisk_core::types::time::Date;
///
/// let date = Date::from_ymd(2024, 6, 15).unwrap();
/// let parsed: Date = "2024-06-15".parse().unwrap();
/// assert_eq!(date, parsed);
///
/// let later = date.add_days(10).unwrap();
/// assert_eq!(later - date, 10);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Date(NaiveDate);

impl Date {
    /// Creates a Date from year, month, and day components.
    ///
    /// # Returns
    /// `Ok(Date)` if the date is valid, `Err(DateError::InvalidDate)` otherwise.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or(DateError::InvalidDate { year, month, day })
    }

    /// Parses a date in ISO 8601 (`2024-06-15`) or compact (`20240615`) form.
    ///
    /// Scenario files written by other systems frequently use the compact form,
    /// so both are accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use xrisk_core::types::time::Date;
    ///
    /// assert_eq!(Date::parse("20240615").unwrap(), Date::parse("2024-06-15").unwrap());
    /// assert!(Date::parse("not-a-date").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, DateError> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
            .map(Date)
            .map_err(|e| DateError::ParseError(format!("{s}: {e}")))
    }

    /// Returns the underlying NaiveDate.
    #[inline]
    pub fn into_inner(self) -> NaiveDate {
        self.0
    }

    /// Returns the year component.
    #[inline]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Returns the month component (1-12).
    #[inline]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Returns the day component (1-31).
    #[inline]
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Adds (or subtracts, for negative `days`) calendar days.
    pub fn add_days(self, days: i64) -> Result<Self, DateError> {
        let shifted = if days >= 0 {
            self.0.checked_add_days(Days::new(days as u64))
        } else {
            self.0.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        shifted.map(Date).ok_or_else(|| DateError::Overflow {
            date: self.to_string(),
            period: format!("{days}D"),
        })
    }

    /// Adds a period. Month and year periods clamp to the end of the month.
    pub fn add_period(self, period: Period) -> Result<Self, DateError> {
        let overflow = || DateError::Overflow {
            date: self.to_string(),
            period: period.to_string(),
        };
        match period.unit {
            TimeUnit::Days => self.add_days(period.length as i64),
            TimeUnit::Weeks => self.add_days(7 * period.length as i64),
            TimeUnit::Months | TimeUnit::Years => {
                let months = match period.unit {
                    TimeUnit::Years => period.length * 12,
                    _ => period.length,
                };
                let shifted = if months >= 0 {
                    self.0.checked_add_months(Months::new(months as u32))
                } else {
                    self.0.checked_sub_months(Months::new(months.unsigned_abs()))
                };
                shifted.map(Date).ok_or_else(overflow)
            }
        }
    }
}

impl Sub for Date {
    type Output = i64;

    /// Returns the number of days between two dates.
    fn sub(self, other: Self) -> i64 {
        (self.0 - other.0).num_days()
    }
}

impl FromStr for Date {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, DateError> {
        Date::parse(s)
    }
}

impl fmt::Display for Date {
    /// Formats the date as ISO 8601 (YYYY-MM-DD).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Unit of a [`Period`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeUnit {
    /// Calendar days
    Days,
    /// Weeks of seven days
    Weeks,
    /// Calendar months
    Months,
    /// Calendar years
    Years,
}

/// A tenor such as `2W`, `6M` or `10Y`.
///
/// # Examples
///
/// ```
/// use xrisk_core::types::time::{Period, TimeUnit};
///
/// let p: Period = "10Y".parse().unwrap();
/// assert_eq!(p, Period::new(10, TimeUnit::Years));
/// assert_eq!(p.to_string(), "10Y");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Period {
    /// Number of units
    pub length: i32,
    /// Unit
    pub unit: TimeUnit,
}

impl Period {
    /// Creates a new period.
    pub fn new(length: i32, unit: TimeUnit) -> Self {
        Self { length, unit }
    }

    /// Approximate length in years, used for sorting tenors.
    pub fn years(&self) -> f64 {
        let l = self.length as f64;
        match self.unit {
            TimeUnit::Days => l / 365.0,
            TimeUnit::Weeks => 7.0 * l / 365.0,
            TimeUnit::Months => l / 12.0,
            TimeUnit::Years => l,
        }
    }
}

impl FromStr for Period {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || DateError::InvalidPeriod(s.to_string());
        let unit_char = s.chars().last().ok_or_else(err)?;
        let unit = match unit_char.to_ascii_uppercase() {
            'D' => TimeUnit::Days,
            'W' => TimeUnit::Weeks,
            'M' => TimeUnit::Months,
            'Y' => TimeUnit::Years,
            _ => return Err(err()),
        };
        let length = s[..s.len() - unit_char.len_utf8()]
            .parse::<i32>()
            .map_err(|_| err())?;
        Ok(Period { length, unit })
    }
}

impl TryFrom<String> for Period {
    type Error = DateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let u = match self.unit {
            TimeUnit::Days => 'D',
            TimeUnit::Weeks => 'W',
            TimeUnit::Months => 'M',
            TimeUnit::Years => 'Y',
        };
        write!(f, "{}{}", self.length, u)
    }
}

/// Day count convention (year fraction convention).
///
/// Year fractions are signed: reversing the dates flips the sign.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DayCountConvention {
    /// Actual/365 Fixed
    #[default]
    Actual365Fixed,
    /// Actual/360
    Actual360,
    /// 30/360 US Bond Basis
    Thirty360,
}

impl DayCountConvention {
    /// Returns the standard convention name.
    pub fn name(&self) -> &'static str {
        match self {
            DayCountConvention::Actual365Fixed => "A365F",
            DayCountConvention::Actual360 => "A360",
            DayCountConvention::Thirty360 => "30/360",
        }
    }

    /// Year fraction between two dates. Negative if `start > end`.
    ///
    /// # Examples
    ///
    /// ```
    /// use xrisk_core::types::time::{Date, DayCountConvention};
    ///
    /// let start = Date::from_ymd(2024, 1, 1).unwrap();
    /// let end = Date::from_ymd(2024, 7, 1).unwrap();
    /// let yf = DayCountConvention::Actual360.year_fraction(start, end);
    /// assert!((yf - 0.5056).abs() < 0.001);
    /// assert!((DayCountConvention::Actual360.year_fraction(end, start) + yf).abs() < 1e-15);
    /// ```
    pub fn year_fraction(&self, start: Date, end: Date) -> f64 {
        match self {
            DayCountConvention::Actual365Fixed => (end - start) as f64 / 365.0,
            DayCountConvention::Actual360 => (end - start) as f64 / 360.0,
            DayCountConvention::Thirty360 => {
                let (a, b, sign) = if start <= end {
                    (start.into_inner(), end.into_inner(), 1.0)
                } else {
                    (end.into_inner(), start.into_inner(), -1.0)
                };
                let d1 = if a.day() == 31 { 30 } else { a.day() };
                let d2 = if b.day() == 31 && d1 == 30 { 30 } else { b.day() };
                let days = 360 * (b.year() - a.year())
                    + 30 * (b.month() as i32 - a.month() as i32)
                    + (d2 as i32 - d1 as i32);
                sign * days as f64 / 360.0
            }
        }
    }
}

impl FromStr for DayCountConvention {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A365F" | "A365" | "ACT/365" | "ACT/365F" | "ACTUAL/365 (FIXED)" => {
                Ok(DayCountConvention::Actual365Fixed)
            }
            "A360" | "ACT/360" | "ACTUAL/360" => Ok(DayCountConvention::Actual360),
            "30/360" | "30360" | "THIRTY360" => Ok(DayCountConvention::Thirty360),
            other => Err(DateError::ParseError(format!(
                "unknown day count convention {other}"
            ))),
        }
    }
}

impl fmt::Display for DayCountConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, dd: u32) -> Date {
        Date::from_ymd(y, m, dd).unwrap()
    }

    #[test]
    fn test_act_365_known_dates() {
        let yf = DayCountConvention::Actual365Fixed.year_fraction(d(2024, 1, 1), d(2025, 1, 1));
        assert_relative_eq!(yf, 366.0 / 365.0, epsilon = 1e-14);
    }

    #[test]
    fn test_thirty_360_with_31st_days() {
        let yf = DayCountConvention::Thirty360.year_fraction(d(2024, 1, 31), d(2024, 3, 31));
        assert_relative_eq!(yf, 60.0 / 360.0, epsilon = 1e-14);
    }

    #[test]
    fn test_add_period_clamps_month_end() {
        let p: Period = "1M".parse().unwrap();
        assert_eq!(d(2024, 1, 31).add_period(p).unwrap(), d(2024, 2, 29));
    }

    #[test]
    fn test_add_negative_days() {
        assert_eq!(d(2024, 3, 1).add_days(-1).unwrap(), d(2024, 2, 29));
    }

    #[test]
    fn test_period_parse_invalid() {
        assert!("3X".parse::<Period>().is_err());
        assert!("".parse::<Period>().is_err());
        assert!("Y".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_weeks_and_days() {
        let start = d(2024, 1, 1);
        assert_eq!(start.add_period("2W".parse().unwrap()).unwrap(), d(2024, 1, 15));
        assert_eq!(start.add_period("10D".parse().unwrap()).unwrap(), d(2024, 1, 11));
    }

    #[test]
    fn test_dcc_from_str() {
        assert_eq!(
            "ACT/360".parse::<DayCountConvention>().unwrap(),
            DayCountConvention::Actual360
        );
        assert!("ACT/ACT/ISMA".parse::<DayCountConvention>().is_err());
    }

    #[test]
    fn test_date_display_roundtrip() {
        let date = d(2030, 12, 5);
        assert_eq!(date.to_string().parse::<Date>().unwrap(), date);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_year_fraction_is_antisymmetric(a in 0i64..20_000, b in 0i64..20_000) {
                let base = d(2000, 1, 1);
                let x = base.add_days(a).unwrap();
                let y = base.add_days(b).unwrap();
                for dc in [DayCountConvention::Actual365Fixed, DayCountConvention::Actual360, DayCountConvention::Thirty360] {
                    let f = dc.year_fraction(x, y);
                    let g = dc.year_fraction(y, x);
                    prop_assert!((f + g).abs() < 1e-12);
                }
            }
        }
    }
}
