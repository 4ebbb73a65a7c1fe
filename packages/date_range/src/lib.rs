#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Calendar-aware hour and day bucket ranges.
//!
//! Expands an anchor point in time into the contiguous run of buckets
//! leading up to it, e.g. the last 24 hours ending at 2016-03-01 02:00.
//! Stepping backwards rolls over day, month and year boundaries using the
//! real length of each month (Gregorian leap years included).

use chrono::{DateTime, Datelike as _, NaiveDate, Timelike as _, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Earliest supported year.
pub const MIN_YEAR: i32 = 1;

/// Latest supported year.
pub const MAX_YEAR: i32 = 9999;

/// Longest range [`generate_range`] will build (ten leap years of hours).
pub const MAX_RANGE_LEN: usize = 24 * 366 * 10;

/// Errors that can occur when generating a range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateRangeError {
    /// Year outside `MIN_YEAR..=MAX_YEAR`.
    #[error("invalid year {year}: expected 1-9999")]
    InvalidYear {
        /// The rejected year.
        year: i32,
    },

    /// Month outside 1-12.
    #[error("invalid month {month}: expected 1-12")]
    InvalidMonth {
        /// The rejected month.
        month: u32,
    },

    /// Day outside the month's length.
    #[error("invalid day {day} for {year}-{month:02}: expected 1-{days_in_month}")]
    InvalidDay {
        /// Year of the rejected date.
        year: i32,
        /// Month of the rejected date.
        month: u32,
        /// The rejected day.
        day: u32,
        /// Number of days in that month.
        days_in_month: u32,
    },

    /// Hour outside 0-23.
    #[error("invalid hour {hour}: expected 0-23")]
    InvalidHour {
        /// The rejected hour.
        hour: u32,
    },

    /// More buckets requested than [`MAX_RANGE_LEN`].
    #[error("range of {count} buckets is too long: expected at most {max}")]
    TooLong {
        /// The requested bucket count.
        count: usize,
        /// The largest accepted count.
        max: usize,
    },

    /// Stepping back from the anchor would leave the supported years.
    #[error("range of {count} buckets ending at {anchor} starts before year 1")]
    BeforeMinYear {
        /// The range's last bucket.
        anchor: TimeBucket,
        /// The requested bucket count.
        count: usize,
    },

    /// Unrecognized unit name.
    #[error("unknown range unit {unit:?}: expected \"hours\" or \"days\"")]
    UnknownUnit {
        /// The rejected unit.
        unit: String,
    },
}

/// Step size between consecutive buckets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RangeUnit {
    /// One bucket per hour.
    #[default]
    Hours,
    /// One bucket per day, at the anchor's hour.
    Days,
}

impl RangeUnit {
    /// Parses a unit name (`"hours"` or `"days"`).
    ///
    /// # Errors
    ///
    /// Returns [`DateRangeError::UnknownUnit`] for any other string.
    pub fn parse(unit: &str) -> Result<Self, DateRangeError> {
        unit.parse().map_err(|_| DateRangeError::UnknownUnit {
            unit: unit.to_string(),
        })
    }
}

/// Gregorian leap year rule.
#[must_use]
pub const fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `month` (1-12) of `year`. 0 for an invalid month.
#[must_use]
pub const fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// A calendar hour: `{year, month (1-12), day, hour (0-23)}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Calendar year, `MIN_YEAR..=MAX_YEAR` once validated.
    pub year: i32,
    /// Month of the year, 1-12.
    pub month: u32,
    /// Day of the month, starting at 1.
    pub day: u32,
    /// Hour of the day, 0-23.
    pub hour: u32,
}

impl TimeBucket {
    /// Creates a validated bucket.
    ///
    /// # Errors
    ///
    /// Returns [`DateRangeError`] if the fields do not form a real calendar
    /// hour.
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Result<Self, DateRangeError> {
        let bucket = Self {
            year,
            month,
            day,
            hour,
        };
        bucket.validate()?;
        Ok(bucket)
    }

    /// Checks that the fields form a real calendar hour.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field as a [`DateRangeError`].
    pub fn validate(&self) -> Result<(), DateRangeError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(DateRangeError::InvalidYear { year: self.year });
        }
        if !(1..=12).contains(&self.month) {
            return Err(DateRangeError::InvalidMonth { month: self.month });
        }
        let days = days_in_month(self.year, self.month);
        if !(1..=days).contains(&self.day) {
            return Err(DateRangeError::InvalidDay {
                year: self.year,
                month: self.month,
                day: self.day,
                days_in_month: days,
            });
        }
        if self.hour > 23 {
            return Err(DateRangeError::InvalidHour { hour: self.hour });
        }
        Ok(())
    }

    /// The bucket one hour earlier. `None` before the start of
    /// [`MIN_YEAR`].
    #[must_use]
    pub const fn previous_hour(self) -> Option<Self> {
        if self.hour > 0 {
            return Some(Self {
                hour: self.hour - 1,
                ..self
            });
        }
        match self.previous_day() {
            Some(day) => Some(Self { hour: 23, ..day }),
            None => None,
        }
    }

    /// The bucket one day earlier, at the same hour. `None` before the
    /// start of [`MIN_YEAR`].
    #[must_use]
    pub const fn previous_day(self) -> Option<Self> {
        if self.day > 1 {
            return Some(Self {
                day: self.day - 1,
                ..self
            });
        }
        let (year, month) = if self.month > 1 {
            (self.year, self.month - 1)
        } else if self.year > MIN_YEAR {
            (self.year - 1, 12)
        } else {
            return None;
        };
        Some(Self {
            year,
            month,
            day: days_in_month(year, month),
            hour: self.hour,
        })
    }

    /// The bucket one `unit` earlier.
    #[must_use]
    pub const fn previous(self, unit: RangeUnit) -> Option<Self> {
        match unit {
            RangeUnit::Hours => self.previous_hour(),
            RangeUnit::Days => self.previous_day(),
        }
    }

    /// The bucket containing `at` (minutes and seconds dropped).
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
            day: at.day(),
            hour: at.hour(),
        }
    }

    /// Start of the bucket as a UTC timestamp. `None` if the bucket is not
    /// a valid calendar hour.
    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| date.and_hms_opt(self.hour, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

impl std::fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}",
            self.year, self.month, self.day, self.hour
        )
    }
}

/// Returns the `count` consecutive buckets ending at (and including)
/// `anchor`, earliest first.
///
/// # Errors
///
/// Returns [`DateRangeError`] if `anchor` is not a valid calendar hour,
/// `count` exceeds [`MAX_RANGE_LEN`], or the range would start before
/// [`MIN_YEAR`].
pub fn generate_range(
    anchor: TimeBucket,
    unit: RangeUnit,
    count: usize,
) -> Result<Vec<TimeBucket>, DateRangeError> {
    anchor.validate()?;
    if count > MAX_RANGE_LEN {
        return Err(DateRangeError::TooLong {
            count,
            max: MAX_RANGE_LEN,
        });
    }

    let mut buckets = Vec::with_capacity(count);
    let mut current = anchor;
    for remaining in (0..count).rev() {
        buckets.push(current);
        if remaining > 0 {
            current = current
                .previous(unit)
                .ok_or(DateRangeError::BeforeMinYear { anchor, count })?;
        }
    }
    buckets.reverse();

    Ok(buckets)
}
