use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::limits::*;

pub const DEFAULT_ROOM_COLUMN_WIDTH: f64 = 96.0;
pub const DEFAULT_ROW_HEIGHT: f64 = 40.0;
pub const DEFAULT_HEADER_HEIGHT: f64 = 32.0;

/// A calendar date with no time of day and no zone. The only date type.
///
/// Always rendered as `YYYY-MM-DD`; ordering is chronological, which for this
/// representation is the same as comparing the canonical strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Day(NaiveDate);

impl Day {
    /// Today on the local wall clock.
    pub fn today() -> Self {
        Self(chrono::Local::now().date_naive())
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    pub fn day(self) -> u32 {
        self.0.day()
    }

    pub fn checked_add_days(self, n: i64) -> Option<Self> {
        let magnitude = Days::new(n.unsigned_abs());
        let shifted = if n >= 0 {
            self.0.checked_add_days(magnitude)
        } else {
            self.0.checked_sub_days(magnitude)
        };
        shifted.map(Self)
    }

    /// Calendar-correct day arithmetic. Saturates at the representable range.
    pub fn add_days(self, n: i64) -> Self {
        self.checked_add_days(n).unwrap_or(if n >= 0 {
            Self(NaiveDate::MAX)
        } else {
            Self(NaiveDate::MIN)
        })
    }

    /// Whole days from `self` to `later` (negative if `later` is earlier).
    pub fn days_until(self, later: Day) -> i64 {
        later.0.signed_duration_since(self.0).num_days()
    }
}

impl From<NaiveDate> for Day {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for Day {
    type Err = DateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_date(s)
    }
}

impl TryFrom<String> for Day {
    type Error = DateParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse_date(&s)
    }
}

impl From<Day> for String {
    fn from(day: Day) -> Self {
        day.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParseError {
    pub input: String,
}

impl fmt::Display for DateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid date '{}': expected YYYY-MM-DD", self.input)
    }
}

impl std::error::Error for DateParseError {}

/// Parse a date string into its year/month/day components.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, and date-time strings whose first
/// component is one of those (`2025-06-01T09:30:00+09:00`). The time and any
/// offset are dropped without conversion: the wall-clock date is the date.
pub fn parse_date(input: &str) -> Result<Day, DateParseError> {
    let invalid = || DateParseError {
        input: input.to_string(),
    };

    let date_part = input.trim().split(['T', ' ']).next().unwrap_or_default();
    let mut parts = date_part.split(['-', '/']);
    let (Some(y), Some(m), Some(d), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let digits = |s: &str, min: usize, max: usize| {
        (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(y, 4, 4) || !digits(m, 1, 2) || !digits(d, 1, 2) {
        return Err(invalid());
    }

    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    let day: u32 = d.parse().map_err(|_| invalid())?;
    Day::from_ymd(year, month, day).ok_or_else(invalid)
}

pub fn add_days(day: Day, n: i64) -> Day {
    day.add_days(n)
}

/// `a - b` in whole days.
pub fn diff_days(a: Day, b: Day) -> i64 {
    b.days_until(a)
}

/// Convert a horizontal pixel distance into whole days.
///
/// Rounds to the nearest day with ties going toward zero, so a movement of
/// half a cell or less never changes the date.
pub fn snap_days(pixels: f64, cell_width: f64) -> i64 {
    if !pixels.is_finite() || cell_width.is_nan() || cell_width <= 0.0 {
        return 0;
    }
    let cells = pixels / cell_width;
    let magnitude = (cells.abs() - 0.5).ceil().max(0.0) as i64;
    if cells < 0.0 { -magnitude } else { magnitude }
}

/// The visible slice of the timeline plus the geometry needed to map
/// between pixels and days/rooms.
///
/// x = 0 is the left edge of the room label column; y = 0 is the top of the
/// date header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarWindow {
    pub base: Day,
    pub visible_days: u32,
    pub cell_width: f64,
    pub room_column_width: f64,
    pub row_height: f64,
    pub header_height: f64,
}

impl CalendarWindow {
    pub fn new(base: Day, visible_days: u32, cell_width: f64) -> Self {
        Self {
            base,
            visible_days: visible_days.clamp(1, MAX_VISIBLE_DAYS),
            cell_width: cell_width.clamp(MIN_CELL_WIDTH, MAX_CELL_WIDTH),
            room_column_width: DEFAULT_ROOM_COLUMN_WIDTH,
            row_height: DEFAULT_ROW_HEIGHT,
            header_height: DEFAULT_HEADER_HEIGHT,
        }
    }

    pub fn with_geometry(mut self, room_column_width: f64, row_height: f64, header_height: f64) -> Self {
        self.room_column_width = room_column_width;
        self.row_height = row_height;
        self.header_height = header_height;
        self
    }

    /// First day after the window (exclusive bound).
    pub fn end(&self) -> Day {
        self.base.add_days(self.visible_days as i64)
    }

    pub fn contains(&self, day: Day) -> bool {
        self.base <= day && day < self.end()
    }

    pub fn days(&self) -> impl Iterator<Item = Day> + '_ {
        (0..self.visible_days as i64).map(|n| self.base.add_days(n))
    }

    pub fn days_from_base(&self, day: Day) -> i64 {
        diff_days(day, self.base)
    }

    /// Left edge of `day`'s column.
    pub fn to_coordinate(&self, day: Day) -> f64 {
        self.days_from_base(day) as f64 * self.cell_width + self.room_column_width
    }

    /// Inverse of [`to_coordinate`](Self::to_coordinate), rounded to the nearest day.
    pub fn to_date(&self, x: f64) -> Day {
        self.base
            .add_days(snap_days(x - self.room_column_width, self.cell_width))
    }

    /// The day whose cell contains `x`, if `x` falls inside the visible grid.
    pub fn day_at(&self, x: f64) -> Option<Day> {
        let offset = x - self.room_column_width;
        if !offset.is_finite() || offset < 0.0 {
            return None;
        }
        let index = (offset / self.cell_width).floor() as i64;
        (index < self.visible_days as i64).then(|| self.base.add_days(index))
    }

    /// Row index under `y`, or `None` above the first row or below the last.
    pub fn room_row_at(&self, y: f64, rooms: usize) -> Option<usize> {
        let offset = y - self.header_height;
        if !offset.is_finite() || offset < 0.0 || self.row_height <= 0.0 {
            return None;
        }
        let row = (offset / self.row_height).floor() as usize;
        (row < rooms).then_some(row)
    }

    pub fn shift(&mut self, days: i64) {
        self.base = self.base.add_days(days);
    }

    pub fn go_to(&mut self, day: Day) {
        self.base = day;
    }

    pub fn zoom(&mut self, cell_width: f64) {
        if cell_width.is_finite() {
            self.cell_width = cell_width.clamp(MIN_CELL_WIDTH, MAX_CELL_WIDTH);
        }
    }
}
