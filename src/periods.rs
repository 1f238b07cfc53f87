// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Month and year tokens and the half-open UTC day ranges they cover.
//!
//! Every "transactions in period" query uses `date >= start AND date < end`.
//! Day boundaries are UTC midnight regardless of where the report is viewed.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::errors::{NidoError, Result};

pub const MIN_YEAR: i32 = 1970;
pub const MAX_YEAR: i32 = 2100;

static MONTH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})$").expect("month token pattern"));
static YEAR_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})$").expect("year token pattern"));

/// `[start, end)` in calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Inclusive upper bound. Stored dates are compared as text, and the
    /// exclusive end of December 9999 would not format as `YYYY-MM-DD`.
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.end)
    }
}

fn month_parts(token: &str) -> Result<(i32, u32)> {
    let caps = MONTH_TOKEN
        .captures(token)
        .ok_or_else(|| NidoError::InvalidRangeToken(token.to_string()))?;
    let year: i32 = caps[1]
        .parse()
        .map_err(|_| NidoError::InvalidRangeToken(token.to_string()))?;
    let month: u32 = caps[2]
        .parse()
        .map_err(|_| NidoError::InvalidRangeToken(token.to_string()))?;
    if !(1..=12).contains(&month) {
        return Err(NidoError::InvalidRangeToken(token.to_string()));
    }
    Ok((year, month))
}

fn first_of(year: i32, month: u32, token: &str) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| NidoError::InvalidRangeToken(token.to_string()))
}

/// Validates a `YYYY-MM` token and returns it unchanged.
pub fn parse_month(token: &str) -> Result<String> {
    month_parts(token)?;
    Ok(token.to_string())
}

pub fn resolve_month(token: &str) -> Result<DateRange> {
    let (year, month) = month_parts(token)?;
    let start = first_of(year, month, token)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = first_of(next_year, next_month, token)?;
    Ok(DateRange { start, end })
}

pub fn parse_year(token: &str) -> Result<i32> {
    let caps = YEAR_TOKEN
        .captures(token)
        .ok_or_else(|| NidoError::InvalidRangeToken(token.to_string()))?;
    let year: i32 = caps[1]
        .parse()
        .map_err(|_| NidoError::InvalidRangeToken(token.to_string()))?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(NidoError::InvalidRangeToken(token.to_string()));
    }
    Ok(year)
}

pub fn resolve_year(token: &str) -> Result<DateRange> {
    let year = parse_year(token)?;
    Ok(DateRange {
        start: first_of(year, 1, token)?,
        end: first_of(year + 1, 1, token)?,
    })
}

/// Month arithmetic on tokens; negative deltas walk backwards across years.
/// Results must still fit a four-digit `YYYY-MM` token.
pub fn shift_month(token: &str, delta: i32) -> Result<String> {
    let (year, month) = month_parts(token)?;
    let index = year * 12 + (month as i32 - 1) + delta;
    let shifted = index.div_euclid(12);
    if !(0..=9999).contains(&shifted) {
        return Err(NidoError::constraint(format!(
            "Moving {} by {} month(s) leaves the YYYY-MM calendar",
            token, delta
        )));
    }
    Ok(format!("{:04}-{:02}", shifted, index.rem_euclid(12) + 1))
}

/// `count` consecutive month tokens starting at `start`.
pub fn month_span(start: &str, count: u32) -> Result<Vec<String>> {
    (0..count as i32).map(|i| shift_month(start, i)).collect()
}

pub fn year_months(year: i32) -> Vec<String> {
    (1..=12).map(|m| format!("{:04}-{:02}", year, m)).collect()
}

pub fn month_token(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Source of "now". Report composers take one so the pure parts never read
/// the system clock themselves.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Midnight UTC of the given day.
    pub fn on(date: NaiveDate) -> Self {
        FixedClock(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn current_month_token(clock: &dyn Clock) -> String {
    month_token(clock.today())
}

pub fn current_year_token(clock: &dyn Clock) -> String {
    format!("{:04}", clock.today().year())
}

/// A missing token means "current month"; a malformed one is an error.
pub fn month_or_current(token: Option<&str>, clock: &dyn Clock) -> Result<String> {
    match token {
        Some(t) => parse_month(t.trim()),
        None => Ok(current_month_token(clock)),
    }
}

pub fn year_or_current(token: Option<&str>, clock: &dyn Clock) -> Result<i32> {
    match token {
        Some(t) => parse_year(t.trim()),
        None => parse_year(&current_year_token(clock)),
    }
}
