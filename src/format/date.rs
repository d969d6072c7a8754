//! Date and time rendering
//!
//! Parses a date format string one character at a time: quoted segments
//! (`'...'`, with `''` as a literal quote) pass through, runs of letters
//! are matched against the field table and replaced with the matching
//! component of the timestamp. All values derive from the timestamp
//! itself; the host time zone is never consulted.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::{Error, Result};

/// The document epoch: 2001-01-01T00:00:00 UTC.
pub fn numbers_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2001, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// A timestamp from seconds past the document epoch.
pub fn datetime_from_epoch(seconds: f64) -> NaiveDateTime {
    numbers_epoch() + chrono::Duration::microseconds((seconds * 1.0e6) as i64)
}

/// Seconds past the document epoch for a timestamp.
pub fn seconds_since_epoch(value: &NaiveDateTime) -> f64 {
    let delta = *value - numbers_epoch();
    delta.num_microseconds().unwrap_or(0) as f64 / 1.0e6
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Render one field code.
fn render_field(field: &str, value: &NaiveDateTime) -> Result<String> {
    let month = value.month() as usize;
    let weekday = value.weekday().num_days_from_monday() as usize;
    let micros = value.and_utc().timestamp_subsec_micros();

    let rendered = match field {
        "a" => if value.hour() < 12 { "am" } else { "pm" }.to_string(),
        "EEEE" => WEEKDAY_NAMES[weekday].to_string(),
        "EEE" => WEEKDAY_NAMES[weekday][..3].to_string(),
        "yyyy" | "y" => value.year().to_string(),
        "yy" => format!("{:02}", value.year() % 100),
        "MMMM" => MONTH_NAMES[month - 1].to_string(),
        "MMM" => MONTH_NAMES[month - 1][..3].to_string(),
        "MM" => format!("{:02}", month),
        "M" => month.to_string(),
        "d" => value.day().to_string(),
        "dd" => format!("{:02}", value.day()),
        "DDD" => format!("{:03}", value.ordinal()),
        "DD" => format!("{:02}", value.ordinal()),
        "D" => value.ordinal().to_string(),
        "HH" => format!("{:02}", value.hour()),
        "H" => value.hour().to_string(),
        "hh" => format!("{:02}", value.hour12().1),
        "h" => value.hour12().1.to_string(),
        "k" => hour_1_to_24(value.hour()).to_string(),
        "kk" => format!("{:02}", hour_1_to_24(value.hour())),
        "K" => (value.hour() % 12).to_string(),
        "KK" => format!("{:02}", value.hour() % 12),
        "mm" => format!("{:02}", value.minute()),
        "m" => value.minute().to_string(),
        "ss" => format!("{:02}", value.second()),
        "s" => value.second().to_string(),
        "W" => (week_of_month(value).saturating_sub(1)).to_string(),
        "ww" => format!("{:02}", week_of_year(value)),
        "G" => "AD".to_string(),
        "F" => days_occurred_in_month(value).to_string(),
        "S" | "SS" | "SSS" | "SSSS" | "SSSSS" => {
            let digits = format!("{:06}", micros);
            digits[..field.len()].to_string()
        }
        _ => {
            return Err(Error::Unsupported(format!("date field code '{}'", field)));
        }
    };
    Ok(rendered)
}

/// 1-24 clock: midnight renders as 24.
fn hour_1_to_24(hour: u32) -> u32 {
    if hour == 0 { 24 } else { hour }
}

/// Week of the year with Monday as the first day; days before the first
/// Monday fall in week 0.
fn week_of_year(value: &NaiveDateTime) -> u32 {
    let yday = value.ordinal0();
    let wday = value.weekday().num_days_from_monday();
    (yday + 7 - wday) / 7
}

/// Week of the month, from the ISO week distance to the month's first day.
fn week_of_month(value: &NaiveDateTime) -> u32 {
    let first = match NaiveDate::from_ymd_opt(value.year(), value.month(), 1) {
        Some(day) => day,
        None => return 1,
    };
    let week = value.date().iso_week().week() as i64;
    let first_week = first.iso_week().week() as i64;
    (week - first_week + 1).max(1) as u32
}

/// How many times this day-of-week has occurred in the month so far.
fn days_occurred_in_month(value: &NaiveDateTime) -> u32 {
    (value.day() - 1) / 7 + 1
}

/// Render a date format string against a timestamp.
///
/// Unknown field codes fail with [`Error::Unsupported`]; the caller
/// substitutes its documented placeholder.
pub fn format_date(format: &str, value: &NaiveDateTime) -> Result<String> {
    let chars: Vec<char> = format.chars().collect();
    let mut index = 0;
    let mut in_string = false;
    let mut in_field = false;
    let mut result = String::new();
    let mut field = String::new();

    while index < chars.len() {
        let current = chars[index];
        let next = chars.get(index + 1).copied();

        if current == '\'' {
            if next.is_none() {
                break;
            } else if next == Some('\'') {
                result.push('\'');
                index += 2;
            } else if in_string {
                in_string = false;
                index += 1;
            } else {
                in_string = true;
                if in_field {
                    result.push_str(&render_field(&field, value)?);
                    in_field = false;
                }
                index += 1;
            }
        } else if in_string {
            result.push(current);
            index += 1;
        } else if !current.is_alphabetic() {
            if in_field {
                result.push_str(&render_field(&field, value)?);
                in_field = false;
            }
            result.push(current);
            index += 1;
        } else if in_field {
            field.push(current);
            index += 1;
        } else {
            in_field = true;
            field = current.to_string();
            index += 1;
        }
    }
    if in_field {
        result.push_str(&render_field(&field, value)?);
    }

    Ok(result)
}
