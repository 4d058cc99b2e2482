//! Calendar-date handling shared by the normalizer, the classifier and edit payloads.

use anyhow::{anyhow, Context, Result};
use chrono::{prelude::*, Days, Duration, Months, SecondsFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static CALENDAR_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// True when `raw` is a plain `YYYY-MM-DD` value with no time component.
pub fn is_calendar_date(raw: &str) -> bool {
    CALENDAR_DATE_RE.is_match(raw.trim())
}

/// Reads a date out of any string shape the backends have produced.
///
/// Timestamps keep the calendar day they were written in, so a date stored as
/// UTC midnight reads back as the same day regardless of the local offset.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_calendar_date(trimmed) {
        return NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok();
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.date_naive());
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|datetime| datetime.date())
}

pub fn date_from_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(raw) => parse_calendar_date(raw),
        Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|instant| instant.with_timezone(&Local).date_naive()),
        _ => None,
    }
}

pub fn instant_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
                return Some(parsed.with_timezone(&Utc));
            }
            if is_calendar_date(trimmed) {
                return NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .ok()
                    .map(utc_midnight);
            }
            NAIVE_DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(number) => number.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

pub fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Converts an edited date field into the value sent to the backend.
///
/// Empty input clears the field, a plain calendar date is sent as UTC
/// midnight of that day, and anything else goes through untouched.
pub fn remote_date_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if is_calendar_date(trimmed) {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Value::String(
                utc_midnight(date).to_rfc3339_opts(SecondsFormat::Millis, true),
            );
        }
    }
    Value::String(raw.to_string())
}

/// Parses the date shorthands accepted on the command line into a calendar day.
pub fn parse_date_spec(spec: &str, today: NaiveDate) -> Result<NaiveDate> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Date specification cannot be empty"));
    }

    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if lower.starts_with('+') {
        return parse_relative_spec(&lower, today);
    }

    if let Some(weekday) = parse_weekday(&lower) {
        let mut days_ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        if days_ahead == 0 {
            days_ahead = 7;
        }
        return Ok(today + Duration::days(days_ahead));
    }

    parse_calendar_date(trimmed).ok_or_else(|| {
        anyhow!(
            "Unrecognized date specification '{}'. Try YYYY-MM-DD, today, tomorrow, +3d, mon",
            spec
        )
    })
}

fn parse_relative_spec(spec: &str, today: NaiveDate) -> Result<NaiveDate> {
    let body = spec.strip_prefix('+').unwrap_or(spec);
    let (split, unit) = body
        .char_indices()
        .last()
        .ok_or_else(|| anyhow!("Relative date '{}' is too short", spec))?;
    let number_part = &body[..split];
    if number_part.is_empty() {
        return Err(anyhow!("Relative date '{}' is too short", spec));
    }
    let value: i64 = number_part.parse().context("Invalid relative offset")?;
    let shifted = match unit {
        'd' => shift_days(today, value),
        'w' => value
            .checked_mul(7)
            .and_then(|days| shift_days(today, days)),
        'm' => {
            let months = Months::new(value.try_into()?);
            today.checked_add_months(months)
        }
        other => {
            return Err(anyhow!(
                "Unsupported relative unit '{}'. Use d, w, or m.",
                other
            ))
        }
    };
    shifted.ok_or_else(|| anyhow!("Relative date '{}' is out of range", spec))
}

fn shift_days(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    let span = Days::new(days.unsigned_abs());
    if days >= 0 {
        today.checked_add_days(span)
    } else {
        today.checked_sub_days(span)
    }
}

fn parse_weekday(label: &str) -> Option<Weekday> {
    match label {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
