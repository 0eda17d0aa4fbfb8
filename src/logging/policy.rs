//! Rotation, retention and compression rules for file sinks
//!
//! The rules are written as short human strings (`"10 MB"`, `"30 days"`,
//! `"zip"`) so they can come straight from environment variables.

use std::str::FromStr;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};

use super::settings::SettingsError;

/// When a file sink starts a new file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rotation {
    /// Never rotate
    Never,
    /// Rotate before a write would push the file past this many bytes
    Size(u64),
    /// Rotate once this much time has passed since the file was opened
    Interval(Duration),
    /// Rotate every day at the given local time
    Daily(NaiveTime),
    /// Rotate at the start of every hour
    Hourly,
    /// Rotate every Monday at midnight
    Weekly,
}

impl Rotation {
    /// Next time-based rotation point after `now`, or None for rules that
    /// do not depend on the clock.
    pub fn next_boundary(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Rotation::Never | Rotation::Size(_) => None,
            Rotation::Interval(interval) => {
                let delta = chrono::Duration::from_std(*interval).ok()?;
                now.checked_add_signed(delta)
            }
            Rotation::Daily(at) => {
                let today = now.date().and_time(*at);
                if today > now {
                    Some(today)
                } else {
                    today.checked_add_signed(chrono::Duration::days(1))
                }
            }
            Rotation::Hourly => {
                let hour = now.date().and_hms_opt(now.hour(), 0, 0)?;
                hour.checked_add_signed(chrono::Duration::hours(1))
            }
            Rotation::Weekly => {
                let days = 7 - i64::from(now.weekday().num_days_from_monday());
                let midnight = now.date().and_hms_opt(0, 0, 0)?;
                midnight.checked_add_signed(chrono::Duration::days(days))
            }
        }
    }
}

impl FromStr for Rotation {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rule = s.trim().to_lowercase();
        match rule.as_str() {
            "never" | "none" => return Ok(Rotation::Never),
            "hourly" => return Ok(Rotation::Hourly),
            "daily" => return Ok(Rotation::Daily(NaiveTime::MIN)),
            "weekly" => return Ok(Rotation::Weekly),
            _ => {}
        }

        let time_rule = rule.strip_prefix("at ").unwrap_or(rule.as_str());
        if let Some(at) = parse_time_of_day(time_rule) {
            return Ok(Rotation::Daily(at));
        }
        if let Some(bytes) = parse_size(&rule) {
            return Ok(Rotation::Size(bytes));
        }
        if let Some(interval) = parse_duration(&rule) {
            return Ok(Rotation::Interval(interval));
        }
        Err(SettingsError::InvalidRotation(s.to_string()))
    }
}

/// Which closed files a sink keeps around
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retention {
    /// Keep everything
    Forever,
    /// Remove files last modified longer ago than this
    Age(Duration),
    /// Keep only this many of the most recent files
    Count(usize),
}

impl FromStr for Retention {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rule = s.trim().to_lowercase();
        match rule.as_str() {
            "forever" | "never" | "none" => return Ok(Retention::Forever),
            _ => {}
        }
        if let Ok(count) = rule.parse::<usize>() {
            return Ok(Retention::Count(count));
        }
        parse_duration(&rule)
            .map(Retention::Age)
            .ok_or_else(|| SettingsError::InvalidRetention(s.to_string()))
    }
}

/// Archive format applied to closed files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zip,
}

impl FromStr for Compression {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Compression::None),
            "gz" | "gzip" => Ok(Compression::Gzip),
            "zip" => Ok(Compression::Zip),
            _ => Err(SettingsError::InvalidCompression(s.to_string())),
        }
    }
}

/// Split `"10.5 MB"` into `(10.5, "MB")`
fn split_number(text: &str) -> Option<(f64, &str)> {
    let text = text.trim();
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    let value = text[..end].parse::<f64>().ok()?;
    Some((value, text[end..].trim()))
}

/// Decimal units are powers of 1000, binary (`KiB`) powers of 1024.
/// A bare number is a byte count.
fn parse_size(text: &str) -> Option<u64> {
    let (value, unit) = split_number(text)?;
    let multiplier: f64 = match unit.to_lowercase().as_str() {
        "" | "b" => 1.0,
        "kb" => 1e3,
        "mb" => 1e6,
        "gb" => 1e9,
        "tb" => 1e12,
        "kib" => 1024.0,
        "mib" => 1024.0 * 1024.0,
        "gib" => 1024.0 * 1024.0 * 1024.0,
        "tib" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    let bytes = (value * multiplier).round();
    if bytes < 1.0 || !bytes.is_finite() {
        return None;
    }
    Some(bytes as u64)
}

fn unit_seconds(unit: &str) -> Option<f64> {
    let seconds = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
        "d" | "day" | "days" => 86_400.0,
        "w" | "week" | "weeks" => 7.0 * 86_400.0,
        "month" | "months" => 30.0 * 86_400.0,
        "y" | "year" | "years" => 365.0 * 86_400.0,
        _ => return None,
    };
    Some(seconds)
}

/// Parse `"30 days"`, `"12h"` or `"1 week, 3 days"`
pub(crate) fn parse_duration(text: &str) -> Option<Duration> {
    let mut total = 0.0;
    let mut parts = 0;
    for part in text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (value, unit) = split_number(part)?;
        total += value * unit_seconds(&unit.to_lowercase())?;
        parts += 1;
    }
    if parts == 0 || !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(total))
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}
