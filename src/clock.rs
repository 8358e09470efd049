// src/clock.rs
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Source of "now". Injected so record stamps are reproducible in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Render an instant in UTC as RFC3339 with microseconds, e.g.
/// `2017-07-27T17:27:46.216527+00:00`.
pub fn rfc3339_micros<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Instant from fractional seconds since the epoch.
pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let micros = (seconds * 1_000_000.0).round() as i64;
    DateTime::from_timestamp_micros(micros)
}

/// Interpret a record value as an instant.
///
/// Accepts RFC3339 strings, naive ISO 8601 strings (taken as UTC), numeric
/// strings and numbers (fractional epoch seconds).
pub fn parse_instant(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(text) => parse_instant_str(text),
        Value::Number(n) => n
            .as_f64()
            .and_then(from_epoch_seconds)
            .map(|dt| dt.fixed_offset()),
        _ => None,
    }
}

fn parse_instant_str(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    text.parse::<f64>()
        .ok()
        .and_then(from_epoch_seconds)
        .map(|dt| dt.fixed_offset())
}
