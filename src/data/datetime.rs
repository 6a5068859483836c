// src/data/datetime.rs

//! Datetime type aliases and conversion helpers for _logdexlib_.
//!
//! Thin wrappers over crate [`chrono`]. Log formats parse timestamp strings
//! into Unix epoch [`Seconds`] plus [`Millis`]; a `LogLine` only stores those
//! two scalars.
//!
//! [`chrono`]: https://docs.rs/chrono/latest/chrono/

use std::time::{SystemTime, UNIX_EPOCH};

extern crate chrono;
pub use chrono::{
    DateTime,
    Datelike,
    NaiveDate,
    NaiveDateTime,
    TimeZone,
    Utc,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whole seconds since the Unix epoch.
pub type Seconds = i64;

/// Fractional milliseconds `0‥=999` paired with a [`Seconds`] value.
pub type Millis = u16;

/// A calendar year, e.g. `2024`.
pub type Year = i32;

/// Convert a [`SystemTime`] to epoch [`Seconds`].
///
/// Times before the epoch saturate to `0`.
pub fn systemtime_to_seconds(systemtime: &SystemTime) -> Seconds {
    match systemtime.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs() as Seconds,
        Err(_) => 0,
    }
}

/// The calendar year of epoch [`Seconds`] `seconds`, in UTC.
///
/// Used to resolve formats whose timestamps omit the year (RFC 3164
/// syslog). A zero or unrepresentable value resolves to the epoch year.
pub fn seconds_to_year(seconds: Seconds) -> Year {
    match DateTime::<Utc>::from_timestamp(seconds, 0) {
        Some(dt) => dt.year(),
        None => 1970,
    }
}

/// Convert a [`NaiveDateTime`] (presumed UTC) to epoch [`Seconds`].
pub fn naive_to_seconds(ndt: &NaiveDateTime) -> Seconds {
    ndt.and_utc().timestamp()
}
