// src/readers/logformat.rs

//! Implements the [`LogFormat`] recognizer trait, the format registry, and
//! the built-in recognizers.
//!
//! A `LogFormat` inspects one line's bytes at a time and, on a match,
//! appends a [`LogLine`] carrying the parsed timestamp and severity to the
//! [`LogLineIndex`]. The driver in
//! [`LogFile`] owns candidate instances,
//! tries them in registry order until one matches, then locks in a
//! [`specialized`] clone for the rest of the file's lifetime.
//!
//! [`LogLine`]: crate::data::logline::LogLine
//! [`LogLineIndex`]: crate::data::index::LogLineIndex
//! [`LogFile`]: crate::readers::logfile::LogFile
//! [`specialized`]: LogFormat::specialized

use crate::common::FPath;
use crate::data::datetime::{
    naive_to_seconds,
    seconds_to_year,
    Millis,
    NaiveDate,
    NaiveDateTime,
    Seconds,
    Year,
};
use crate::data::index::LogLineIndex;
use crate::data::logline::{LogLevel, LogLine, OpId};
use crate::readers::helpers::basename;
use crate::readers::linebuffer::LineInfo;

use std::ops::Range;

use ::lazy_static::lazy_static;
use ::memchr::memmem;
use ::regex::bytes::Regex;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ScanResult and the LogFormat trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of one [`LogFormat::scan`] call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanResult {
    /// The recognizer appended one or more [`LogLine`] to the index.
    ///
    /// [`LogLine`]: crate::data::logline::LogLine
    ScanMatch,
    /// The line does not belong to this format.
    ScanNoMatch,
    /// The line cannot be decided yet; retry when more bytes arrive.
    ScanIncomplete,
}

/// Byte range within a line's bytes, as returned by
/// [`LogFormat::get_subline`].
pub type SublineRange = Range<usize>;

/// A log-format recognizer.
///
/// Implementations are stateful during detection (`clear` resets that
/// state) and are cloned via `specialized` once locked to a file.
pub trait LogFormat {
    /// Short stable name, e.g. `"syslog"`.
    fn get_name(&self) -> &'static str;

    /// Is a file at `path` a plausible candidate for this format?
    ///
    /// Called with the `LogFile`'s path before any bytes are inspected.
    fn match_name(
        &self,
        _path: &FPath,
    ) -> bool {
        true
    }

    /// Reset per-file detection state.
    fn clear(&mut self);

    /// A clone of this recognizer specialized to one file; the clone is
    /// owned by the `LogFile` after lock-in.
    fn specialized(&self) -> Box<dyn LogFormat>;

    /// Inspect one line. On [`ScanResult::ScanMatch`] the recognizer has
    /// appended the parsed record(s) to `index`.
    fn scan(
        &mut self,
        index: &mut LogLineIndex,
        line_info: &LineInfo,
        bytes: &[u8],
    ) -> ScanResult;

    /// The displayable sub-range of `bytes` for `line`.
    ///
    /// The default is the whole line. `expand_continues` asks for the
    /// range covering a full multi-line record.
    fn get_subline(
        &self,
        _line: &LogLine,
        bytes: &[u8],
        _expand_continues: bool,
    ) -> SublineRange {
        0..bytes.len()
    }

    /// Does this format promise non-decreasing timestamps?
    fn is_time_ordered(&self) -> bool;

    /// Wall-clock base used to resolve timestamps that omit fields
    /// (typically the year).
    fn set_base_time(
        &mut self,
        time: Seconds,
    );
}

/// The format registry: every known recognizer, in declared order.
///
/// Detection tries candidates in this order; more specific formats come
/// first.
pub fn root_formats() -> Vec<Box<dyn LogFormat>> {
    vec![
        Box::new(SyslogFormat::default()),
        Box::new(TimestampedFormat::default()),
    ]
}

/// Parse a severity word, e.g. `b"WARN"`, case-insensitive.
pub fn level_from_bytes(bytes: &[u8]) -> LogLevel {
    for (name, level) in [
        (&b"TRACE"[..], LogLevel::Trace),
        (&b"DEBUG"[..], LogLevel::Debug),
        (&b"INFO"[..], LogLevel::Info),
        (&b"WARN"[..], LogLevel::Warning),
        (&b"WARNING"[..], LogLevel::Warning),
        (&b"ERROR"[..], LogLevel::Error),
        (&b"ERR"[..], LogLevel::Error),
        (&b"CRITICAL"[..], LogLevel::Critical),
        (&b"CRIT"[..], LogLevel::Critical),
        (&b"FATAL"[..], LogLevel::Fatal),
    ] {
        if bytes.eq_ignore_ascii_case(name) {
            return level;
        }
    }

    LogLevel::Unknown
}

/// Infer a severity from message content when the format carries no
/// explicit level field.
fn level_from_message(bytes: &[u8]) -> LogLevel {
    let lower: Vec<u8> = bytes.to_ascii_lowercase();
    if memmem::find(&lower, b"error").is_some() || memmem::find(&lower, b"fail").is_some() {
        return LogLevel::Error;
    }
    if memmem::find(&lower, b"warn").is_some() {
        return LogLevel::Warning;
    }

    LogLevel::Info
}

/// Scale a fractional-seconds capture of 1‥=3 digits to milliseconds.
fn frac_to_millis(frac: &[u8]) -> Millis {
    let mut millis: u32 = 0;
    for byte in frac.iter().take(3) {
        millis = millis * 10 + (byte - b'0') as u32;
    }
    for _ in frac.len()..3 {
        millis *= 10;
    }

    millis as Millis
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TimestampedFormat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shortest possible `YYYY-MM-DD HH:MM:SS` prefix.
const TIMESTAMPED_PREFIX_MIN: usize = 19;

lazy_static! {
    /// `2024-01-01 00:00:00.123 INFO …` and ISO-8601-ish variants
    static ref TIMESTAMPED_REGEX: Regex = Regex::new(
        r"(?x)
        ^(?P<date>\d{4}-\d{2}-\d{2})
        [\ T]
        (?P<time>\d{2}:\d{2}:\d{2})
        (?:[.,](?P<frac>\d{1,3})\d*)?
        (?:Z|[+-]\d{2}:?\d{2})?
        (?:\s+\[?(?P<level>[A-Za-z]{3,8})\]?)?
        "
    )
    .unwrap();
}

/// Recognizer for lines led by a `YYYY-MM-DD HH:MM:SS[.fff]` timestamp
/// with an optional severity word. Matches any filename.
///
/// Stateless: its timestamps are absolute, so the base time is unused
/// and there is no per-file detection state.
#[derive(Clone, Debug, Default)]
pub struct TimestampedFormat {}

impl LogFormat for TimestampedFormat {
    fn get_name(&self) -> &'static str {
        "timestamped"
    }

    fn clear(&mut self) {}

    fn specialized(&self) -> Box<dyn LogFormat> {
        Box::new(self.clone())
    }

    fn scan(
        &mut self,
        index: &mut LogLineIndex,
        line_info: &LineInfo,
        bytes: &[u8],
    ) -> ScanResult {
        if line_info.partial && bytes.len() < TIMESTAMPED_PREFIX_MIN {
            return ScanResult::ScanIncomplete;
        }
        let captures = match TIMESTAMPED_REGEX.captures(bytes) {
            Some(captures) => captures,
            None => return ScanResult::ScanNoMatch,
        };
        // capture groups `date` and `time` always participate in a match
        let date = captures.name("date").unwrap();
        let time = captures.name("time").unwrap();
        let stamp: String = format!(
            "{} {}",
            String::from_utf8_lossy(date.as_bytes()),
            String::from_utf8_lossy(time.as_bytes()),
        );
        let ndt: NaiveDateTime = match NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S") {
            Ok(ndt) => ndt,
            // a lexically plausible but impossible date, e.g. month 13
            Err(_) => return ScanResult::ScanNoMatch,
        };
        let millis: Millis = captures
            .name("frac")
            .map(|m| frac_to_millis(m.as_bytes()))
            .unwrap_or(0);
        let level: LogLevel = captures
            .name("level")
            .map(|m| level_from_bytes(m.as_bytes()))
            .unwrap_or(LogLevel::Unknown);
        index.push(LogLine::with_level(
            line_info.file_range.offset,
            naive_to_seconds(&ndt),
            millis,
            level,
            0,
            0,
        ));

        ScanResult::ScanMatch
    }

    fn is_time_ordered(&self) -> bool {
        true
    }

    fn set_base_time(
        &mut self,
        _time: Seconds,
    ) {
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SyslogFormat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shortest possible `Mmm dd HH:MM:SS` prefix.
const SYSLOG_PREFIX_MIN: usize = 15;

lazy_static! {
    /// RFC 3164 `Jan  2 03:04:05 host tag[pid]: message`
    static ref SYSLOG_REGEX: Regex = Regex::new(
        r"(?x)
        ^(?P<mon>Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)
        \ (?P<day>[\ 0-3]?\d)
        \ (?P<hour>\d{2}):(?P<minute>\d{2}):(?P<second>\d{2})
        \ (?P<host>\S+)
        \ (?P<tag>[^\ :\[]+)
        (?:\[(?P<pid>\d+)\])?
        :?\ ?
        "
    )
    .unwrap();
    /// filenames this format will try: `syslog`, `messages`, rotations
    static ref SYSLOG_MATCH_NAME: Regex =
        Regex::new(r"(?i)^(syslog|messages)(\.|$)|\.log(\.|$)").unwrap();
}

const MONTH_ABBREVIATIONS: [&[u8]; 12] = [
    b"Jan", b"Feb", b"Mar", b"Apr", b"May", b"Jun", b"Jul", b"Aug", b"Sep", b"Oct", b"Nov",
    b"Dec",
];

/// Recognizer for RFC 3164 syslog lines. The year is absent from the
/// wire format and is resolved from the base time.
#[derive(Clone, Debug, Default)]
pub struct SyslogFormat {
    base_time: Seconds,
}

impl LogFormat for SyslogFormat {
    fn get_name(&self) -> &'static str {
        "syslog"
    }

    fn match_name(
        &self,
        path: &FPath,
    ) -> bool {
        SYSLOG_MATCH_NAME.is_match(basename(path).as_bytes())
    }

    fn clear(&mut self) {
        self.base_time = 0;
    }

    fn specialized(&self) -> Box<dyn LogFormat> {
        Box::new(self.clone())
    }

    fn scan(
        &mut self,
        index: &mut LogLineIndex,
        line_info: &LineInfo,
        bytes: &[u8],
    ) -> ScanResult {
        if line_info.partial && bytes.len() < SYSLOG_PREFIX_MIN {
            return ScanResult::ScanIncomplete;
        }
        let captures = match SYSLOG_REGEX.captures(bytes) {
            Some(captures) => captures,
            None => return ScanResult::ScanNoMatch,
        };
        let month: u32 = MONTH_ABBREVIATIONS
            .iter()
            .position(|abbr| *abbr == captures.name("mon").unwrap().as_bytes())
            .unwrap() as u32
            + 1;
        let day: u32 = ascii_to_u32(captures.name("day").unwrap().as_bytes());
        let hour: u32 = ascii_to_u32(captures.name("hour").unwrap().as_bytes());
        let minute: u32 = ascii_to_u32(captures.name("minute").unwrap().as_bytes());
        let second: u32 = ascii_to_u32(captures.name("second").unwrap().as_bytes());
        let year: Year = seconds_to_year(self.base_time);
        let ndt: NaiveDateTime = match NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
        {
            Some(ndt) => ndt,
            None => return ScanResult::ScanNoMatch,
        };
        let opid: OpId = captures
            .name("pid")
            .map(|m| (ascii_to_u32(m.as_bytes()) & 0xFF) as OpId)
            .unwrap_or(0);
        let message_beg: usize = captures
            .get(0)
            .map(|m| m.end())
            .unwrap_or(0);
        let level: LogLevel = level_from_message(&bytes[message_beg..]);
        index.push(LogLine::with_level(
            line_info.file_range.offset,
            naive_to_seconds(&ndt),
            0,
            level,
            0,
            opid,
        ));

        ScanResult::ScanMatch
    }

    fn is_time_ordered(&self) -> bool {
        true
    }

    fn set_base_time(
        &mut self,
        time: Seconds,
    ) {
        self.base_time = time;
    }
}

/// Parse a small ASCII decimal, tolerating a leading space (`" 2"`).
fn ascii_to_u32(bytes: &[u8]) -> u32 {
    let mut value: u32 = 0;
    for byte in bytes.iter() {
        if !byte.is_ascii_digit() {
            continue;
        }
        value = value * 10 + (byte - b'0') as u32;
    }

    value
}
