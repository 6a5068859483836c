// src/data/logline.rs

//! Implement the [`LogLine`] entity, one entry of a
//! [`LogLineIndex`].
//!
//! [`LogLine`]: crate::data::logline::LogLine
//! [`LogLineIndex`]: crate::data::index::LogLineIndex

use crate::common::FileOffset;
use crate::data::datetime::{Millis, Seconds};

use std::cmp::Ordering;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LogLevel and LevelAndFlags
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Packed severity and flag bits of a [`LogLine`].
///
/// Low byte holds the [`LogLevel`] discriminant, high byte holds the
/// `LEVEL_*` flag bits.
pub type LevelAndFlags = u16;

/// Mask of the [`LogLevel`] discriminant within a [`LevelAndFlags`] word.
pub const LEVEL_MASK: LevelAndFlags = 0x00FF;

/// Flag bit: this line is a continuation of the preceding record.
pub const LEVEL_CONTINUED: LevelAndFlags = 0x0100;

/// Flag bit: this line's parsed timestamp regressed and was clamped to the
/// predecessor's timestamp.
pub const LEVEL_TIME_SKEW: LevelAndFlags = 0x0200;

/// Flag bit: the line's bytes are valid UTF-8 as reported by the line
/// buffer.
pub const LEVEL_VALID_UTF: LevelAndFlags = 0x0400;

/// Severity of a [`LogLine`] as recognized by a log format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// severity could not be determined, the default
    #[default]
    Unknown = 0,
    Trace = 1,
    Debug = 2,
    Info = 3,
    Warning = 4,
    Error = 5,
    Critical = 6,
    Fatal = 7,
}

impl LogLevel {
    /// The `LogLevel` packed into the low byte of `word`.
    ///
    /// Unmapped discriminants resolve to [`LogLevel::Unknown`].
    pub const fn from_level_and_flags(word: LevelAndFlags) -> Self {
        match word & LEVEL_MASK {
            1 => LogLevel::Trace,
            2 => LogLevel::Debug,
            3 => LogLevel::Info,
            4 => LogLevel::Warning,
            5 => LogLevel::Error,
            6 => LogLevel::Critical,
            7 => LogLevel::Fatal,
            _ => LogLevel::Unknown,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        match self {
            LogLevel::Unknown => write!(f, "UNKNOWN"),
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Critical => write!(f, "CRITICAL"),
            LogLevel::Fatal => write!(f, "FATAL"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LogLine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sub-offset of a [`LogLine`] within a multi-record physical line.
///
/// `0` for the anchor record; strictly increasing for further records
/// sharing the anchor's byte [`FileOffset`].
pub type SubOffset = u16;

/// Small integer tag assigned by a log format, e.g. a module table index.
pub type ModuleId = u8;

/// Small integer operation-id tag assigned by a log format.
pub type OpId = u8;

/// Compact per-line metadata, one entry of the index.
///
/// Represents either a recognized anchor line or a continuation byte-range.
/// Comparison (and therefore equality) orders by `(time, millis)`
/// ascending, nothing else; two records at different offsets with the same
/// timestamp compare equal.
#[derive(Clone, Copy)]
pub struct LogLine {
    /// Byte position in the logical (decompressed) stream where the line
    /// begins.
    offset: FileOffset,
    /// `0` for an anchor; strictly increasing for records sharing `offset`.
    sub_offset: SubOffset,
    /// Whole seconds of the line's timestamp.
    time: Seconds,
    /// Milliseconds of the line's timestamp.
    millis: Millis,
    /// Packed severity and `LEVEL_*` flags.
    level_and_flags: LevelAndFlags,
    /// Module tag set by the recognizer.
    module_id: ModuleId,
    /// Operation-id tag set by the recognizer.
    opid: OpId,
}

impl LogLine {
    /// Create a new `LogLine` at byte `offset` with packed
    /// `level_and_flags`.
    pub const fn new(
        offset: FileOffset,
        time: Seconds,
        millis: Millis,
        level_and_flags: LevelAndFlags,
        module_id: ModuleId,
        opid: OpId,
    ) -> LogLine {
        LogLine {
            offset,
            sub_offset: 0,
            time,
            millis,
            level_and_flags,
            module_id,
            opid,
        }
    }

    /// Create a new `LogLine` from an unpacked [`LogLevel`].
    pub const fn with_level(
        offset: FileOffset,
        time: Seconds,
        millis: Millis,
        level: LogLevel,
        module_id: ModuleId,
        opid: OpId,
    ) -> LogLine {
        LogLine::new(offset, time, millis, level as LevelAndFlags, module_id, opid)
    }

    #[inline(always)]
    pub const fn get_offset(&self) -> FileOffset {
        self.offset
    }

    #[inline(always)]
    pub const fn get_sub_offset(&self) -> SubOffset {
        self.sub_offset
    }

    pub fn set_sub_offset(
        &mut self,
        sub_offset: SubOffset,
    ) {
        self.sub_offset = sub_offset;
    }

    #[inline(always)]
    pub const fn get_time(&self) -> Seconds {
        self.time
    }

    pub fn set_time(
        &mut self,
        time: Seconds,
    ) {
        self.time = time;
    }

    #[inline(always)]
    pub const fn get_millis(&self) -> Millis {
        self.millis
    }

    pub fn set_millis(
        &mut self,
        millis: Millis,
    ) {
        self.millis = millis;
    }

    /// The raw packed severity + flags word.
    #[inline(always)]
    pub const fn get_level_and_flags(&self) -> LevelAndFlags {
        self.level_and_flags
    }

    /// The severity with flag bits masked off.
    #[inline(always)]
    pub const fn get_level(&self) -> LogLevel {
        LogLevel::from_level_and_flags(self.level_and_flags)
    }

    /// Does this line belong to the preceding record?
    #[inline(always)]
    pub const fn is_continued(&self) -> bool {
        self.level_and_flags & LEVEL_CONTINUED != 0
    }

    /// Was this line's timestamp clamped to preserve monotonicity?
    #[inline(always)]
    pub const fn is_time_skew(&self) -> bool {
        self.level_and_flags & LEVEL_TIME_SKEW != 0
    }

    pub fn set_time_skew(
        &mut self,
        time_skew: bool,
    ) {
        if time_skew {
            self.level_and_flags |= LEVEL_TIME_SKEW;
        } else {
            self.level_and_flags &= !LEVEL_TIME_SKEW;
        }
    }

    /// Are the line's bytes valid UTF-8?
    #[inline(always)]
    pub const fn is_valid_utf(&self) -> bool {
        self.level_and_flags & LEVEL_VALID_UTF != 0
    }

    pub fn set_valid_utf(
        &mut self,
        valid_utf: bool,
    ) {
        if valid_utf {
            self.level_and_flags |= LEVEL_VALID_UTF;
        } else {
            self.level_and_flags &= !LEVEL_VALID_UTF;
        }
    }

    #[inline(always)]
    pub const fn get_module_id(&self) -> ModuleId {
        self.module_id
    }

    #[inline(always)]
    pub const fn get_opid(&self) -> OpId {
        self.opid
    }
}

impl PartialEq for LogLine {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        (self.time, self.millis) == (other.time, other.millis)
    }
}

impl Eq for LogLine {}

impl PartialOrd for LogLine {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogLine {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        (self.time, self.millis).cmp(&(other.time, other.millis))
    }
}

impl fmt::Debug for LogLine {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("LogLine")
            .field("offset", &self.offset)
            .field("sub_offset", &self.sub_offset)
            .field("time", &self.time)
            .field("millis", &self.millis)
            .field("level", &self.get_level())
            .field("continued?", &self.is_continued())
            .field("time_skew?", &self.is_time_skew())
            .field("valid_utf?", &self.is_valid_utf())
            .field("module_id", &self.module_id)
            .field("opid", &self.opid)
            .finish()
    }
}
