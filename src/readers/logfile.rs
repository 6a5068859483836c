// src/readers/logfile.rs

//! Implements the [`LogFile`], the incremental indexing state machine.
//!
//! A `LogFile` owns one [`LineBuffer`] and one [`LogLineIndex`]. Repeated
//! calls to [`rebuild_index`] fold newly arrived bytes into the index:
//! the tail record is rolled back (it may have been a partial read), the
//! line buffer produces [`LineInfo`] records, and each line's bytes are
//! fed to the format-detection driver which appends parsed records,
//! continuation records, or defers. Observers are notified in strict
//! index order.
//!
//! [`LineBuffer`]: crate::readers::linebuffer::LineBuffer
//! [`LogLineIndex`]: crate::data::index::LogLineIndex
//! [`LineInfo`]: crate::readers::linebuffer::LineInfo
//! [`rebuild_index`]: LogFile::rebuild_index

use crate::common::{Bytes, Count, FPath, File, FileMetadata, FileOffset, FileSz, TextFormat};
use crate::data::datetime::{Millis, Seconds};
use crate::data::index::LogLineIndex;
use crate::data::logline::{
    LevelAndFlags,
    LogLevel,
    LogLine,
    ModuleId,
    OpId,
    LEVEL_CONTINUED,
};
use crate::readers::helpers::{
    detect_text_format,
    fpath_to_path,
    rtrim_line_endings,
    scrub_to_utf8,
};
use crate::readers::linebuffer::{FileRange, LineBuffer, LineInfo};
use crate::readers::logformat::{root_formats, LogFormat, ScanResult};

use std::fmt;
use std::os::unix::fs::MetadataExt;
use std::time::{Duration, Instant};

#[allow(unused_imports)]
use ::more_asserts::{debug_assert_ge, debug_assert_le};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};
use ::xxhash_rust::xxh3::xxh3_64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `errno` value for "invalid argument", raised when the path is not a
/// regular file.
const EINVAL: i32 = 22;

/// What went wrong inside a [`LogFile`] operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogFileErrorKind {
    /// the path could not be resolved to a real file
    PathResolution,
    /// `stat`/`fstat` failed
    Stat,
    /// the path does not name a regular file
    NotRegularFile,
    /// `open` failed
    Open,
    /// a previously indexed byte range could not be re-read
    ReadOverwritten,
    /// a read inside the rebuild loop failed
    ReadIo,
    /// the line buffer refused an operation
    LineBufferError,
}

/// Domain error of a [`LogFile`]: the offending path (or a message) and
/// the `errno` captured at the failing system call.
///
/// Raised only from construction and from a rebuild's `fstat` failure;
/// everything else is folded into [`RebuildResult`] per the overwrite
/// policy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogFileError {
    kind: LogFileErrorKind,
    path: FPath,
    errno: i32,
}

impl LogFileError {
    pub fn new(
        kind: LogFileErrorKind,
        path: &FPath,
        errno: i32,
    ) -> LogFileError {
        LogFileError {
            kind,
            path: path.clone(),
            errno,
        }
    }

    fn from_io(
        kind: LogFileErrorKind,
        path: &FPath,
        error: &std::io::Error,
    ) -> LogFileError {
        LogFileError::new(
            kind,
            path,
            error
                .raw_os_error()
                .unwrap_or(0),
        )
    }

    #[inline(always)]
    pub const fn kind(&self) -> LogFileErrorKind {
        self.kind
    }

    #[inline(always)]
    pub fn path(&self) -> &FPath {
        &self.path
    }

    #[inline(always)]
    pub const fn errno(&self) -> i32 {
        self.errno
    }
}

impl fmt::Display for LogFileError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(f, "{:?}: {} (errno {})", self.kind, self.path, self.errno)
    }
}

impl std::error::Error for LogFileError {}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// observers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Receiver of per-line indexing notifications.
///
/// Callbacks are invoked synchronously from within
/// [`LogFile::rebuild_index`], in strict index order, followed by exactly
/// one `logline_eof`. `logline_restart` is delivered exactly once, before
/// any `logline_new_line`, when and only when at least one tail entry was
/// rolled back. Re-entrant calls into the `LogFile` from a callback are
/// impossible by construction (`&LogFile` is shared).
pub trait LoglineObserver {
    fn logline_restart(
        &mut self,
        logfile: &LogFile,
        rollback_count: Count,
    );

    fn logline_new_line(
        &mut self,
        logfile: &LogFile,
        index: usize,
        bytes: &[u8],
    );

    fn logline_eof(
        &mut self,
        logfile: &LogFile,
    );
}

/// Receiver of coarse indexing-progress notifications.
pub trait LogfileObserver {
    fn logfile_indexing(
        &mut self,
        logfile: &LogFile,
        bytes_done: FileOffset,
        bytes_total: FileSz,
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LogFile
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of one [`LogFile::rebuild_index`] call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RebuildResult {
    /// nothing new; also returned when an overwritten file was detected
    /// and closed
    NoNewLines,
    /// new lines were appended and timestamps remained consistent
    NewLines,
    /// new lines were appended and consumers should re-sort
    NewOrder,
    /// a verification or in-loop read failed; the file was closed
    Invalid,
}

/// Once this many lines accumulate without any recognizer matching,
/// auto-detection stops trying and the file stays format-less.
pub const MAX_UNRECOGNIZED_LINES: usize = 1000;

/// Initial bulk-pass instrumentation threshold in logical bytes.
const INITIAL_INDEX_DURATION_MIN_SZ: FileOffset = 512 * 1024;

/// Hash of the bytes that identify a file's content; starts as the hash
/// of the filename and becomes the hash of the first format-matched line.
pub type ContentId = u64;

/// `stat` snapshot used for rewrite and rotation detection.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FileStat {
    pub dev: u64,
    pub ino: u64,
    pub size: FileSz,
    pub mtime: Seconds,
}

impl From<&FileMetadata> for FileStat {
    fn from(metadata: &FileMetadata) -> FileStat {
        FileStat {
            dev: metadata.dev(),
            ino: metadata.ino(),
            size: metadata.len(),
            mtime: metadata.mtime(),
        }
    }
}

/// Options for [`LogFile::new`].
#[derive(Debug)]
pub struct LogFileOpenOptions {
    /// Pre-opened file to index instead of resolving and opening the
    /// path. A `LogFile` built this way reports `exists()` true
    /// unconditionally.
    pub file: Option<File>,
    /// Try the format registry against incoming lines.
    pub detect_format: bool,
}

impl Default for LogFileOpenOptions {
    fn default() -> Self {
        LogFileOpenOptions {
            file: None,
            detect_format: true,
        }
    }
}

impl LogFileOpenOptions {
    pub fn new() -> LogFileOpenOptions {
        LogFileOpenOptions::default()
    }

    pub fn with_fd(file: File) -> LogFileOpenOptions {
        LogFileOpenOptions {
            file: Some(file),
            detect_format: true,
        }
    }
}

/// Internal per-file activity counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFileActivity {
    /// `Count` of `rebuild_index` calls
    pub polls: Count,
    /// `Count` of `rebuild_index` calls that found new data
    pub reads: Count,
    /// wall-clock cost of the initial bulk index pass, recorded when it
    /// consumed more than 512 KiB
    pub initial_index_duration: Option<Duration>,
}

/// One indexed log file: the line buffer, the active format, the index,
/// and the bookkeeping scalars that keep them consistent across
/// incremental rebuilds.
pub struct LogFile {
    path: FPath,
    /// `false` when constructed from a pre-opened descriptor
    valid_filename: bool,
    is_closed: bool,
    line_buffer: LineBuffer,
    /// the locked-in specialized recognizer, `None` before lock-in
    format: Option<Box<dyn LogFormat>>,
    /// candidate recognizers tried during detection
    root_formats: Vec<Box<dyn LogFormat>>,
    detect_format: bool,
    index: LogLineIndex,
    /// byte offset one past the last fully indexed byte
    index_size: FileOffset,
    stat: FileStat,
    content_id: ContentId,
    text_format: TextFormat,
    longest_line: usize,
    /// the final indexed line has no terminating newline yet
    partial_line: bool,
    out_of_time_order_count: Count,
    sort_needed: bool,
    /// wall-clock base for lines indexed before any timestamp is known
    index_time: Seconds,
    /// single-slot cache: last queried anchor offset to its line length
    next_line_cache: Option<(FileOffset, usize)>,
    logline_observer: Option<Box<dyn LoglineObserver>>,
    logfile_observer: Option<Box<dyn LogfileObserver>>,
    activity: LogFileActivity,
}

impl fmt::Debug for LogFile {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("LogFile")
            .field("path", &self.path)
            .field("closed?", &self.is_closed)
            .field("format", &self.format.as_ref().map(|f| f.get_name()))
            .field("lines", &self.index.len())
            .field("index_size", &self.index_size)
            .field("content_id", &self.content_id)
            .field("text_format", &self.text_format)
            .field("partial_line?", &self.partial_line)
            .finish()
    }
}

impl LogFile {
    /// Construct a `LogFile` for `path`.
    ///
    /// Without a pre-opened descriptor in `options` this resolves the
    /// path, stats it, requires a regular file, and opens it read-only
    /// (close-on-exec is implied by `std` on this platform).
    pub fn new(
        path: FPath,
        mut options: LogFileOpenOptions,
    ) -> Result<LogFile, LogFileError> {
        defn!("({:?})", path);
        let (file, stat, valid_filename): (File, FileStat, bool) = match options.file.take() {
            None => {
                let resolved = std::fs::canonicalize(fpath_to_path(&path)).map_err(|err| {
                    LogFileError::from_io(LogFileErrorKind::PathResolution, &path, &err)
                })?;
                let metadata = std::fs::metadata(&resolved)
                    .map_err(|err| LogFileError::from_io(LogFileErrorKind::Stat, &path, &err))?;
                if !metadata.is_file() {
                    defx!("not a regular file");
                    return Err(LogFileError::new(LogFileErrorKind::NotRegularFile, &path, EINVAL));
                }
                let file = File::open(&resolved)
                    .map_err(|err| LogFileError::from_io(LogFileErrorKind::Open, &path, &err))?;
                let stat = FileStat::from(&metadata);
                defo!("opened {:?}; size {}; mtime {}", path, stat.size, stat.mtime);
                (file, stat, true)
            }
            Some(file) => {
                let metadata = file
                    .metadata()
                    .map_err(|err| LogFileError::from_io(LogFileErrorKind::Stat, &path, &err))?;
                (file, FileStat::from(&metadata), false)
            }
        };
        let mut line_buffer = LineBuffer::new();
        line_buffer
            .set_fd(file)
            .map_err(|err| LogFileError::from_io(LogFileErrorKind::LineBufferError, &path, &err))?;
        let content_id: ContentId = xxh3_64(path.as_bytes());
        defx!();

        Ok(LogFile {
            path,
            valid_filename,
            is_closed: false,
            line_buffer,
            format: None,
            root_formats: root_formats(),
            detect_format: options.detect_format,
            index: LogLineIndex::new(),
            index_size: 0,
            stat,
            content_id,
            text_format: TextFormat::Unknown,
            longest_line: 0,
            partial_line: false,
            out_of_time_order_count: 0,
            sort_needed: false,
            index_time: 0,
            next_line_cache: None,
            logline_observer: None,
            logfile_observer: None,
            activity: LogFileActivity::default(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // accessors

    #[inline(always)]
    pub fn path(&self) -> &FPath {
        &self.path
    }

    /// Count of indexed lines.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline(always)]
    pub fn index(&self) -> &LogLineIndex {
        &self.index
    }

    #[inline(always)]
    pub fn get(
        &self,
        index: usize,
    ) -> Option<&LogLine> {
        self.index.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogLine> {
        self.index.iter()
    }

    /// Byte offset one past the last fully indexed byte.
    #[inline(always)]
    pub const fn get_index_size(&self) -> FileOffset {
        self.index_size
    }

    #[inline(always)]
    pub const fn get_content_id(&self) -> ContentId {
        self.content_id
    }

    #[inline(always)]
    pub const fn get_text_format(&self) -> TextFormat {
        self.text_format
    }

    #[inline(always)]
    pub const fn get_longest_line(&self) -> usize {
        self.longest_line
    }

    #[inline(always)]
    pub const fn is_partial_line(&self) -> bool {
        self.partial_line
    }

    #[inline(always)]
    pub const fn is_closed(&self) -> bool {
        self.is_closed
    }

    #[inline(always)]
    pub const fn get_index_time(&self) -> Seconds {
        self.index_time
    }

    pub fn has_format(&self) -> bool {
        self.format.is_some()
    }

    /// Name of the locked-in format, if any.
    pub fn get_format_name(&self) -> Option<&'static str> {
        self.format
            .as_ref()
            .map(|format| format.get_name())
    }

    /// Does the locked-in format promise non-decreasing timestamps?
    pub fn is_time_ordered(&self) -> bool {
        self.format
            .as_ref()
            .map(|format| format.is_time_ordered())
            .unwrap_or(false)
    }

    #[inline(always)]
    pub const fn activity(&self) -> &LogFileActivity {
        &self.activity
    }

    /// Ask the next rebuild to report `NewOrder` regardless of what it
    /// finds; for consumers whose merged view of this file went stale.
    pub fn set_sort_needed(&mut self) {
        self.sort_needed = true;
    }

    // ─────────────────────────────────────────────────────────────────────
    // observers

    /// Attach the per-line observer and replay the current index to it.
    pub fn set_logline_observer(
        &mut self,
        observer: Box<dyn LoglineObserver>,
    ) {
        self.logline_observer = Some(observer);
        self.reobserve_from(0);
    }

    pub fn set_logfile_observer(
        &mut self,
        observer: Box<dyn LogfileObserver>,
    ) {
        self.logfile_observer = Some(observer);
    }

    /// Replay `logline_new_line` for every indexed line at or after
    /// `from`, then `logline_eof`.
    fn reobserve_from(
        &mut self,
        from: usize,
    ) {
        let mut llo = self.logline_observer.take();
        let mut lfo = self.logfile_observer.take();
        if let Some(observer) = llo.as_deref_mut() {
            for i in from..self.index.len() {
                if let Some(progress) = lfo.as_deref_mut() {
                    progress.logfile_indexing(self, i as FileOffset, self.index.len() as FileSz);
                }
                if let Ok(bytes) = self.read_line(i) {
                    observer.logline_new_line(self, i, &bytes);
                }
            }
            if let Some(progress) = lfo.as_deref_mut() {
                progress.logfile_indexing(
                    self,
                    self.index.len() as FileOffset,
                    self.index.len() as FileSz,
                );
            }
            observer.logline_eof(self);
        }
        self.logline_observer = llo;
        self.logfile_observer = lfo;
    }

    // ─────────────────────────────────────────────────────────────────────
    // file identity

    /// Is the originally opened file still the one at the path?
    ///
    /// Reports `false` on a changed device, a changed inode, or a
    /// shrunken file. A `LogFile` opened from a bare descriptor has no
    /// path to check and reports `true` unconditionally.
    pub fn exists(&self) -> bool {
        if !self.valid_filename {
            return true;
        }
        let metadata = match std::fs::metadata(fpath_to_path(&self.path)) {
            Ok(metadata) => metadata,
            Err(_) => return false,
        };
        let st = FileStat::from(&metadata);

        self.stat.dev == st.dev && self.stat.ino == st.ino && self.stat.size <= st.size
    }

    /// Close the underlying descriptor. The index remains readable only
    /// through data still cached; further rebuilds fail their stat.
    pub fn close(&mut self) {
        defñ!("{:?}", self.path);
        self.line_buffer.close();
        self.is_closed = true;
    }

    /// The wall-clock base passed to formats that must resolve relative
    /// or partial timestamps: the transport's encoded file time when
    /// known, the stat mtime otherwise.
    fn format_base_time(&self) -> Seconds {
        let file_time: Seconds = self.line_buffer.get_file_time();
        if file_time != 0 {
            return file_time;
        }

        self.stat.mtime
    }

    // ─────────────────────────────────────────────────────────────────────
    // format-detection driver

    /// Feed one line to the active format, or run format detection.
    ///
    /// Returns `true` when the caller should flag `sort_needed`.
    fn process_prefix(
        &mut self,
        bytes: &Bytes,
        line_info: &LineInfo,
    ) -> bool {
        let mut found: ScanResult = ScanResult::ScanNoMatch;
        let prescan_size: usize = self.index.len();
        let prescan_time: Option<Seconds> = self
            .index
            .first()
            .map(|ll| ll.get_time());
        let mut retval: bool = false;

        if self.format.is_some() {
            // locked onto a format, just use that scanner
            found = self
                .format
                .as_mut()
                .unwrap()
                .scan(&mut self.index, line_info, bytes);
        } else if self.detect_format && self.index.len() < MAX_UNRECOGNIZED_LINES {
            // try each recognizer until one matches
            let base_time: Seconds = self.format_base_time();
            for i in 0..self.root_formats.len() {
                if !self.root_formats[i].match_name(&self.path) {
                    continue;
                }
                self.root_formats[i].clear();
                self.root_formats[i].set_base_time(base_time);
                found = self.root_formats[i].scan(&mut self.index, line_info, bytes);
                if found == ScanResult::ScanMatch {
                    defo!(
                        "{:?}:{}: log format found -- {}",
                        self.path,
                        self.index.len(),
                        self.root_formats[i].get_name()
                    );
                    self.format = Some(self.root_formats[i].specialized());
                    let base_time: Seconds = self.format_base_time();
                    self.format
                        .as_mut()
                        .unwrap()
                        .set_base_time(base_time);
                    self.content_id = xxh3_64(bytes);
                    // Assume any previous lines were written out at the
                    // same time as this one and go back and update them.
                    let last: usize = self.index.len() - 1;
                    let last_time: Seconds = self.index[last].get_time();
                    let last_millis: Millis = self.index[last].get_millis();
                    for prior in 0..last {
                        self.index[prior].set_time(last_time);
                        self.index[prior].set_millis(last_millis);
                    }
                    break;
                }
            }
        }

        match found {
            ScanResult::ScanMatch => {
                if let Some(last) = self.index.last_mut() {
                    last.set_valid_utf(line_info.valid_utf);
                }
                if let Some(head_time) = prescan_time {
                    if self
                        .index
                        .first()
                        .map(|ll| ll.get_time())
                        != Some(head_time)
                    {
                        retval = true;
                    }
                }
                if prescan_size > 0 && prescan_size < self.index.len() {
                    let second_to_last: LogLine = self.index[prescan_size - 1];
                    let latest: LogLine = self.index[prescan_size];

                    if latest < second_to_last {
                        if self.is_time_ordered() {
                            self.out_of_time_order_count += 1;
                            for appended in prescan_size..self.index.len() {
                                let line = &mut self.index[appended];
                                line.set_time_skew(true);
                                line.set_time(second_to_last.get_time());
                                line.set_millis(second_to_last.get_millis());
                            }
                        } else {
                            retval = true;
                        }
                    }
                }
            }
            ScanResult::ScanNoMatch => {
                let mut last_level: LevelAndFlags = LogLevel::Unknown as LevelAndFlags;
                let mut last_time: Seconds = self.index_time;
                let mut last_millis: Millis = 0;
                let mut last_module: ModuleId = 0;
                let mut last_opid: OpId = 0;

                if let Some(ll) = self.index.last() {
                    // assume this line is part of the previous one(s) and
                    // copy the metadata over
                    last_time = ll.get_time();
                    last_millis = ll.get_millis();
                    if self.format.is_some() {
                        last_level = ll.get_level_and_flags() | LEVEL_CONTINUED;
                    }
                    last_module = ll.get_module_id();
                    last_opid = ll.get_opid();
                }
                let mut line = LogLine::new(
                    line_info.file_range.offset,
                    last_time,
                    last_millis,
                    last_level,
                    last_module,
                    last_opid,
                );
                line.set_valid_utf(line_info.valid_utf);
                self.index.push(line);
            }
            ScanResult::ScanIncomplete => {}
        }

        retval
    }

    // ─────────────────────────────────────────────────────────────────────
    // incremental rebuild engine

    /// Fold newly arrived bytes into the index.
    ///
    /// See the module documentation for the full procedure. Detected
    /// rotation or overwrite is not an error: the file is closed and
    /// `NoNewLines` (or `Invalid` when a verification read fails) is
    /// returned, after which [`exists`](LogFile::exists) reports `false`.
    pub fn rebuild_index(&mut self) -> Result<RebuildResult, LogFileError> {
        let mut llo = self.logline_observer.take();
        let mut lfo = self.logfile_observer.take();
        let result = self.rebuild_index_observed(&mut llo, &mut lfo);
        self.logline_observer = llo;
        self.logfile_observer = lfo;

        result
    }

    fn rebuild_index_observed(
        &mut self,
        llo: &mut Option<Box<dyn LoglineObserver>>,
        lfo: &mut Option<Box<dyn LogfileObserver>>,
    ) -> Result<RebuildResult, LogFileError> {
        defn!("{:?}", self.path);
        let mut retval: RebuildResult = RebuildResult::NoNewLines;

        self.activity.polls += 1;

        let st: FileStat = match self.line_buffer.metadata() {
            Ok(metadata) => FileStat::from(&metadata),
            Err(err) => {
                defx!("fstat failed: {}", err);
                return Err(LogFileError::from_io(LogFileErrorKind::Stat, &self.path, &err));
            }
        };

        // Check the previous stat against the latest to see if the file
        // was replaced underneath us.
        if st.size < self.stat.size || (st.size == self.stat.size && st.mtime != self.stat.mtime) {
            defo!("overwritten file detected, closing -- {:?}", self.path);
            self.close();
            defx!("return {:?}", retval);
            return Ok(retval);
        } else if self
            .line_buffer
            .is_data_available(self.index_size, st.size)
        {
            self.activity.reads += 1;

            // We haven't reached the end of the file. Note that the line
            // buffer's notion of the file size governs from here on since
            // the file may be compressed.
            let has_format: bool = self.format.is_some();
            let begin_size: usize = self.index.len();
            let record_duration: bool = begin_size == 1;
            let begin_index_size: FileOffset = self.index_size;
            let begin_instant: Instant = Instant::now();
            let mut rollback_count: Count = 0;

            // Drop the last record read since it might have been a
            // partial read, then verify the prefix before it is intact.
            let off: FileOffset = match self.index.pop_last_record() {
                Some((anchor_offset, popped)) => {
                    rollback_count = popped;
                    self.line_buffer.clear();
                    if let Some(prev) = self.index.last() {
                        let check_line_off: FileOffset = prev.get_offset();
                        if let Err(err) = self
                            .line_buffer
                            .read_range(FileRange::new(
                                check_line_off,
                                self.index_size - check_line_off,
                            ))
                        {
                            defo!(
                                "overwritten file detected, closing -- {:?} ({})",
                                self.path,
                                err
                            );
                            self.close();
                            defx!("return {:?}", RebuildResult::Invalid);
                            return Ok(RebuildResult::Invalid);
                        }
                    }
                    anchor_offset
                }
                None => 0,
            };
            if rollback_count > 0 {
                if let Some(observer) = llo.as_deref_mut() {
                    observer.logline_restart(self, rollback_count);
                }
            }

            let mut sort_needed: bool = self.sort_needed;
            self.sort_needed = false;

            let mut prev_range: FileRange = FileRange::at(off);
            loop {
                let line_info: LineInfo = match self
                    .line_buffer
                    .load_next_line(prev_range)
                {
                    Ok(line_info) => line_info,
                    Err(_err) => {
                        defo!("load_next_line failed: {}", _err);
                        self.close();
                        defx!("return {:?}", RebuildResult::Invalid);
                        return Ok(RebuildResult::Invalid);
                    }
                };
                if line_info.file_range.is_empty() {
                    break;
                }
                prev_range = line_info.file_range;

                let mut old_size: usize = self.index.len();

                // update this early so that line_length() works for the
                // format's scan
                self.index_size = line_info.file_range.next_offset();

                if old_size == 0 {
                    let available: FileRange = self.line_buffer.get_available();
                    self.text_format = match self.line_buffer.read_range(available) {
                        Ok(prefix) => detect_text_format(&prefix),
                        Err(_) => TextFormat::Unknown,
                    };
                    defo!("text_format {:?}", self.text_format);
                }

                let mut bytes: Bytes = match self
                    .line_buffer
                    .read_range(line_info.file_range)
                {
                    Ok(bytes) => bytes,
                    Err(_err) => {
                        defo!("read_range failed: {}", _err);
                        self.close();
                        defx!("return {:?}", RebuildResult::Invalid);
                        return Ok(RebuildResult::Invalid);
                    }
                };
                rtrim_line_endings(&mut bytes);
                self.longest_line = self.longest_line.max(bytes.len());
                self.partial_line = line_info.partial;
                sort_needed = self.process_prefix(&bytes, &line_info) || sort_needed;

                // the scan may have collapsed entries; renotify from the
                // beginning
                if old_size > self.index.len() {
                    old_size = 0;
                }

                if let Some(observer) = llo.as_deref_mut() {
                    for appended in old_size..self.index.len() {
                        observer.logline_new_line(self, appended, &bytes);
                    }
                }
                if let Some(progress) = lfo.as_deref_mut() {
                    progress.logfile_indexing(
                        self,
                        self.line_buffer
                            .get_read_offset(line_info.file_range.next_offset()),
                        st.size,
                    );
                }

                if !has_format && self.format.is_some() {
                    // Let the caller observe the newly structured index
                    // before any further bytes are consumed.
                    defo!("format locked, yielding");
                    break;
                }
            }

            if let Some(observer) = llo.as_deref_mut() {
                observer.logline_eof(self);
            }

            if record_duration
                && (prev_range.next_offset() - begin_index_size) > INITIAL_INDEX_DURATION_MIN_SZ
            {
                let duration: Duration = begin_instant.elapsed();
                defo!(
                    "initial index pass of {:?}: lines {}..{} in {:?}",
                    self.path,
                    begin_size,
                    self.index.len(),
                    duration
                );
                self.activity.initial_index_duration = Some(duration);
            }

            // The file can still grow between the fstat above and the
            // scan, so trust the line buffer's final offset.
            self.index_size = prev_range.next_offset();
            self.stat = st;

            retval = if sort_needed {
                RebuildResult::NewOrder
            } else {
                RebuildResult::NewLines
            };
        }

        self.index_time = self.line_buffer.get_file_time();
        if self.index_time == 0 {
            self.index_time = st.mtime;
        }

        if self.out_of_time_order_count > 0 {
            defo!(
                "detected {} out-of-time-order lines in file {:?}",
                self.out_of_time_order_count,
                self.path
            );
            self.out_of_time_order_count = 0;
        }
        defx!("return {:?}", retval);

        Ok(retval)
    }

    // ─────────────────────────────────────────────────────────────────────
    // read / message extraction

    /// Length in bytes of the line at `index`, excluding its terminator.
    ///
    /// With `include_continues` the walk also spans the record's
    /// continuation lines. A single-slot cache serves repeated queries of
    /// the same interior anchor when continues are excluded.
    pub fn line_length(
        &mut self,
        index: usize,
        include_continues: bool,
    ) -> usize {
        let ll: LogLine = self.index[index];

        if !include_continues {
            if let Some((cached_offset, cached_length)) = self.next_line_cache {
                if ll.get_offset() == cached_offset {
                    return cached_length;
                }
            }
        }

        let mut next: usize = index + 1;
        while next < self.index.len()
            && ((ll.get_offset() == self.index[next].get_offset())
                || (include_continues && self.index[next].is_continued()))
        {
            next += 1;
        }

        if next >= self.index.len() {
            let mut retval: usize = (self.index_size - ll.get_offset()) as usize;
            if retval > 0 && !self.partial_line {
                retval -= 1;
            }
            retval
        } else {
            let retval: usize =
                (self.index[next].get_offset() - ll.get_offset() - 1) as usize;
            if !include_continues {
                // interior lines are immutable so this entry never goes
                // stale
                self.next_line_cache = Some((ll.get_offset(), retval));
            }
            retval
        }
    }

    /// Byte range of the line at `index` within the logical stream.
    pub fn get_file_range(
        &mut self,
        index: usize,
        include_continues: bool,
    ) -> FileRange {
        let offset: FileOffset = self.index[index].get_offset();
        let length: FileSz = self.line_length(index, include_continues) as FileSz;

        FileRange::new(offset, length)
    }

    /// Read the printable bytes of the line at `index`.
    ///
    /// Line endings are trimmed, invalid UTF-8 is scrubbed in place when
    /// the line was flagged invalid, and the active format chooses the
    /// displayable subline.
    pub fn read_line(
        &mut self,
        index: usize,
    ) -> Result<Bytes, String> {
        let file_range: FileRange = self.get_file_range(index, false);
        let mut bytes: Bytes = self.line_buffer.read_range(file_range)?;
        rtrim_line_endings(&mut bytes);
        let ll: LogLine = self.index[index];
        if !ll.is_valid_utf() {
            scrub_to_utf8(&mut bytes);
        }
        if let Some(format) = self.format.as_ref() {
            let subline = format.get_subline(&ll, &bytes, false);
            bytes.truncate(subline.end);
            bytes.drain(..subline.start);
        }

        Ok(bytes)
    }

    /// Read the full multi-line record anchored at `index` into
    /// `msg_out`, best effort.
    ///
    /// Must be called on an anchor line (`sub_offset == 0`). At most
    /// `max_lines` index entries are spanned; `0` means no limit. On a
    /// read failure `msg_out` is left untouched.
    pub fn read_full_message(
        &mut self,
        index: usize,
        msg_out: &mut Bytes,
        max_lines: usize,
    ) {
        debug_assert_eq!(
            self.index[index].get_sub_offset(),
            0,
            "read_full_message requires an anchor line"
        );

        let ll: LogLine = self.index[index];
        let mut next: usize = index + 1;
        let mut spanned: usize = 1;
        while next < self.index.len()
            && ((ll.get_offset() == self.index[next].get_offset())
                || self.index[next].is_continued())
            && (max_lines == 0 || spanned < max_lines)
        {
            next += 1;
            spanned += 1;
        }
        let length: usize = if next >= self.index.len() {
            let mut length: usize = (self.index_size - ll.get_offset()) as usize;
            if length > 0 && !self.partial_line {
                length -= 1;
            }
            length
        } else {
            (self.index[next].get_offset() - ll.get_offset() - 1) as usize
        };

        match self
            .line_buffer
            .read_range(FileRange::new(ll.get_offset(), length as FileSz))
        {
            Ok(bytes) => {
                *msg_out = bytes;
                if let Some(format) = self.format.as_ref() {
                    let subline = format.get_subline(&ll, msg_out, true);
                    msg_out.truncate(subline.end);
                    msg_out.drain(..subline.start);
                }
            }
            Err(_err) => {
                defñ!("read_full_message failed: {}", _err);
            }
        }
    }
}
