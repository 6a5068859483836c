// src/readers/linebuffer.rs

//! Implements the [`LineBuffer`], the byte-range reader abstracting plain
//! and gzip-compressed files for a
//! [`LogFile`].
//!
//! A `LineBuffer` reports _logical_ offsets and sizes: for a compressed
//! file these address the decompressed stream. It finds line boundaries on
//! demand ([`load_next_line`]) and serves byte ranges ([`read_range`]).
//! It knows nothing of log formats or timestamps.
//!
//! [`LogFile`]: crate::readers::logfile::LogFile
//! [`load_next_line`]: LineBuffer::load_next_line
//! [`read_range`]: LineBuffer::read_range

use crate::common::{Bytes, File, FileMetadata, FileOffset, FileSz, NLu8};
use crate::data::datetime::Seconds;

use std::fmt;
use std::io::{Error, ErrorKind, Read, Result, Seek, SeekFrom};
use std::os::unix::fs::FileExt;

// `flate2` handles the gzip transport.
use ::flate2::read::GzDecoder;
use ::memchr::memchr;
#[allow(unused_imports)]
use ::more_asserts::{debug_assert_ge, debug_assert_le};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FileRange and LineInfo
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A half-open byte range `[offset, offset + length)` within the logical
/// stream of a [`LineBuffer`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FileRange {
    pub offset: FileOffset,
    pub length: FileSz,
}

impl FileRange {
    pub const fn new(
        offset: FileOffset,
        length: FileSz,
    ) -> FileRange {
        FileRange { offset, length }
    }

    /// A zero-length range at `offset`; the rebuild loop's starting point.
    pub const fn at(offset: FileOffset) -> FileRange {
        FileRange { offset, length: 0 }
    }

    /// One byte past the end of the range.
    #[inline(always)]
    pub const fn next_offset(&self) -> FileOffset {
        self.offset + self.length
    }

    /// An empty `FileRange` signals end-of-file from
    /// [`LineBuffer::load_next_line`].
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Everything known about one line found by
/// [`LineBuffer::load_next_line`], before its bytes are interpreted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LineInfo {
    /// Byte range of the line including its terminating newline
    /// (when present).
    pub file_range: FileRange,
    /// The terminating newline has not been observed yet; the line may
    /// grow.
    pub partial: bool,
    /// The line's bytes are valid UTF-8.
    pub valid_utf: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LineBuffer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read window size in bytes for plain files.
const READ_WINDOW_SZ: FileSz = 0x10000;

/// gzip file magic bytes, RFC 1952 §2.3.1.
const GZ_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// How the underlying file's bytes map to the logical stream.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Transport {
    /// ordinary file; logical offsets equal file offsets
    #[default]
    Plain,
    /// gzip stream; logical offsets address the decompressed image
    Gz,
}

/// Byte-range reader over one open file, plain or gzip-compressed.
///
/// For a gzip file the entire stream is decompressed into memory on first
/// use; DEFLATE permits no random access. The gzip header MTIME field is
/// surfaced through [`get_file_time`](LineBuffer::get_file_time) as a
/// wall-clock hint for formats with relative timestamps.
#[derive(Default)]
pub struct LineBuffer {
    /// the open file, `None` after `close`
    file: Option<File>,
    transport: Transport,
    /// plain-transport read window; starts at `window_offset`
    window: Bytes,
    window_offset: FileOffset,
    /// gzip-transport decompressed image, loaded lazily
    decompressed: Option<Bytes>,
    /// wall-clock seconds from the gzip header, `0` if unknown
    file_time: Seconds,
    /// compressed on-disk size, for progress-offset mapping
    compressed_sz: FileSz,
}

impl fmt::Debug for LineBuffer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("LineBuffer")
            .field("open?", &self.file.is_some())
            .field("transport", &self.transport)
            .field("window_offset", &self.window_offset)
            .field("window.len", &self.window.len())
            .field(
                "decompressed.len",
                &self
                    .decompressed
                    .as_ref()
                    .map(|d| d.len()),
            )
            .field("file_time", &self.file_time)
            .finish()
    }
}

impl LineBuffer {
    pub fn new() -> LineBuffer {
        LineBuffer::default()
    }

    /// Attach an open file. Sniffs the gzip magic to choose the transport.
    pub fn set_fd(
        &mut self,
        file: File,
    ) -> Result<()> {
        defn!();
        let mut magic: [u8; 2] = [0; 2];
        self.transport = match file.read_exact_at(&mut magic, 0) {
            Ok(_) if magic == GZ_MAGIC => Transport::Gz,
            // a file shorter than the magic cannot be a gzip file
            Ok(_) | Err(_) => Transport::Plain,
        };
        if self.transport == Transport::Gz {
            self.compressed_sz = file.metadata()?.len();
        }
        self.file = Some(file);
        defx!("transport {:?}", self.transport);

        Ok(())
    }

    #[inline(always)]
    pub fn get_fd(&self) -> Option<&File> {
        self.file.as_ref()
    }

    /// `fstat` the attached file.
    pub fn metadata(&self) -> Result<FileMetadata> {
        match &self.file {
            Some(file) => file.metadata(),
            None => Err(Error::new(ErrorKind::NotConnected, "no file attached")),
        }
    }

    /// Wall-clock seconds encoded in the transport (gzip header MTIME),
    /// `0` when unknown.
    #[inline(always)]
    pub const fn get_file_time(&self) -> Seconds {
        self.file_time
    }

    /// Size of the logical stream in bytes.
    pub fn filesz(&mut self) -> Result<FileSz> {
        match self.transport {
            Transport::Plain => Ok(self.metadata()?.len()),
            Transport::Gz => {
                self.load_decompressed()?;
                Ok(self
                    .decompressed
                    .as_ref()
                    .map(|image| image.len())
                    .unwrap_or(0) as FileSz)
            }
        }
    }

    /// Are there logical bytes at or beyond `from_offset`?
    ///
    /// `file_size` is the stat-reported on-disk size; for a compressed
    /// transport the logical size governs instead.
    pub fn is_data_available(
        &mut self,
        from_offset: FileOffset,
        file_size: FileSz,
    ) -> bool {
        match self.transport {
            Transport::Plain => from_offset < file_size,
            Transport::Gz => match self.filesz() {
                Ok(logical_sz) => from_offset < logical_sz,
                Err(_) => false,
            },
        }
    }

    /// Find the line following the range `prev_range`.
    ///
    /// Returns a [`LineInfo`] whose `file_range` covers the line bytes and
    /// terminating newline. An unterminated tail at end-of-file is
    /// returned with `partial` set. An empty `file_range` signals
    /// end-of-file.
    pub fn load_next_line(
        &mut self,
        prev_range: FileRange,
    ) -> Result<LineInfo> {
        let start: FileOffset = prev_range.next_offset();
        defn!("start {}", start);
        let eof: FileSz = self.filesz()?;
        if start >= eof {
            defx!("no more data");
            return Ok(LineInfo {
                file_range: FileRange::at(start),
                partial: false,
                valid_utf: true,
            });
        }

        let (length, partial) = match self.transport {
            Transport::Gz => {
                let image: &Bytes = self
                    .decompressed
                    .as_ref()
                    .expect("decompressed image must be loaded by filesz");
                match memchr(NLu8, &image[start as usize..]) {
                    Some(pos) => ((pos + 1) as FileSz, false),
                    None => (eof - start, true),
                }
            }
            Transport::Plain => self.scan_plain(start, eof)?,
        };
        let file_range = FileRange::new(start, length);
        let bytes: Bytes = self
            .read_range(file_range)
            .map_err(|err| Error::new(ErrorKind::UnexpectedEof, err))?;
        let valid_utf: bool = std::str::from_utf8(&bytes).is_ok();
        defx!("FileRange ({}, {}), partial {}, valid_utf {}", start, length, partial, valid_utf);

        Ok(LineInfo {
            file_range,
            partial,
            valid_utf,
        })
    }

    /// Scan a plain file for the newline terminating the line at `start`.
    ///
    /// Returns `(length, partial)`.
    fn scan_plain(
        &mut self,
        start: FileOffset,
        eof: FileSz,
    ) -> Result<(FileSz, bool)> {
        let mut search_from: FileOffset = start;
        loop {
            self.ensure_window(search_from, eof)?;
            let window_end: FileOffset = self.window_offset + self.window.len() as FileOffset;
            let wbeg: usize = (search_from - self.window_offset) as usize;
            match memchr(NLu8, &self.window[wbeg..]) {
                Some(pos) => {
                    let nl_offset: FileOffset = search_from + pos as FileOffset;
                    return Ok((nl_offset + 1 - start, false));
                }
                None if window_end >= eof => {
                    return Ok((eof - start, true));
                }
                None => {
                    search_from = window_end;
                }
            }
        }
    }

    /// Guarantee the read window covers `from` (plain transport only).
    fn ensure_window(
        &mut self,
        from: FileOffset,
        eof: FileSz,
    ) -> Result<()> {
        let window_end: FileOffset = self.window_offset + self.window.len() as FileOffset;
        if self.window_offset <= from && from < window_end {
            return Ok(());
        }
        let file: &File = self
            .file
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::NotConnected, "no file attached"))?;
        let want: FileSz = READ_WINDOW_SZ.min(eof.saturating_sub(from));
        let mut buffer: Bytes = vec![0; want as usize];
        let read = file.read_at(&mut buffer, from)?;
        buffer.truncate(read);
        if buffer.is_empty() {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("no bytes at offset {}", from),
            ));
        }
        self.window_offset = from;
        self.window = buffer;

        Ok(())
    }

    /// Read the bytes of `file_range` from the logical stream.
    ///
    /// A plain-transport read that cannot produce the full range fails;
    /// this is how a mid-file rewrite of a previously indexed region is
    /// detected.
    pub fn read_range(
        &mut self,
        file_range: FileRange,
    ) -> std::result::Result<Bytes, String> {
        match self.transport {
            Transport::Plain => {
                // serve from the window when possible
                let window_end: FileOffset = self.window_offset + self.window.len() as FileOffset;
                if self.window_offset <= file_range.offset && file_range.next_offset() <= window_end
                {
                    let beg: usize = (file_range.offset - self.window_offset) as usize;
                    let end: usize = beg + file_range.length as usize;
                    return Ok(Bytes::from(&self.window[beg..end]));
                }
                let file: &File = match self.file.as_ref() {
                    Some(file) => file,
                    None => return Err(String::from("no file attached")),
                };
                let mut buffer: Bytes = vec![0; file_range.length as usize];
                match file.read_exact_at(&mut buffer, file_range.offset) {
                    Ok(_) => Ok(buffer),
                    Err(err) => Err(format!(
                        "read of ({}, {}) failed: {}",
                        file_range.offset, file_range.length, err
                    )),
                }
            }
            Transport::Gz => {
                if let Err(err) = self.load_decompressed() {
                    return Err(format!("decompress failed: {}", err));
                }
                let image: &Bytes = self
                    .decompressed
                    .as_ref()
                    .expect("decompressed image must be loaded");
                let beg: usize = file_range.offset as usize;
                let end: usize = file_range.next_offset() as usize;
                if end > image.len() {
                    return Err(format!(
                        "range ({}, {}) exceeds logical size {}",
                        file_range.offset,
                        file_range.length,
                        image.len()
                    ));
                }
                Ok(Bytes::from(&image[beg..end]))
            }
        }
    }

    /// The byte range currently held in memory; used for the text-format
    /// probe of the file's first available prefix.
    pub fn get_available(&self) -> FileRange {
        match self.transport {
            Transport::Plain => FileRange::new(self.window_offset, self.window.len() as FileSz),
            Transport::Gz => {
                let len: FileSz = self
                    .decompressed
                    .as_ref()
                    .map(|d| d.len() as FileSz)
                    .unwrap_or(0);
                FileRange::new(0, len.min(READ_WINDOW_SZ))
            }
        }
    }

    /// Map a logical offset to an on-disk offset for progress reporting.
    ///
    /// Identity for plain files; proportional scaling into the compressed
    /// size for gzip.
    pub fn get_read_offset(
        &self,
        logical_offset: FileOffset,
    ) -> FileOffset {
        match self.transport {
            Transport::Plain => logical_offset,
            Transport::Gz => {
                let logical_sz: FileSz = self
                    .decompressed
                    .as_ref()
                    .map(|d| d.len() as FileSz)
                    .unwrap_or(0);
                if logical_sz == 0 {
                    return 0;
                }
                (logical_offset.min(logical_sz) as u128 * self.compressed_sz as u128
                    / logical_sz as u128) as FileOffset
            }
        }
    }

    /// Drop all cached data. The next read goes back to the filesystem.
    pub fn clear(&mut self) {
        defñ!();
        self.window.clear();
        self.window_offset = 0;
        self.decompressed = None;
    }

    /// Detach and drop the file handle.
    pub fn close(&mut self) {
        defñ!();
        self.clear();
        self.file = None;
    }

    /// Decompress the gzip stream into memory (gzip transport only, once).
    fn load_decompressed(&mut self) -> Result<()> {
        if self.decompressed.is_some() {
            return Ok(());
        }
        let mut file: &File = self
            .file
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::NotConnected, "no file attached"))?;
        file.seek(SeekFrom::Start(0))?;
        self.compressed_sz = file.metadata()?.len();
        let mut decoder = GzDecoder::new(file);
        let mut image = Bytes::new();
        decoder.read_to_end(&mut image)?;
        if let Some(header) = decoder.header() {
            self.file_time = header.mtime() as Seconds;
        }
        defo!("decompressed {} bytes, file_time {}", image.len(), self.file_time);
        self.decompressed = Some(image);

        Ok(())
    }
}
