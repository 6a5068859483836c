// src/readers/mod.rs

//! "Readers" for _logdexlib_.
//!
//! ## Overview of readers
//!
//! * A [`LogFile`] drives a [`LineBuffer`] to find line byte-ranges and
//!   feeds each line to a [`LogFormat`] recognizer.
//! * A `LineBuffer` only handles `u8` bytes; it abstracts plain and
//!   gzip-compressed files behind logical offsets.
//! * A `LogFormat` interprets one line's bytes and appends parsed
//!   [`LogLine`] records to the [`LogLineIndex`].
//!
//! <br/>
//!
//! A log-viewing application uses a [`LogFile`] instance, one per file,
//! and calls [`rebuild_index`] at its own cadence as files grow.
//!
//! <br/>
//!
//! _These are not rust "Readers"; these structs do not implement the
//! trait [`Read`]. These are "readers" in an informal sense._
//!
//! [`LogFile`]: crate::readers::logfile::LogFile
//! [`LineBuffer`]: crate::readers::linebuffer::LineBuffer
//! [`LogFormat`]: crate::readers::logformat::LogFormat
//! [`LogLine`]: crate::data::logline::LogLine
//! [`LogLineIndex`]: crate::data::index::LogLineIndex
//! [`rebuild_index`]: crate::readers::logfile::LogFile#method.rebuild_index
//! [`Read`]: std::io::Read

pub mod helpers;
pub mod linebuffer;
pub mod logfile;
pub mod logformat;
