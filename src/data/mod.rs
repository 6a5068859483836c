// src/data/mod.rs

//! The `data` module is the passive data entities of the index.
//!
//! ## Definitions of data
//!
//! ### LogLine
//!
//! A [`LogLine`] is the compact per-line metadata record: byte offset,
//! sub-offset, timestamp, packed severity and flags, and recognizer tags.
//! One `LogLine` represents either a recognized anchor line or a
//! continuation byte-range belonging to the preceding record.
//!
//! ### LogLineIndex
//!
//! A [`LogLineIndex`] is the appendable ordered sequence of `LogLine`
//! maintained by a [`LogFile`] as bytes arrive.
//!
//! The sub-module [`datetime`] holds the timestamp scalar aliases and
//! [`chrono`] conversion helpers used by the log format recognizers.
//!
//! [`LogLine`]: crate::data::logline::LogLine
//! [`LogLineIndex`]: crate::data::index::LogLineIndex
//! [`LogFile`]: crate::readers::logfile::LogFile
//! [`datetime`]: crate::data::datetime
//! [`chrono`]: https://docs.rs/chrono/latest/chrono/

pub mod datetime;
pub mod index;
pub mod logline;
