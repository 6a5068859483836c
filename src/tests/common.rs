// src/tests/common.rs

//! Common test data and helpers for _logdexlib_ tests.

#![allow(non_upper_case_globals)]

use crate::common::{Bytes, Count, FPath, FileOffset, FileSz};
use crate::debug::helpers::{create_temp_file, ntf_fpath, NamedTempFile};
use crate::readers::logfile::{LogFile, LogfileObserver, LoglineObserver};

use std::cell::RefCell;
use std::rc::Rc;

use ::lazy_static::lazy_static;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// test file data
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// three plain newline-terminated words
pub const DATA_THREE_WORDS: &str = "one\ntwo\nthree\n";

/// two words, second unterminated
pub const DATA_PARTIAL_TAIL: &str = "abc\ndef";

/// one timestamped line the `timestamped` format matches
pub const DATA_TIMESTAMPED_1: &str = "2024-01-01 00:00:00 INFO hello\n";

lazy_static! {
    pub static ref NTF_THREE_WORDS: NamedTempFile = create_temp_file(DATA_THREE_WORDS);
    pub static ref NTF_THREE_WORDS_FPATH: FPath = ntf_fpath(&NTF_THREE_WORDS);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// recording observers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One observed notification, in delivery order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ObserverEvent {
    Restart(Count),
    NewLine(usize, Bytes),
    Eof,
    Indexing(FileOffset, FileSz),
}

/// Shared event log handed to the recording observers.
pub type ObserverEvents = Rc<RefCell<Vec<ObserverEvent>>>;

pub fn new_observer_events() -> ObserverEvents {
    Rc::new(RefCell::new(Vec::new()))
}

/// A [`LoglineObserver`] that records every notification.
pub struct EventRecorder {
    pub events: ObserverEvents,
}

impl LoglineObserver for EventRecorder {
    fn logline_restart(
        &mut self,
        _logfile: &LogFile,
        rollback_count: Count,
    ) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::Restart(rollback_count));
    }

    fn logline_new_line(
        &mut self,
        _logfile: &LogFile,
        index: usize,
        bytes: &[u8],
    ) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::NewLine(index, Bytes::from(bytes)));
    }

    fn logline_eof(
        &mut self,
        _logfile: &LogFile,
    ) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::Eof);
    }
}

/// A [`LogfileObserver`] that records every progress notification.
pub struct ProgressRecorder {
    pub events: ObserverEvents,
}

impl LogfileObserver for ProgressRecorder {
    fn logfile_indexing(
        &mut self,
        _logfile: &LogFile,
        bytes_done: FileOffset,
        bytes_total: FileSz,
    ) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::Indexing(bytes_done, bytes_total));
    }
}
