// src/tests/logfile_tests.rs

//! tests for `logfile.rs`

#![allow(non_snake_case)]

use crate::common::{Bytes, FPath, FileOffset, TextFormat};
use crate::data::datetime::{Millis, NaiveDate, Seconds};
use crate::data::logline::{LogLevel, LogLine};
use crate::debug::helpers::{create_temp_file, create_temp_file_bytes, ntf_fpath};
use crate::readers::logfile::{
    LogFile,
    LogFileErrorKind,
    LogFileOpenOptions,
    RebuildResult,
};
use crate::tests::common::{
    new_observer_events,
    EventRecorder,
    ObserverEvent,
    ObserverEvents,
    ProgressRecorder,
    DATA_TIMESTAMPED_1,
};

use std::fs::OpenOptions;
use std::io::Write;

use ::flate2::{Compression, GzBuilder};
use ::more_asserts::assert_le;
use ::test_case::test_case;
use ::xxhash_rust::xxh3::xxh3_64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn new_LogFile(path: &FPath) -> LogFile {
    match LogFile::new(path.clone(), LogFileOpenOptions::new()) {
        Ok(val) => val,
        Err(err) => {
            panic!("ERROR: LogFile::new({:?}) failed {}", path, err);
        }
    }
}

/// call `rebuild_index` until it settles at `NoNewLines`, returning every
/// result in order
fn rebuild_fully(logfile: &mut LogFile) -> Vec<RebuildResult> {
    let mut results: Vec<RebuildResult> = Vec::new();
    for _ in 0..20 {
        let result = logfile
            .rebuild_index()
            .expect("rebuild_index failed");
        results.push(result);
        match result {
            RebuildResult::NoNewLines | RebuildResult::Invalid => break,
            _ => {}
        }
    }

    results
}

fn append_to(
    path: &FPath,
    data: &str,
) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("open for append failed");
    file.write_all(data.as_bytes())
        .expect("append failed");
    file.sync_all()
        .expect("sync failed");
}

fn truncate_and_write(
    path: &FPath,
    data: &str,
) {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .expect("open for truncate failed");
    file.write_all(data.as_bytes())
        .expect("write failed");
    file.sync_all()
        .expect("sync failed");
}

/// epoch seconds of a UTC calendar datetime
fn ymdhms(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Seconds {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, second)
        .unwrap()
        .and_utc()
        .timestamp()
}

/// assert the §8 quantified invariants over the whole index
fn assert_index_invariants(logfile: &LogFile) {
    let time_ordered: bool = logfile.is_time_ordered();
    let mut prev: Option<&LogLine> = None;
    let mut last_anchor: Option<&LogLine> = None;
    for (i, ll) in logfile.iter().enumerate() {
        if let Some(p) = prev {
            assert!(
                p.get_offset() < ll.get_offset()
                    || (p.get_offset() == ll.get_offset()
                        && p.get_sub_offset() < ll.get_sub_offset()),
                "entry {}: offset ordering violated: {:?} then {:?}",
                i,
                p,
                ll
            );
            if time_ordered {
                assert_le!(
                    (p.get_time(), p.get_millis()),
                    (ll.get_time(), ll.get_millis()),
                    "entry {}: time ordering violated",
                    i
                );
            }
        }
        if ll.is_continued() {
            let anchor = last_anchor.expect("continued line without an anchor");
            assert_eq!(anchor.get_time(), ll.get_time(), "entry {}: time not inherited", i);
            assert_eq!(anchor.get_millis(), ll.get_millis(), "entry {}: millis not inherited", i);
            assert_eq!(
                anchor.get_module_id(),
                ll.get_module_id(),
                "entry {}: module_id not inherited",
                i
            );
            assert_eq!(anchor.get_opid(), ll.get_opid(), "entry {}: opid not inherited", i);
        } else {
            last_anchor = Some(ll);
        }
        prev = Some(ll);
    }
}

/// comparable snapshot of the index contents
fn index_snapshot(logfile: &LogFile) -> Vec<(FileOffset, u16, Seconds, Millis, u16)> {
    logfile
        .iter()
        .map(|ll| {
            (
                ll.get_offset(),
                ll.get_sub_offset(),
                ll.get_time(),
                ll.get_millis(),
                ll.get_level_and_flags(),
            )
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// construction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_new_missing_path() {
    let result = LogFile::new(
        FPath::from("THIS/PATH_DOES/NOT///EXIST!!!"),
        LogFileOpenOptions::new(),
    );
    assert_eq!(result.unwrap_err().kind(), LogFileErrorKind::PathResolution);
}

#[test]
fn test_new_not_regular_file() {
    let err = LogFile::new(FPath::from("/"), LogFileOpenOptions::new()).unwrap_err();
    assert_eq!(err.kind(), LogFileErrorKind::NotRegularFile);
    assert_eq!(err.errno(), 22);
}

#[test]
fn test_new_content_id_seeded_from_filename() {
    let ntf = create_temp_file("irrelevant\n");
    let path = ntf_fpath(&ntf);
    let logfile = new_LogFile(&path);
    assert_eq!(logfile.get_content_id(), xxh3_64(path.as_bytes()));
}

#[test]
fn test_new_from_fd_exists_unconditionally() {
    let ntf = create_temp_file(DATA_TIMESTAMPED_1);
    let path = ntf_fpath(&ntf);
    let file = std::fs::File::open(&path).unwrap();
    let mut logfile = LogFile::new(path, LogFileOpenOptions::with_fd(file)).unwrap();
    assert!(logfile.exists());
    let results = rebuild_fully(&mut logfile);
    assert_eq!(results.first(), Some(&RebuildResult::NewLines));
    assert_eq!(logfile.len(), 1);
    // no filename to re-stat, so the file always "exists"
    assert!(logfile.exists());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// boundary scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_empty_file() {
    let ntf = create_temp_file("");
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    let result = logfile.rebuild_index().unwrap();
    assert_eq!(result, RebuildResult::NoNewLines);
    assert!(logfile.is_empty());
    assert_eq!(logfile.get_index_size(), 0);
    assert!(!logfile.has_format());
}

#[test]
fn test_single_matched_line() {
    let ntf = create_temp_file(DATA_TIMESTAMPED_1);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    let events: ObserverEvents = new_observer_events();
    logfile.set_logline_observer(Box::new(EventRecorder {
        events: events.clone(),
    }));
    // attaching replays the (empty) index: just one EOF
    assert_eq!(events.borrow().as_slice(), &[ObserverEvent::Eof]);
    events.borrow_mut().clear();

    let results = rebuild_fully(&mut logfile);
    assert_eq!(
        results,
        vec![RebuildResult::NewLines, RebuildResult::NoNewLines]
    );
    assert_eq!(logfile.len(), 1);
    assert!(logfile.has_format());
    assert_eq!(logfile.get_format_name(), Some("timestamped"));
    let ll = logfile.get(0).unwrap();
    assert_eq!(ll.get_time(), ymdhms(2024, 1, 1, 0, 0, 0));
    assert_eq!(ll.get_level(), LogLevel::Info);
    assert!(ll.is_valid_utf());
    assert!(!ll.is_continued());
    assert_eq!(
        logfile.get_index_size(),
        DATA_TIMESTAMPED_1.len() as FileOffset
    );
    assert_eq!(logfile.get_text_format(), TextFormat::Plain);
    // one new_line then eof; no restart because nothing was rolled back
    assert_eq!(
        events.borrow().as_slice(),
        &[
            ObserverEvent::NewLine(0, Bytes::from(&b"2024-01-01 00:00:00 INFO hello"[..])),
            ObserverEvent::Eof,
        ]
    );
    assert_index_invariants(&logfile);
}

#[test]
fn test_out_of_order_time_skew() {
    let data = "2024-01-01 10:00:00 INFO a\n2024-01-01 09:00:00 INFO b\n";
    let ntf = create_temp_file(data);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    let results = rebuild_fully(&mut logfile);
    // lock-in yields after the first line, so a second pass picks up the rest
    assert_eq!(
        results,
        vec![
            RebuildResult::NewLines,
            RebuildResult::NewLines,
            RebuildResult::NoNewLines,
        ]
    );
    assert_eq!(logfile.len(), 2);
    let first = *logfile.get(0).unwrap();
    let second = *logfile.get(1).unwrap();
    assert!(!first.is_time_skew());
    assert!(second.is_time_skew(), "regressing line must carry TIME_SKEW");
    // clamped to the predecessor's timestamp
    assert_eq!(second.get_time(), first.get_time());
    assert_eq!(second.get_millis(), first.get_millis());
    assert_eq!(first.get_time(), ymdhms(2024, 1, 1, 10, 0, 0));
    assert_index_invariants(&logfile);
}

#[test]
fn test_continuation_inherits() {
    let data = "2024-01-01 00:00:00 ERROR boom\n    at frame 1\n    at frame 2\n";
    let ntf = create_temp_file(data);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    rebuild_fully(&mut logfile);
    assert_eq!(logfile.len(), 3);
    let anchor = *logfile.get(0).unwrap();
    assert_eq!(anchor.get_level(), LogLevel::Error);
    for i in [1, 2] {
        let cont = *logfile.get(i).unwrap();
        assert!(cont.is_continued(), "entry {} must be continued", i);
        assert_eq!(cont.get_sub_offset(), 0);
        assert_ne!(cont.get_offset(), anchor.get_offset());
        assert_eq!(cont.get_level(), LogLevel::Error, "severity inherited");
        assert_eq!(cont.get_time(), anchor.get_time(), "time inherited");
    }
    assert_index_invariants(&logfile);
}

#[test]
fn test_partial_last_line_reindexed() {
    let data = "2024-01-01 00:00:01 INFO first\n2024-01-01 00:00:02 INFO wor";
    let ntf = create_temp_file(data);
    let path = ntf_fpath(&ntf);
    let mut logfile = new_LogFile(&path);
    rebuild_fully(&mut logfile);
    assert_eq!(logfile.len(), 2);
    assert!(logfile.is_partial_line());
    assert_eq!(
        logfile.read_line(1).unwrap(),
        Bytes::from(&b"2024-01-01 00:00:02 INFO wor"[..])
    );

    let events: ObserverEvents = new_observer_events();
    append_to(&path, "ld\n2024-01-01 00:00:03 INFO next\n");
    // replays the 2 stale entries, then the rebuild rolls the tail back
    logfile.set_logline_observer(Box::new(EventRecorder {
        events: events.clone(),
    }));
    events.borrow_mut().clear();
    let results = rebuild_fully(&mut logfile);
    assert_eq!(
        results,
        vec![RebuildResult::NewLines, RebuildResult::NoNewLines]
    );
    assert_eq!(logfile.len(), 3, "no duplication after re-index");
    assert!(!logfile.is_partial_line());
    assert_eq!(
        logfile.read_line(1).unwrap(),
        Bytes::from(&b"2024-01-01 00:00:02 INFO world"[..])
    );
    assert_eq!(
        logfile.get(2).unwrap().get_time(),
        ymdhms(2024, 1, 1, 0, 0, 3)
    );
    // exactly one restart, delivered before any new_line
    let recorded = events.borrow();
    assert_eq!(recorded.first(), Some(&ObserverEvent::Restart(1)));
    assert_eq!(
        recorded
            .iter()
            .filter(|ev| matches!(ev, ObserverEvent::Restart(_)))
            .count(),
        1
    );
    drop(recorded);
    assert_index_invariants(&logfile);
}

#[test]
fn test_rotation_detected() {
    let data = "2024-01-01 00:00:01 INFO one\n2024-01-01 00:00:02 INFO two\n";
    let ntf = create_temp_file(data);
    let path = ntf_fpath(&ntf);
    let mut logfile = new_LogFile(&path);
    rebuild_fully(&mut logfile);
    assert_eq!(logfile.len(), 2);

    truncate_and_write(&path, "fresh\n");
    let result = logfile.rebuild_index().unwrap();
    assert_eq!(result, RebuildResult::NoNewLines);
    assert!(logfile.is_closed());
    assert!(!logfile.exists(), "a shrunken file reports non-existence");
    // the index from before the rotation is retained for eviction logic
    assert_eq!(logfile.len(), 2);
    // further rebuilds fail their stat; the object stays usable
    let err = logfile.rebuild_index().unwrap_err();
    assert_eq!(err.kind(), LogFileErrorKind::Stat);
}

#[test]
fn test_late_format_lockin_rewrites_times() {
    let data = "starting up\npid 1234\nloading config\n2024-01-01 00:00:00 INFO ready\n";
    let ntf = create_temp_file(data);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    let results = rebuild_fully(&mut logfile);
    // the head timestamp changed when the prior lines were rewritten, so
    // the lock-in pass reports a new order
    assert_eq!(results.first(), Some(&RebuildResult::NewOrder));
    assert_eq!(logfile.len(), 4);
    assert!(logfile.has_format());
    let anchor_time: Seconds = ymdhms(2024, 1, 1, 0, 0, 0);
    for i in 0..4 {
        assert_eq!(
            logfile.get(i).unwrap().get_time(),
            anchor_time,
            "entry {} must carry the first matched line's timestamp",
            i
        );
    }
    // the content id is the hash of the first matched line's bytes, even
    // though that line is not the first line of the file
    assert_eq!(
        logfile.get_content_id(),
        xxh3_64(b"2024-01-01 00:00:00 INFO ready")
    );
    assert_index_invariants(&logfile);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// round-trip / idempotence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_rebuild_idempotent() {
    let data = "2024-01-01 00:00:01 INFO a\n2024-01-01 00:00:02 WARN b\n    detail\n";
    let ntf = create_temp_file(data);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    rebuild_fully(&mut logfile);
    let snapshot = index_snapshot(&logfile);
    let index_size = logfile.get_index_size();
    let content_id = logfile.get_content_id();

    let result = logfile.rebuild_index().unwrap();
    assert_eq!(result, RebuildResult::NoNewLines);
    assert_eq!(index_snapshot(&logfile), snapshot);
    assert_eq!(logfile.get_index_size(), index_size);
    assert_eq!(logfile.get_content_id(), content_id);
}

#[test]
fn test_incremental_equals_bulk() {
    let part_a = "2024-01-01 00:00:01 INFO a\n2024-01-01 00:00:02 WARN b\n";
    let part_b = "    detail line\n2024-01-01 00:00:03 ERROR c\n";

    // incremental: index A, append B, index again
    let ntf_inc = create_temp_file(part_a);
    let path_inc = ntf_fpath(&ntf_inc);
    let mut logfile_inc = new_LogFile(&path_inc);
    rebuild_fully(&mut logfile_inc);
    append_to(&path_inc, part_b);
    rebuild_fully(&mut logfile_inc);

    // bulk: index the whole file from empty
    let whole: String = format!("{}{}", part_a, part_b);
    let ntf_bulk = create_temp_file(&whole);
    let mut logfile_bulk = new_LogFile(&ntf_fpath(&ntf_bulk));
    rebuild_fully(&mut logfile_bulk);

    assert_eq!(index_snapshot(&logfile_inc), index_snapshot(&logfile_bulk));
    assert_eq!(
        logfile_inc.get_index_size(),
        logfile_bulk.get_index_size()
    );
    assert_index_invariants(&logfile_inc);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// observers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_observer_ordering() {
    let data = "2024-01-01 00:00:01 INFO a\n2024-01-01 00:00:02 INFO b\n";
    let ntf = create_temp_file(data);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    let events: ObserverEvents = new_observer_events();
    logfile.set_logline_observer(Box::new(EventRecorder {
        events: events.clone(),
    }));
    logfile.set_logfile_observer(Box::new(ProgressRecorder {
        events: events.clone(),
    }));
    events.borrow_mut().clear();

    rebuild_fully(&mut logfile);

    let recorded = events.borrow();
    // per rebuild pass: optional restart first, then new_lines in index
    // order, then exactly one eof
    let mut saw_new_line_this_pass = false;
    let mut last_index: Option<usize> = None;
    let mut eof_count = 0;
    for event in recorded.iter() {
        match event {
            ObserverEvent::Restart(count) => {
                assert!(
                    !saw_new_line_this_pass,
                    "restart must precede new_line within a pass"
                );
                assert!(*count > 0);
            }
            ObserverEvent::NewLine(index, _bytes) => {
                saw_new_line_this_pass = true;
                if let Some(last) = last_index {
                    assert!(*index == last + 1 || *index <= last, "indexes arrive in order");
                }
                last_index = Some(*index);
            }
            ObserverEvent::Eof => {
                eof_count += 1;
                saw_new_line_this_pass = false;
                last_index = None;
            }
            ObserverEvent::Indexing(_done, total) => {
                assert_eq!(*total, data.len() as u64);
            }
        }
    }
    // two passes found new data (lock-in yield splits the work)
    assert_eq!(eof_count, 2);
    drop(recorded);
    assert_index_invariants(&logfile);
}

#[test]
fn test_reobserve_on_attach() {
    let ntf = create_temp_file(DATA_TIMESTAMPED_1);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    rebuild_fully(&mut logfile);
    assert_eq!(logfile.len(), 1);

    // attaching an observer after indexing replays the existing index
    let events: ObserverEvents = new_observer_events();
    logfile.set_logline_observer(Box::new(EventRecorder {
        events: events.clone(),
    }));
    assert_eq!(
        events.borrow().as_slice(),
        &[
            ObserverEvent::NewLine(0, Bytes::from(&b"2024-01-01 00:00:00 INFO hello"[..])),
            ObserverEvent::Eof,
        ]
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// format detection controls
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_detect_format_disabled() {
    let ntf = create_temp_file(DATA_TIMESTAMPED_1);
    let options = LogFileOpenOptions {
        file: None,
        detect_format: false,
    };
    let mut logfile = LogFile::new(ntf_fpath(&ntf), options).unwrap();
    rebuild_fully(&mut logfile);
    assert_eq!(logfile.len(), 1);
    assert!(!logfile.has_format());
    let ll = logfile.get(0).unwrap();
    assert_eq!(ll.get_level(), LogLevel::Unknown);
    assert!(!ll.is_continued(), "no CONTINUED flag before lock-in");
}

#[test]
fn test_syslog_format_name_gated() {
    let data = "Jan  2 03:04:05 myhost cron[77]: session opened\n";
    let suffix = String::from(".log");
    let ntf = crate::debug::helpers::create_temp_file_with_suffix(data, &suffix);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    rebuild_fully(&mut logfile);
    assert_eq!(logfile.get_format_name(), Some("syslog"));
    assert_eq!(logfile.len(), 1);
    assert_eq!(logfile.get(0).unwrap().get_opid(), 77);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// read / message extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_read_line_trims_and_scrubs() {
    let ntf = create_temp_file_bytes(b"2024-01-01 00:00:00 INFO ok\nbad \xFF byte\n");
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    rebuild_fully(&mut logfile);
    assert_eq!(logfile.len(), 2);
    assert_eq!(
        logfile.read_line(0).unwrap(),
        Bytes::from(&b"2024-01-01 00:00:00 INFO ok"[..])
    );
    assert!(!logfile.get(1).unwrap().is_valid_utf());
    let scrubbed = logfile.read_line(1).unwrap();
    assert_eq!(scrubbed, Bytes::from(&b"bad ? byte"[..]));
}

#[test]
fn test_line_length_and_cache() {
    let data = "2024-01-01 00:00:01 INFO a\n2024-01-01 00:00:02 INFO b\n";
    let ntf = create_temp_file(data);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    rebuild_fully(&mut logfile);
    let expect: usize = "2024-01-01 00:00:01 INFO a".len();
    assert_eq!(logfile.line_length(0, false), expect);
    // second query serves from the single-slot cache
    assert_eq!(logfile.line_length(0, false), expect);
    assert_eq!(logfile.line_length(1, false), expect);
}

#[test_case(0, "2024-01-01 00:00:00 ERROR boom\n    at frame 1\n    at frame 2"; "whole record")]
#[test_case(2, "2024-01-01 00:00:00 ERROR boom\n    at frame 1"; "capped")]
fn test_read_full_message(
    max_lines: usize,
    expect: &str,
) {
    let data = "2024-01-01 00:00:00 ERROR boom\n    at frame 1\n    at frame 2\n";
    let ntf = create_temp_file(data);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    rebuild_fully(&mut logfile);
    assert_eq!(logfile.len(), 3);
    let mut message = Bytes::new();
    logfile.read_full_message(0, &mut message, max_lines);
    assert_eq!(message, Bytes::from(expect.as_bytes()));
}

#[test]
fn test_longest_line_tracked() {
    let data = "2024-01-01 00:00:00 INFO short\nsecond line is quite a bit longer than that\n";
    let ntf = create_temp_file(data);
    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    rebuild_fully(&mut logfile);
    assert_eq!(
        logfile.get_longest_line(),
        "second line is quite a bit longer than that".len()
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// compressed transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_gz_logfile_indexes_logical_stream() {
    const GZ_MTIME: u32 = 1_700_000_000;
    let data = "2024-01-01 00:00:01 INFO a\n2024-01-01 00:00:02 INFO b\n";
    let mut encoder = GzBuilder::new()
        .mtime(GZ_MTIME)
        .write(Vec::new(), Compression::default());
    encoder
        .write_all(data.as_bytes())
        .unwrap();
    let gz: Bytes = encoder.finish().unwrap();
    let ntf = create_temp_file_bytes(&gz);

    let mut logfile = new_LogFile(&ntf_fpath(&ntf));
    rebuild_fully(&mut logfile);
    assert_eq!(logfile.len(), 2);
    assert_eq!(logfile.get_format_name(), Some("timestamped"));
    // offsets address the decompressed stream
    assert_eq!(logfile.get(1).unwrap().get_offset(), 27);
    assert_eq!(logfile.get_index_size(), data.len() as FileOffset);
    // the gzip header mtime becomes the index wall-clock base
    assert_eq!(logfile.get_index_time(), GZ_MTIME as Seconds);
    assert_eq!(
        logfile.read_line(1).unwrap(),
        Bytes::from(&b"2024-01-01 00:00:02 INFO b"[..])
    );
    assert_index_invariants(&logfile);
}
