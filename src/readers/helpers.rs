// src/readers/helpers.rs

//! Miscellaneous helper functions for _Readers_: path conversions,
//! line-ending trim, on-read UTF-8 scrubbing, and the text-format
//! heuristic.

use crate::common::{Bytes, CRu8, FPath, NLu8, TextFormat};

use ::bstr::ByteSlice;
use ::lazy_static::lazy_static;
use ::regex::bytes::Regex;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

/// Replacement byte written over invalid UTF-8 sequences by
/// [`scrub_to_utf8`].
const SCRUB_BYTE: u8 = b'?';

/// Return the basename of an `FPath`.
pub fn basename(path: &FPath) -> FPath {
    let mut riter = path.rsplit(std::path::MAIN_SEPARATOR);

    FPath::from(riter.next().unwrap_or(""))
}

/// Helper function for a slightly annoying set of calls.
pub fn path_to_fpath(path: &std::path::Path) -> FPath {
    (*(path.to_string_lossy())).to_string()
}

/// Helper function for completeness.
pub fn fpath_to_path(path: &FPath) -> &std::path::Path {
    std::path::Path::new(path)
}

/// Is `byte` a line-ending byte? (`'\n'` or `'\r'`)
#[inline(always)]
pub const fn is_line_ending(byte: u8) -> bool {
    byte == NLu8 || byte == CRu8
}

/// Remove trailing line-ending bytes from `bytes` in place.
pub fn rtrim_line_endings(bytes: &mut Bytes) {
    while let Some(byte) = bytes.last() {
        if !is_line_ending(*byte) {
            break;
        }
        bytes.pop();
    }
}

/// Overwrite invalid UTF-8 sequences within `bytes` in place.
///
/// Every byte of an invalid sequence becomes `'?'`. The buffer length does
/// not change so previously derived offsets remain valid.
pub fn scrub_to_utf8(bytes: &mut [u8]) {
    let mut at: usize = 0;
    // `utf8_chunks` walks maximal valid spans and the invalid bytes between
    let invalid_spans: Vec<(usize, usize)> = bytes
        .utf8_chunks()
        .map(|chunk| {
            let beg = at + chunk.valid().len();
            let end = beg + chunk.invalid().len();
            at = end;
            (beg, end)
        })
        .collect();
    for (beg, end) in invalid_spans.into_iter() {
        for byte in bytes[beg..end].iter_mut() {
            *byte = SCRUB_BYTE;
        }
    }
}

lazy_static! {
    /// an XML prolog or a bare opening tag at start of data
    static ref TEXT_FORMAT_XML: Regex = Regex::new(r"^\s*<(\?xml|[A-Za-z])").unwrap();
    /// a markdown ATX header or setext underline near the start of data
    static ref TEXT_FORMAT_MARKDOWN: Regex =
        Regex::new(r"(?m)^(#{1,6} \S|={3,}\s*$|-{3,}\s*$)").unwrap();
}

/// Heuristic classification of the first available bytes of a file.
///
/// Checked once, when the first line is indexed. The classification does
/// not affect indexing; it is a hint surfaced to consumers.
pub fn detect_text_format(data: &[u8]) -> TextFormat {
    defn!("({} bytes)", data.len());
    let trimmed: &[u8] = data.trim_start();
    if trimmed.is_empty() {
        defx!("return {:?}", TextFormat::Unknown);
        return TextFormat::Unknown;
    }
    if TEXT_FORMAT_XML.is_match(data) {
        defx!("return {:?}", TextFormat::Xml);
        return TextFormat::Xml;
    }
    if trimmed[0] == b'{' || trimmed[0] == b'[' {
        defx!("return {:?}", TextFormat::Json);
        return TextFormat::Json;
    }
    if TEXT_FORMAT_MARKDOWN.is_match(data) {
        defx!("return {:?}", TextFormat::Markdown);
        return TextFormat::Markdown;
    }
    defx!("return {:?}", TextFormat::Plain);

    TextFormat::Plain
}
