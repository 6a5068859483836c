// src/common.rs

//! Common imports, type aliases, and other globals for _logdexlib_.

#[doc(hidden)]
pub use std::fs::File;
#[doc(hidden)]
pub use std::path::Path;

/// `F`ake `Path` or `F`ile `Path`.
///
/// Type alias `FPath` is a simpler stand-in for formalized file system path
/// [`std::path::Path`].
///
/// `std::path::Path` does not have trait `Sized` so instances must be
/// passed-by-reference which sometimes requires marking explicit lifetimes.
/// It is easier to use a [`String`] and convert to a `Path` as needed.
///
/// [`String`]: std::string::String
pub type FPath = String;

/// A sequence of [`FPath`]s.
pub type FPaths = Vec<FPath>;

#[doc(hidden)]
pub type FileMetadata = std::fs::Metadata;

/// File Size in bytes.
pub type FileSz = u64;

/// Offset into a file in bytes. Zero-based.
///
/// For a compressed file this is an offset into the _logical_
/// (decompressed) byte stream.
pub type FileOffset = u64;

/// A general-purpose counting type, typically used for internal statistics
/// counting.
pub type Count = u64;

/// A [`Vec`](std::vec::Vec) of `u8`.
pub type Bytes = Vec<u8>;

/// *N*ew*L*ine as a [`char`].
#[allow(non_upper_case_globals)]
pub const NLc: char = '\n';
/// Single-byte *N*ew*L*ine `char` as [`u8`].
#[allow(non_upper_case_globals)]
pub const NLu8: u8 = 10;
/// *C*arriage *R*eturn as [`u8`].
#[allow(non_upper_case_globals)]
pub const CRu8: u8 = 13;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// text format classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Coarse classification of the text content of an indexed file, derived
/// from the first available prefix by [`detect_text_format`].
///
/// [`detect_text_format`]: crate::readers::helpers::detect_text_format
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TextFormat {
    /// an unset or undecided value, the default
    #[default]
    Unknown,
    /// ordinary line-oriented text
    Plain,
    /// markdown-ish text; header lines, bullet lists
    Markdown,
    /// an XML document, e.g. `<?xml …?>`
    Xml,
    /// a JSON document or JSON lines
    Json,
}

impl std::fmt::Display for TextFormat {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        match self {
            TextFormat::Unknown => write!(f, "UNKNOWN"),
            TextFormat::Plain => write!(f, "PLAIN"),
            TextFormat::Markdown => write!(f, "MARKDOWN"),
            TextFormat::Xml => write!(f, "XML"),
            TextFormat::Json => write!(f, "JSON"),
        }
    }
}

#[macro_export]
macro_rules! debug_panic {
    ($($arg:tt)*) => (
        if cfg!(debug_assertions) {
            panic!($($arg)*);
        }
    )
}
pub use debug_panic;
