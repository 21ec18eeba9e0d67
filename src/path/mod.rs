//! The path model: immutable, normalized path values.
//!
//! Paths are stored with a single canonical separator (`/`) regardless of
//! the separator style they were parsed from. Which root forms are valid
//! and whether comparisons fold case is decided by the [`Convention`] a
//! path was parsed under, never by the storage backing the filesystem.

mod absolute;
mod extension;
mod known;
mod relative;

pub use absolute::AbsolutePath;
pub use extension::Extension;
pub use known::KnownPath;
pub use relative::RelativePath;

/// The OS path convention a filesystem instance follows.
///
/// Decides the accepted root form (`/` vs `X:/`), case sensitivity of
/// path comparison and glob matching (ASCII folding on Windows), and how
/// cross-platform conversion anchors paths.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Convention {
    Posix,
    Windows,
}

impl Convention {
    /// The convention of the OS this process runs on.
    pub const fn host() -> Self {
        if cfg!(windows) {
            Convention::Windows
        } else {
            Convention::Posix
        }
    }

    /// Posix paths compare case-sensitively, Windows paths do not.
    pub const fn case_sensitive(self) -> bool {
        matches!(self, Convention::Posix)
    }

    /// Length of the root prefix of `sanitized` (separators already
    /// canonical), or `None` when the text lacks a valid root for this
    /// convention.
    pub(crate) fn root_len(self, sanitized: &str) -> Option<usize> {
        match self {
            Convention::Posix => sanitized.starts_with('/').then_some(1),
            Convention::Windows => {
                let bytes = sanitized.as_bytes();
                (bytes.len() >= 3
                    && bytes[0].is_ascii_alphabetic()
                    && bytes[1] == b':'
                    && bytes[2] == b'/')
                    .then_some(3)
            }
        }
    }
}

/// Byte-wise equality with optional ASCII case folding.
pub(crate) fn bytes_eq_fold(a: &[u8], b: &[u8], case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// Case-folded copy of `s` for use as a lookup key under a
/// case-insensitive convention; `s` itself otherwise.
pub(crate) fn fold_key(s: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        s.to_owned()
    } else {
        s.to_ascii_lowercase()
    }
}
