//! Rootless path fragments, combinable with [`AbsolutePath`].

use std::fmt;

use crate::error::{FsError, Result};
use crate::path::Extension;

/// An immutable, normalized relative path.
///
/// Stored with the canonical `/` separator, no leading or trailing
/// separator, no `.` or `..` segments. The empty fragment denotes "self".
///
/// Comparison is byte-wise: a relative path has no convention of its own,
/// case rules only apply once it is combined with an [`AbsolutePath`].
///
/// [`AbsolutePath`]: crate::AbsolutePath
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath {
    inner: String,
}

impl RelativePath {
    /// Validates and normalizes a fragment.
    ///
    /// Fails with [`FsError::InvalidPath`] when the text begins with a
    /// root marker (`/`, `\` or a drive prefix) or when `..` segments
    /// would escape the fragment's own start.
    pub fn new(text: &str) -> Result<Self> {
        let sanitized = text.replace('\\', "/");
        if sanitized.starts_with('/') {
            return Err(FsError::invalid_path(text, "relative path begins with a root"));
        }
        let bytes = sanitized.as_bytes();
        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            return Err(FsError::invalid_path(text, "relative path begins with a drive"));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in sanitized.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(FsError::invalid_path(text, "path escapes its base"));
                    }
                }
                other => segments.push(other),
            }
        }

        Ok(Self {
            inner: segments.join("/"),
        })
    }

    /// The empty fragment, denoting "self".
    pub fn empty() -> Self {
        Self {
            inner: String::new(),
        }
    }

    pub(crate) fn from_normalized(inner: &str) -> Self {
        Self {
            inner: inner.to_owned(),
        }
    }

    pub fn is_self(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Appends another fragment.
    pub fn join(&self, other: &RelativePath) -> RelativePath {
        if self.is_self() {
            return other.clone();
        }
        if other.is_self() {
            return self.clone();
        }
        Self {
            inner: format!("{}/{}", self.inner, other.inner),
        }
    }

    /// The last segment, or `None` for the self fragment.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_self() {
            return None;
        }
        Some(match self.inner.rfind('/') {
            Some(pos) => &self.inner[pos + 1..],
            None => &self.inner,
        })
    }

    /// The normalized extension of the last segment, if any.
    pub fn extension(&self) -> Option<Extension> {
        let name = self.file_name()?;
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(Extension::new(ext)),
            _ => None,
        }
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(RelativePath::new("a/b/c").unwrap().as_str(), "a/b/c");
        assert_eq!(RelativePath::new("a//b/./c/").unwrap().as_str(), "a/b/c");
        assert_eq!(RelativePath::new("a\\b").unwrap().as_str(), "a/b");
        assert_eq!(RelativePath::new("a/x/../b").unwrap().as_str(), "a/b");
        assert_eq!(RelativePath::new("").unwrap().as_str(), "");
        assert_eq!(RelativePath::new(".").unwrap().as_str(), "");
    }

    #[test]
    fn test_root_markers_are_rejected() {
        assert!(matches!(
            RelativePath::new("/a/b"),
            Err(FsError::InvalidPath { .. })
        ));
        assert!(matches!(
            RelativePath::new("\\a"),
            Err(FsError::InvalidPath { .. })
        ));
        assert!(matches!(
            RelativePath::new("C:/a"),
            Err(FsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_escaping_parent_is_rejected() {
        assert!(matches!(
            RelativePath::new(".."),
            Err(FsError::InvalidPath { .. })
        ));
        assert!(matches!(
            RelativePath::new("a/../../b"),
            Err(FsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_empty_denotes_self() {
        let empty = RelativePath::empty();
        assert!(empty.is_self());
        assert_eq!(empty.file_name(), None);
        let joined = empty.join(&RelativePath::new("x").unwrap());
        assert_eq!(joined.as_str(), "x");
    }

    #[test]
    fn test_join() {
        let a = RelativePath::new("a/b").unwrap();
        let b = RelativePath::new("c").unwrap();
        assert_eq!(a.join(&b).as_str(), "a/b/c");
        assert_eq!(a.join(&RelativePath::empty()), a);
    }

    #[test]
    fn test_file_name_and_extension() {
        let p = RelativePath::new("dir/file.tar.gz").unwrap();
        assert_eq!(p.file_name(), Some("file.tar.gz"));
        assert_eq!(p.extension(), Some(Extension::new("gz")));
        assert_eq!(RelativePath::new("noext").unwrap().extension(), None);
    }
}
