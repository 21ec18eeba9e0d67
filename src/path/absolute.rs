//! Root-anchored, normalized path values.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{FsError, Result};
use crate::path::{Convention, RelativePath, bytes_eq_fold, Extension};

/// An immutable absolute path, normalized at construction.
///
/// `AbsolutePath` stores the canonical text form: a root matching its
/// [`Convention`] (`/` or `X:/`), segments joined by a single `/`, no
/// trailing separator except on the bare root, no `.` or `..` segments.
/// The filesystem instance that produced a path is the sole authority
/// for resolving it to host calls; the value itself only carries the
/// convention it was parsed under.
///
/// Equality, ordering and hashing fold ASCII case when the convention is
/// case-insensitive, so `C:/Data` and `c:/data` are the same path under
/// [`Convention::Windows`] and distinct under [`Convention::Posix`].
#[derive(Debug, Clone)]
pub struct AbsolutePath {
    inner: String,
    convention: Convention,
}

impl AbsolutePath {
    /// Validates and normalizes arbitrary input into an `AbsolutePath`.
    ///
    /// Accepts both separator styles (`\` is canonicalized to `/`),
    /// collapses duplicate separators, drops `.` segments and resolves
    /// `..` segments, clamping at the root. Fails with
    /// [`FsError::InvalidPath`] when the text lacks a valid root for the
    /// target convention.
    pub fn from_unsanitized(text: &str, convention: Convention) -> Result<Self> {
        if text.is_empty() {
            return Err(FsError::invalid_path(text, "empty"));
        }

        let sanitized = text.replace('\\', "/");
        let root_len = convention
            .root_len(&sanitized)
            .ok_or_else(|| FsError::invalid_path(text, "no valid root for the target OS"))?;

        let mut inner = sanitized[..root_len].to_owned();
        if convention == Convention::Windows {
            // Canonical drive letter is upper case.
            inner = inner.to_ascii_uppercase();
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in sanitized[root_len..].split('/') {
            match segment {
                "" | "." => {}
                // `..` above the root resolves to the root itself.
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        inner.push_str(&segments.join("/"));

        Ok(Self { inner, convention })
    }

    pub(crate) fn from_canonical(inner: String, convention: Convention) -> Self {
        Self { inner, convention }
    }

    /// The root path of this path's convention (`/` or e.g. `C:/`).
    pub fn root(&self) -> AbsolutePath {
        Self {
            inner: self.inner[..self.root_len()].to_owned(),
            convention: self.convention,
        }
    }

    pub fn is_root(&self) -> bool {
        self.inner.len() == self.root_len()
    }

    pub fn convention(&self) -> Convention {
        self.convention
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    fn root_len(&self) -> usize {
        match self.convention {
            Convention::Posix => 1,
            Convention::Windows => 3,
        }
    }

    /// The parent directory, or `None` for the root.
    pub fn parent(&self) -> Option<AbsolutePath> {
        if self.is_root() {
            return None;
        }
        let cut = match self.inner[self.root_len()..].rfind('/') {
            Some(pos) => self.root_len() + pos,
            // Direct child of the root.
            None => self.root_len(),
        };
        Some(Self {
            inner: self.inner[..cut].to_owned(),
            convention: self.convention,
        })
    }

    /// The last path segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(match self.inner[self.root_len()..].rfind('/') {
            Some(pos) => &self.inner[self.root_len() + pos + 1..],
            None => &self.inner[self.root_len()..],
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

    /// Appends a relative path, producing a new absolute path.
    pub fn combine(&self, relative: &RelativePath) -> AbsolutePath {
        if relative.is_self() {
            return self.clone();
        }
        let mut inner = self.inner.clone();
        if !inner.ends_with('/') {
            inner.push('/');
        }
        inner.push_str(relative.as_str());
        Self {
            inner,
            convention: self.convention,
        }
    }

    /// Convenience for combining a raw fragment; see [`RelativePath::new`].
    pub fn join(&self, fragment: &str) -> Result<AbsolutePath> {
        Ok(self.combine(&RelativePath::new(fragment)?))
    }

    /// Computes the relative path from `base` to `self`.
    ///
    /// Fails with [`FsError::NotASubpath`] when `self` is not inside
    /// `base`. The returned fragment keeps this path's original casing.
    pub fn relative_to(&self, base: &AbsolutePath) -> Result<RelativePath> {
        if !self.in_folder(base) {
            return Err(FsError::NotASubpath {
                path: self.inner.clone(),
                base: base.inner.clone(),
            });
        }
        if self.inner.len() == base.inner.len() {
            return Ok(RelativePath::empty());
        }
        let start = if base.is_root() {
            base.inner.len()
        } else {
            base.inner.len() + 1
        };
        Ok(RelativePath::from_normalized(&self.inner[start..]))
    }

    /// Pure containment test: true when `self` is `candidate_root` itself
    /// or any path below it.
    pub fn in_folder(&self, candidate_root: &AbsolutePath) -> bool {
        if self.convention != candidate_root.convention
            || self.inner.len() < candidate_root.inner.len()
        {
            return false;
        }
        let prefix = candidate_root.inner.as_bytes();
        if !bytes_eq_fold(
            &self.inner.as_bytes()[..prefix.len()],
            prefix,
            self.convention.case_sensitive(),
        ) {
            return false;
        }
        self.inner.len() == prefix.len()
            || candidate_root.is_root()
            || self.inner.as_bytes()[prefix.len()] == b'/'
    }

    /// Re-anchors this path under another convention.
    ///
    /// Posix to Windows anchors under `C:`; Windows to Posix drops the
    /// drive. Used when overlay mappings are supplied in the other
    /// platform's form.
    pub fn convert_to(&self, convention: Convention) -> AbsolutePath {
        match (self.convention, convention) {
            (a, b) if a == b => self.clone(),
            (Convention::Posix, Convention::Windows) => Self {
                inner: format!("C:{}", self.inner),
                convention,
            },
            (Convention::Windows, Convention::Posix) => Self {
                inner: self.inner[2..].to_owned(),
                convention,
            },
            _ => unreachable!(),
        }
    }

    fn folded_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        let fold = !self.convention.case_sensitive();
        self.inner
            .bytes()
            .map(move |b| if fold { b.to_ascii_lowercase() } else { b })
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl PartialEq for AbsolutePath {
    fn eq(&self, other: &Self) -> bool {
        self.convention == other.convention
            && bytes_eq_fold(
                self.inner.as_bytes(),
                other.inner.as_bytes(),
                self.convention.case_sensitive(),
            )
    }
}

impl Eq for AbsolutePath {}

impl Hash for AbsolutePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.convention.hash(state);
        for b in self.folded_bytes() {
            state.write_u8(b);
        }
    }
}

impl PartialOrd for AbsolutePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AbsolutePath {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.convention as u8)
            .cmp(&(other.convention as u8))
            .then_with(|| self.folded_bytes().cmp(other.folded_bytes()))
    }
}
