//! The filesystem capability contract and its conforming backends.
//!
//! [`FileSystem`] is the single substitutable interface file-manipulating
//! code is written against. Exactly two backends conform: [`OsFS`] maps
//! the contract onto real OS calls, [`MemFS`] keeps a virtual tree fully
//! in memory. [`OverlayFS`] is not a third backend; it rewrites paths and
//! known-path symbols once and then delegates to its parent, so deeper
//! logic always receives already-resolved absolute paths.

mod mem_fs;
mod os_fs;
mod overlay;

pub use mem_fs::MemFS;
pub use os_fs::OsFS;
pub use overlay::{OverlayFS, OverlayOptions};

use std::time::SystemTime;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::mmap::MappedHandle;
use crate::path::{AbsolutePath, Convention, KnownPath};

/// What kind of entry a path resolves to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// The common entry contract both backends report: size, timestamps and
/// the read-only flag. Real-backend metadata is a lazy view computed on
/// demand; in-memory metadata reads the live virtual node.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub kind: EntryKind,
    pub size: u64,
    pub created: SystemTime,
    pub modified: SystemTime,
    pub read_only: bool,
}

impl Metadata {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// How a memory mapping is opened.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MappingMode {
    /// Map an existing file read-only.
    ReadOnly,
    /// Map read-write, creating the file if absent. A non-zero `size`
    /// preallocates (or truncates) the file to exactly that many bytes;
    /// `size == 0` maps the file's current contents.
    ReadWrite { size: u64 },
}

/// The operations a backend must provide.
///
/// All methods take `&self`; backends use interior mutability where they
/// keep state, so one instance can be shared as `Arc<dyn FileSystem>`
/// across threads and test fixtures. Every method receives absolute
/// paths that have already passed overlay resolution.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// The OS path convention this instance was constructed with. Also
    /// decides the case rules for path comparison and glob matching, for
    /// real and virtual storage alike.
    fn convention(&self) -> Convention;

    /// Resolves a symbolic location for this instance.
    fn known_path(&self, known: KnownPath) -> Result<AbsolutePath>;

    /// Size, timestamps and read-only flag of an existing entry.
    fn metadata(&self, path: &AbsolutePath) -> Result<Metadata>;

    /// Reads the entire contents of a file.
    fn read(&self, path: &AbsolutePath) -> Result<Vec<u8>>;

    /// Creates or replaces a file with `content`, creating missing
    /// parent directories. The previous contents are only replaced by a
    /// completed write, never incrementally.
    fn write(&self, path: &AbsolutePath, content: &[u8]) -> Result<()>;

    /// Creates an empty file, truncating an existing one.
    fn create_file(&self, path: &AbsolutePath) -> Result<()>;

    /// Creates a directory and all missing ancestors. Idempotent: an
    /// already-existing directory is not an error.
    fn create_directory(&self, path: &AbsolutePath) -> Result<()>;

    /// Deletes a file. A read-only attribute is cleared once before the
    /// delete is retried.
    fn delete_file(&self, path: &AbsolutePath) -> Result<()>;

    /// Deletes a directory. Without `recursive`, a non-empty directory
    /// fails with [`DirectoryNotEmpty`](crate::FsError::DirectoryNotEmpty).
    fn delete_directory(&self, path: &AbsolutePath, recursive: bool) -> Result<()>;

    /// Moves or renames a file, preserving its metadata (creation time,
    /// read-only flag). Fails with
    /// [`AlreadyExists`](crate::FsError::AlreadyExists) when the
    /// destination exists and `overwrite` is false.
    fn move_file(&self, from: &AbsolutePath, to: &AbsolutePath, overwrite: bool) -> Result<()>;

    /// Sets or clears the read-only flag.
    fn set_read_only(&self, path: &AbsolutePath, read_only: bool) -> Result<()>;

    /// Enumerates files under `dir`, optionally recursive, optionally
    /// filtered by a glob pattern (`*`, `?`) matched against file names
    /// with the convention's case rules. Results are sorted.
    fn enumerate_files(
        &self,
        dir: &AbsolutePath,
        pattern: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<AbsolutePath>>;

    /// Enumerates directories under `dir`, excluding `dir` itself.
    /// Results are sorted.
    fn enumerate_directories(&self, dir: &AbsolutePath, recursive: bool)
    -> Result<Vec<AbsolutePath>>;

    /// Random-access read into `buf` starting at `offset`. Loops until
    /// `buf` is full or the source signals end-of-data and returns the
    /// count actually read; a short read is not an error.
    fn read_at(&self, path: &AbsolutePath, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Asynchronous variant of [`read_at`](Self::read_at), reading up to
    /// `len` bytes. Cancellation aborts only the in-flight read with
    /// [`Cancelled`](crate::FsError::Cancelled) and leaves backend state
    /// consistent.
    async fn read_at_async(
        &self,
        path: &AbsolutePath,
        offset: u64,
        len: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>>;

    /// Creates a memory mapping over a file. A zero-length result is a
    /// null-sentinel handle, never an actual zero-byte mapping.
    fn create_mapping(&self, path: &AbsolutePath, mode: MappingMode) -> Result<MappedHandle>;

    /// Checks if a path exists.
    fn exists(&self, path: &AbsolutePath) -> bool {
        self.metadata(path).is_ok()
    }

    /// Checks if `path` is an existing file.
    fn is_file(&self, path: &AbsolutePath) -> bool {
        self.metadata(path).map(|m| m.is_file()).unwrap_or(false)
    }

    /// Checks if `path` is an existing directory.
    fn is_dir(&self, path: &AbsolutePath) -> bool {
        self.metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Expands known-folder placeholders (`{EntryFolder}`,
    /// `{CurrentDirectory}`, `{HomeFolder}`, `{MyGames}`) as plain text
    /// substitution, then validates and normalizes the result into an
    /// [`AbsolutePath`]. Expansion is idempotent: resolved values contain
    /// no placeholders.
    fn parse_unsanitized(&self, text: &str) -> Result<AbsolutePath> {
        let mut expanded = text.to_owned();
        for (token, known) in KnownPath::PLACEHOLDERS {
            if expanded.contains(token) {
                let value = self.known_path(known)?;
                expanded = expanded.replace(token, value.as_str());
            }
        }
        AbsolutePath::from_unsanitized(&expanded, self.convention())
    }
}
