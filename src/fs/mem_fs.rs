//! The in-memory backend: a virtual directory/file tree.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;

use crate::error::{FsError, Result};
use crate::fs::{EntryKind, FileSystem, MappingMode, Metadata};
use crate::glob::glob_match;
use crate::mmap::{MappedHandle, PinnedBuffer};
use crate::path::{AbsolutePath, Convention, KnownPath, fold_key};

struct DirNode {
    path: AbsolutePath,
    created: SystemTime,
    modified: SystemTime,
    read_only: bool,
}

impl DirNode {
    fn new(path: AbsolutePath) -> Self {
        let now = SystemTime::now();
        Self {
            path,
            created: now,
            modified: now,
            read_only: false,
        }
    }
}

struct FileNode {
    path: AbsolutePath,
    buf: Arc<PinnedBuffer>,
    created: SystemTime,
    modified: SystemTime,
    read_only: bool,
}

impl FileNode {
    fn new(path: AbsolutePath, content: &[u8]) -> Self {
        let now = SystemTime::now();
        Self {
            path,
            buf: Arc::new(PinnedBuffer::from_vec(content.to_vec())),
            created: now,
            modified: now,
            read_only: false,
        }
    }
}

/// A [`FileSystem`] backend that keeps its whole tree in memory.
///
/// ### Internal state
///
/// * `dirs` / `files` — concurrent lookup tables keyed by the case-folded
///   canonical path string. Safe for concurrent read and insert from
///   multiple threads (parallel test fixtures sharing one instance);
///   directory-chain creation is not atomic end-to-end, but insertion is
///   idempotent, so a racing creator finding the node already present is
///   not an error.
/// * `known` — the known-path lookup table, populated with in-memory
///   defaults under the root and overridable at construction.
///
/// ### Invariants
///
/// 1. The synthetic root (`/` or `C:/`, per convention) is always present
///    in `dirs` and cannot be removed.
/// 2. Every node's ancestors exist as directory nodes; missing ancestors
///    are created on demand, bottom-up collection then top-down linking.
/// 3. File content is a pinned buffer replaced only wholesale by a
///    completed write, mirroring the real backend's replace-on-close
///    semantics; a memory mapping pins the buffer it was created over.
pub struct MemFS {
    convention: Convention,
    root: AbsolutePath,
    dirs: DashMap<String, DirNode>,
    files: DashMap<String, FileNode>,
    known: HashMap<KnownPath, AbsolutePath>,
}

impl MemFS {
    /// Creates an empty tree under the host convention's root form.
    pub fn new() -> Self {
        Self::with_convention(Convention::host())
    }

    /// Creates an empty tree rooted at `/` (Posix) or `C:/` (Windows).
    pub fn with_convention(convention: Convention) -> Self {
        let root_text = match convention {
            Convention::Posix => "/",
            Convention::Windows => "C:/",
        };
        let root = AbsolutePath::from_canonical(root_text.to_owned(), convention);

        let dirs = DashMap::new();
        dirs.insert(
            fold_key(root.as_str(), convention.case_sensitive()),
            DirNode::new(root.clone()),
        );

        let fs = Self {
            convention,
            root: root.clone(),
            dirs,
            files: DashMap::new(),
            known: HashMap::new(),
        };

        let home = fs.must_join(&root, "home");
        let defaults = [
            (KnownPath::EntryFolder, fs.must_join(&root, "app")),
            (KnownPath::CurrentDirectory, root.clone()),
            (KnownPath::HomeFolder, home.clone()),
            (KnownPath::TempFolder, fs.must_join(&root, "temp")),
            (KnownPath::AppData, fs.must_join(&home, ".config")),
            (KnownPath::LocalAppData, fs.must_join(&home, ".local/share")),
            (KnownPath::MyGames, fs.must_join(&home, "Documents/My Games")),
        ];
        let mut fs = fs;
        for (known, path) in defaults {
            fs.ensure_dirs(&path).ok();
            fs.known.insert(known, path);
        }
        fs
    }

    /// Redirects a known path for this instance, creating the target
    /// directory.
    pub fn with_known_path(mut self, known: KnownPath, path: AbsolutePath) -> Result<Self> {
        self.guard(&path)?;
        self.ensure_dirs(&path)?;
        self.known.insert(known, path);
        Ok(self)
    }

    /// The synthetic root directory.
    pub fn root(&self) -> &AbsolutePath {
        &self.root
    }

    fn must_join(&self, base: &AbsolutePath, fragment: &str) -> AbsolutePath {
        // Fragments are compile-time constants; parsing cannot fail.
        base.join(fragment).unwrap_or_else(|_| base.clone())
    }

    fn key(&self, path: &AbsolutePath) -> String {
        fold_key(path.as_str(), self.convention.case_sensitive())
    }

    /// Paths parsed under another convention never belong to this tree.
    fn guard(&self, path: &AbsolutePath) -> Result<()> {
        if path.convention() != self.convention {
            return Err(FsError::invalid_path(
                path.as_str(),
                "path belongs to a different OS convention",
            ));
        }
        Ok(())
    }

    /// Creates `dir` and any missing ancestors: walk up collecting the
    /// missing chain, then create top-down so the traversal invariant
    /// holds even under partial construction. Insertion is idempotent;
    /// a concurrent creator winning the race is fine.
    fn ensure_dirs(&self, dir: &AbsolutePath) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = dir.clone();
        loop {
            if self.files.contains_key(&self.key(&current)) {
                return Err(FsError::already_exists(&current));
            }
            if self.dirs.contains_key(&self.key(&current)) {
                break;
            }
            missing.push(current.clone());
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        for dir in missing.into_iter().rev() {
            self.dirs
                .entry(self.key(&dir))
                .or_insert_with(|| DirNode::new(dir));
        }
        Ok(())
    }

    fn file_metadata(node: &FileNode) -> Metadata {
        Metadata {
            kind: EntryKind::File,
            size: node.buf.len() as u64,
            created: node.created,
            modified: node.modified,
            read_only: node.read_only,
        }
    }
}

impl Default for MemFS {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for MemFS {
    fn convention(&self) -> Convention {
        self.convention
    }

    fn known_path(&self, known: KnownPath) -> Result<AbsolutePath> {
        self.known
            .get(&known)
            .cloned()
            .ok_or_else(|| FsError::not_found(format!("{known:?}")))
    }

    fn metadata(&self, path: &AbsolutePath) -> Result<Metadata> {
        self.guard(path)?;
        let key = self.key(path);
        if let Some(node) = self.files.get(&key) {
            return Ok(Self::file_metadata(&node));
        }
        if let Some(node) = self.dirs.get(&key) {
            return Ok(Metadata {
                kind: EntryKind::Directory,
                size: 0,
                created: node.created,
                modified: node.modified,
                read_only: node.read_only,
            });
        }
        Err(FsError::not_found(path))
    }

    fn read(&self, path: &AbsolutePath) -> Result<Vec<u8>> {
        self.guard(path)?;
        if let Some(node) = self.files.get(&self.key(path)) {
            return Ok(node.buf.to_vec());
        }
        if self.dirs.contains_key(&self.key(path)) {
            return Err(FsError::Io {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
            });
        }
        Err(FsError::not_found(path))
    }

    fn write(&self, path: &AbsolutePath, content: &[u8]) -> Result<()> {
        self.guard(path)?;
        if self.dirs.contains_key(&self.key(path)) {
            return Err(FsError::already_exists(path));
        }
        if let Some(parent) = path.parent() {
            self.ensure_dirs(&parent)?;
        }
        match self.files.entry(self.key(path)) {
            Entry::Occupied(mut occupied) => {
                let node = occupied.get_mut();
                if node.read_only {
                    return Err(FsError::access_denied(path));
                }
                // The buffer is swapped wholesale; mappings over the old
                // buffer keep it pinned with its old content.
                node.buf = Arc::new(PinnedBuffer::from_vec(content.to_vec()));
                node.modified = SystemTime::now();
            }
            Entry::Vacant(vacant) => {
                vacant.insert(FileNode::new(path.clone(), content));
            }
        }
        Ok(())
    }

    fn create_file(&self, path: &AbsolutePath) -> Result<()> {
        self.write(path, &[])
    }

    fn create_directory(&self, path: &AbsolutePath) -> Result<()> {
        self.guard(path)?;
        self.ensure_dirs(path)
    }

    fn delete_file(&self, path: &AbsolutePath) -> Result<()> {
        self.guard(path)?;
        let key = self.key(path);
        match self.files.get(&key) {
            Some(node) => {
                if node.read_only {
                    log::debug!("clearing read-only before deleting {path}");
                }
            }
            None => return Err(FsError::not_found(path)),
        }
        self.files.remove(&key);
        Ok(())
    }

    fn delete_directory(&self, path: &AbsolutePath, recursive: bool) -> Result<()> {
        self.guard(path)?;
        if path.is_root() {
            return Err(FsError::invalid_path(
                path.as_str(),
                "the root cannot be removed",
            ));
        }
        if !self.dirs.contains_key(&self.key(path)) {
            return Err(FsError::not_found(path));
        }

        let child_dirs: Vec<String> = self
            .dirs
            .iter()
            .filter(|entry| entry.value().path.in_folder(path))
            .map(|entry| entry.key().clone())
            .collect();
        let child_files: Vec<String> = self
            .files
            .iter()
            .filter(|entry| entry.value().path.in_folder(path))
            .map(|entry| entry.key().clone())
            .collect();

        // `child_dirs` always contains `path` itself.
        if !recursive && (child_dirs.len() > 1 || !child_files.is_empty()) {
            return Err(FsError::DirectoryNotEmpty {
                path: path.to_string(),
            });
        }

        for key in &child_files {
            self.files.remove(key);
        }
        for key in &child_dirs {
            self.dirs.remove(key);
        }
        Ok(())
    }

    fn move_file(&self, from: &AbsolutePath, to: &AbsolutePath, overwrite: bool) -> Result<()> {
        self.guard(from)?;
        self.guard(to)?;
        if !self.files.contains_key(&self.key(from)) {
            return Err(FsError::not_found(from));
        }
        if self.dirs.contains_key(&self.key(to)) {
            return Err(FsError::already_exists(to));
        }
        if !overwrite && self.files.contains_key(&self.key(to)) && self.key(from) != self.key(to) {
            return Err(FsError::already_exists(to));
        }
        if let Some(parent) = to.parent() {
            self.ensure_dirs(&parent)?;
        }

        let Some((_, source)) = self.files.remove(&self.key(from)) else {
            return Err(FsError::not_found(from));
        };
        // Content and metadata travel with the node; only the path
        // changes.
        self.files.insert(
            self.key(to),
            FileNode {
                path: to.clone(),
                buf: source.buf,
                created: source.created,
                modified: source.modified,
                read_only: source.read_only,
            },
        );
        Ok(())
    }

    fn set_read_only(&self, path: &AbsolutePath, read_only: bool) -> Result<()> {
        self.guard(path)?;
        let key = self.key(path);
        if let Some(mut node) = self.files.get_mut(&key) {
            node.read_only = read_only;
            return Ok(());
        }
        if let Some(mut node) = self.dirs.get_mut(&key) {
            node.read_only = read_only;
            return Ok(());
        }
        Err(FsError::not_found(path))
    }

    fn enumerate_files(
        &self,
        dir: &AbsolutePath,
        pattern: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<AbsolutePath>> {
        self.guard(dir)?;
        if !self.dirs.contains_key(&self.key(dir)) {
            return Err(FsError::not_found(dir));
        }
        let case_sensitive = self.convention.case_sensitive();
        let mut result: Vec<AbsolutePath> = self
            .files
            .iter()
            .map(|entry| entry.value().path.clone())
            .filter(|path| path.in_folder(dir))
            .filter(|path| recursive || path.parent().as_ref() == Some(dir))
            .filter(|path| match pattern {
                Some(pattern) => {
                    glob_match(pattern, path.file_name().unwrap_or(""), case_sensitive)
                }
                None => true,
            })
            .collect();
        result.sort();
        Ok(result)
    }

    fn enumerate_directories(
        &self,
        dir: &AbsolutePath,
        recursive: bool,
    ) -> Result<Vec<AbsolutePath>> {
        self.guard(dir)?;
        if !self.dirs.contains_key(&self.key(dir)) {
            return Err(FsError::not_found(dir));
        }
        let mut result: Vec<AbsolutePath> = self
            .dirs
            .iter()
            .map(|entry| entry.value().path.clone())
            .filter(|path| path.in_folder(dir) && path != dir)
            .filter(|path| recursive || path.parent().as_ref() == Some(dir))
            .collect();
        result.sort();
        Ok(result)
    }

    fn read_at(&self, path: &AbsolutePath, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.guard(path)?;
        let pinned = match self.files.get(&self.key(path)) {
            Some(node) => node.buf.clone(),
            None => return Err(FsError::not_found(path)),
        };
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(pinned.read_into(offset, buf))
    }

    async fn read_at_async(
        &self,
        path: &AbsolutePath,
        offset: u64,
        len: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>> {
        // Memory reads never suspend; only the entry point observes the
        // token.
        if cancel.is_cancelled() {
            return Err(FsError::Cancelled);
        }
        let mut buf = vec![0u8; len];
        let count = self.read_at(path, offset, &mut buf)?;
        buf.truncate(count);
        Ok(buf)
    }

    fn create_mapping(&self, path: &AbsolutePath, mode: MappingMode) -> Result<MappedHandle> {
        self.guard(path)?;
        if self.dirs.contains_key(&self.key(path)) {
            return Err(FsError::already_exists(path));
        }
        match mode {
            MappingMode::ReadOnly => match self.files.get(&self.key(path)) {
                Some(node) => Ok(MappedHandle::from_pinned(
                    node.buf.clone(),
                    false,
                    path.as_str(),
                )),
                None => Err(FsError::not_found(path)),
            },
            MappingMode::ReadWrite { size } => {
                if let Some(parent) = path.parent() {
                    self.ensure_dirs(&parent)?;
                }
                let mut entry = self
                    .files
                    .entry(self.key(path))
                    .or_insert_with(|| FileNode::new(path.clone(), &[]));
                let node = entry.value_mut();
                if node.read_only {
                    return Err(FsError::access_denied(path));
                }
                if size > 0 && node.buf.len() as u64 != size {
                    // Preallocate like the real backend's set_len:
                    // existing content is kept up to the new size.
                    let mut content = node.buf.to_vec();
                    content.resize(size as usize, 0);
                    node.buf = Arc::new(PinnedBuffer::from_vec(content));
                }
                node.modified = SystemTime::now();
                Ok(MappedHandle::from_pinned(
                    node.buf.clone(),
                    true,
                    path.as_str(),
                ))
            }
        }
    }
}
