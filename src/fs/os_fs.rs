//! The real backend: the contract mapped onto OS filesystem calls.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

use crate::error::{FsError, Result};
use crate::fs::{EntryKind, FileSystem, MappingMode, Metadata};
use crate::glob::glob_match;
use crate::mmap::MappedHandle;
use crate::path::{AbsolutePath, Convention, KnownPath};

/// How many times a failing delete is retried before giving up with
/// [`FsError::IoBusy`]. Antivirus scanners and indexers hold short-lived
/// locks on freshly written files, most visibly on Windows CI runners.
const DELETE_ATTEMPTS: u32 = 10;

fn retry_delay() -> Duration {
    if cfg!(windows) && std::env::var_os("CI").is_some() {
        Duration::from_millis(100)
    } else {
        Duration::from_millis(10)
    }
}

/// A [`FileSystem`] backend over the real OS filesystem.
///
/// Always follows the host's path convention; paths parsed under the
/// other convention are rejected before any OS call. The instance itself
/// is stateless, so sharing one `Arc<OsFS>` across threads is free.
pub struct OsFS {
    convention: Convention,
}

impl OsFS {
    pub fn new() -> Self {
        Self {
            convention: Convention::host(),
        }
    }

    fn guard(&self, path: &AbsolutePath) -> Result<()> {
        if path.convention() != self.convention {
            return Err(FsError::invalid_path(
                path.as_str(),
                "path belongs to a different OS convention",
            ));
        }
        Ok(())
    }

    fn to_abs(&self, os_path: &Path) -> Result<AbsolutePath> {
        AbsolutePath::from_unsanitized(&os_path.to_string_lossy(), self.convention)
    }

    /// Non-recursive one-level listing used by both enumerate methods.
    fn list_level(&self, dir: &AbsolutePath, kind: EntryKind) -> Result<Vec<AbsolutePath>> {
        let entries = std::fs::read_dir(dir.as_str()).map_err(|e| FsError::io(dir, e))?;
        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FsError::io(dir, e))?;
            let file_type = entry.file_type().map_err(|e| FsError::io(dir, e))?;
            let matches = match kind {
                EntryKind::File => file_type.is_file(),
                EntryKind::Directory => file_type.is_dir(),
            };
            if matches {
                result.push(dir.join(&entry.file_name().to_string_lossy())?);
            }
        }
        Ok(result)
    }

    fn enumerate(
        &self,
        dir: &AbsolutePath,
        kind: EntryKind,
        pattern: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<AbsolutePath>> {
        self.guard(dir)?;
        if !std::fs::metadata(dir.as_str())
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(FsError::not_found(dir));
        }
        let case_sensitive = self.convention.case_sensitive();
        let mut result = Vec::new();
        let mut pending = vec![dir.clone()];
        while let Some(current) = pending.pop() {
            for found in self.list_level(&current, kind)? {
                if pattern
                    .map(|p| glob_match(p, found.file_name().unwrap_or(""), case_sensitive))
                    .unwrap_or(true)
                {
                    result.push(found);
                }
            }
            if recursive {
                pending.extend(self.list_level(&current, EntryKind::Directory)?);
            }
        }
        result.sort();
        Ok(result)
    }

    /// The shared retry loop behind file and directory deletion.
    ///
    /// `remove` is the native delete primitive. A read-only attribute on
    /// the target is cleared once; transient failures (scanners and
    /// indexers holding short-lived locks) are retried with a delay, up
    /// to [`DELETE_ATTEMPTS`], then reported as [`FsError::IoBusy`].
    fn delete_retrying(
        &self,
        path: &AbsolutePath,
        mut remove: impl FnMut() -> io::Result<()>,
    ) -> Result<()> {
        let mut cleared_read_only = false;
        for attempt in 1..=DELETE_ATTEMPTS {
            match remove() {
                Ok(()) => return Ok(()),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                    ) =>
                {
                    return Err(FsError::not_found(path));
                }
                Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                    return Err(FsError::DirectoryNotEmpty {
                        path: path.to_string(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    if cleared_read_only {
                        return Err(FsError::access_denied(path));
                    }
                    // Clear a read-only attribute once, then retry.
                    let meta =
                        std::fs::metadata(path.as_str()).map_err(|e| FsError::io(path, e))?;
                    let mut perms = meta.permissions();
                    if !perms.readonly() {
                        return Err(FsError::access_denied(path));
                    }
                    log::debug!("clearing read-only before deleting {path}");
                    perms.set_readonly(false);
                    std::fs::set_permissions(path.as_str(), perms)
                        .map_err(|e| FsError::io(path, e))?;
                    cleared_read_only = true;
                }
                Err(e) if attempt < DELETE_ATTEMPTS => {
                    log::warn!("delete of {path} failed on attempt {attempt}: {e}");
                    std::thread::sleep(retry_delay());
                }
                Err(_) => break,
            }
        }
        Err(FsError::IoBusy {
            path: path.to_string(),
            attempts: DELETE_ATTEMPTS,
        })
    }
}

impl Default for OsFS {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for OsFS {
    fn convention(&self) -> Convention {
        self.convention
    }

    fn known_path(&self, known: KnownPath) -> Result<AbsolutePath> {
        let resolve_err = || FsError::not_found(format!("{known:?}"));
        let os_path = match known {
            KnownPath::EntryFolder => std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
                .ok_or_else(resolve_err)?,
            KnownPath::CurrentDirectory => {
                std::env::current_dir().map_err(|_| resolve_err())?
            }
            KnownPath::HomeFolder => dirs::home_dir().ok_or_else(resolve_err)?,
            KnownPath::TempFolder => std::env::temp_dir(),
            KnownPath::AppData => dirs::config_dir().ok_or_else(resolve_err)?,
            KnownPath::LocalAppData => dirs::data_local_dir().ok_or_else(resolve_err)?,
            KnownPath::MyGames => dirs::document_dir().ok_or_else(resolve_err)?.join("My Games"),
        };
        self.to_abs(&os_path)
    }

    fn metadata(&self, path: &AbsolutePath) -> Result<Metadata> {
        self.guard(path)?;
        let meta = std::fs::metadata(path.as_str()).map_err(|e| FsError::io(path, e))?;
        Ok(Metadata {
            kind: if meta.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            size: meta.len(),
            // Not every filesystem records a creation time.
            created: meta
                .created()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            read_only: meta.permissions().readonly(),
        })
    }

    fn read(&self, path: &AbsolutePath) -> Result<Vec<u8>> {
        self.guard(path)?;
        std::fs::read(path.as_str()).map_err(|e| FsError::io(path, e))
    }

    fn write(&self, path: &AbsolutePath, content: &[u8]) -> Result<()> {
        self.guard(path)?;
        // The rename below replaces a read-only destination on unix
        // without ever opening it; check the flag up front so both
        // backends refuse the write.
        if let Ok(meta) = std::fs::metadata(path.as_str()) {
            if meta.permissions().readonly() {
                return Err(FsError::access_denied(path));
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_str()).map_err(|e| FsError::io(&parent, e))?;
        }
        // Stage into a sibling and rename so a reader never observes a
        // half-written file.
        let staging = format!("{}.{}.tmp", path.as_str(), std::process::id());
        std::fs::write(&staging, content).map_err(|e| FsError::io(path, e))?;
        if let Err(e) = std::fs::rename(&staging, path.as_str()) {
            let _ = std::fs::remove_file(&staging);
            return Err(FsError::io(path, e));
        }
        Ok(())
    }

    fn create_file(&self, path: &AbsolutePath) -> Result<()> {
        self.write(path, &[])
    }

    fn create_directory(&self, path: &AbsolutePath) -> Result<()> {
        self.guard(path)?;
        std::fs::create_dir_all(path.as_str()).map_err(|e| FsError::io(path, e))
    }

    fn delete_file(&self, path: &AbsolutePath) -> Result<()> {
        self.guard(path)?;
        self.delete_retrying(path, || std::fs::remove_file(path.as_str()))
    }

    fn delete_directory(&self, path: &AbsolutePath, recursive: bool) -> Result<()> {
        self.guard(path)?;
        if path.is_root() {
            return Err(FsError::invalid_path(
                path.as_str(),
                "the root cannot be removed",
            ));
        }
        if recursive {
            // Children first: files go through delete_file so a stale
            // read-only attribute gets cleared, then directories deepest
            // first.
            for file in self.enumerate_files(path, None, true)? {
                self.delete_file(&file)?;
            }
            let mut dirs = self.enumerate_directories(path, true)?;
            dirs.sort_by_key(|d| std::cmp::Reverse(d.as_str().len()));
            for dir in dirs {
                self.delete_retrying(&dir, || std::fs::remove_dir(dir.as_str()))?;
            }
        }
        self.delete_retrying(path, || std::fs::remove_dir(path.as_str()))
    }

    fn move_file(&self, from: &AbsolutePath, to: &AbsolutePath, overwrite: bool) -> Result<()> {
        self.guard(from)?;
        self.guard(to)?;
        let source = std::fs::metadata(from.as_str()).map_err(|e| FsError::io(from, e))?;
        if !source.is_file() {
            return Err(FsError::not_found(from));
        }
        if let Ok(dest) = std::fs::metadata(to.as_str()) {
            if dest.is_dir() || !overwrite {
                return Err(FsError::already_exists(to));
            }
        }
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent.as_str()).map_err(|e| FsError::io(&parent, e))?;
        }
        match std::fs::rename(from.as_str(), to.as_str()) {
            Ok(()) => Ok(()),
            // Rename cannot cross mount points; fall back to copy+delete,
            // which keeps the permission bits but not the creation time.
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                std::fs::copy(from.as_str(), to.as_str()).map_err(|e| FsError::io(to, e))?;
                self.delete_file(from)
            }
            Err(e) => Err(FsError::io(from, e)),
        }
    }

    fn set_read_only(&self, path: &AbsolutePath, read_only: bool) -> Result<()> {
        self.guard(path)?;
        let meta = std::fs::metadata(path.as_str()).map_err(|e| FsError::io(path, e))?;
        let mut perms = meta.permissions();
        perms.set_readonly(read_only);
        std::fs::set_permissions(path.as_str(), perms).map_err(|e| FsError::io(path, e))
    }

    fn enumerate_files(
        &self,
        dir: &AbsolutePath,
        pattern: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<AbsolutePath>> {
        self.enumerate(dir, EntryKind::File, pattern, recursive)
    }

    fn enumerate_directories(
        &self,
        dir: &AbsolutePath,
        recursive: bool,
    ) -> Result<Vec<AbsolutePath>> {
        self.enumerate(dir, EntryKind::Directory, None, recursive)
    }

    fn read_at(&self, path: &AbsolutePath, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.guard(path)?;
        let mut file = std::fs::File::open(path.as_str()).map_err(|e| FsError::io(path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| FsError::io(path, e))?;
        let mut total = 0;
        while total < buf.len() {
            let count = file
                .read(&mut buf[total..])
                .map_err(|e| FsError::io(path, e))?;
            if count == 0 {
                break;
            }
            total += count;
        }
        Ok(total)
    }

    async fn read_at_async(
        &self,
        path: &AbsolutePath,
        offset: u64,
        len: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>> {
        self.guard(path)?;
        let read = async {
            let mut file = tokio::fs::File::open(path.as_str())
                .await
                .map_err(|e| FsError::io(path, e))?;
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| FsError::io(path, e))?;
            let mut buf = vec![0u8; len];
            let mut total = 0;
            while total < len {
                let count = file
                    .read(&mut buf[total..])
                    .await
                    .map_err(|e| FsError::io(path, e))?;
                if count == 0 {
                    break;
                }
                total += count;
            }
            buf.truncate(total);
            Ok(buf)
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(FsError::Cancelled),
            result = read => result,
        }
    }

    fn create_mapping(&self, path: &AbsolutePath, mode: MappingMode) -> Result<MappedHandle> {
        self.guard(path)?;
        match mode {
            MappingMode::ReadOnly => {
                let file =
                    std::fs::File::open(path.as_str()).map_err(|e| FsError::io(path, e))?;
                let len = file.metadata().map_err(|e| FsError::io(path, e))?.len();
                if len == 0 {
                    return Ok(MappedHandle::empty(path.as_str(), false));
                }
                let map =
                    unsafe { memmap2::Mmap::map(&file) }.map_err(|e| FsError::io(path, e))?;
                Ok(MappedHandle::from_mmap(map, path.as_str()))
            }
            MappingMode::ReadWrite { size } => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent.as_str())
                        .map_err(|e| FsError::io(&parent, e))?;
                }
                let file = std::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(path.as_str())
                    .map_err(|e| FsError::io(path, e))?;
                if size > 0 {
                    file.set_len(size).map_err(|e| FsError::io(path, e))?;
                }
                let len = file.metadata().map_err(|e| FsError::io(path, e))?.len();
                if len == 0 {
                    return Ok(MappedHandle::empty(path.as_str(), true));
                }
                let map = unsafe { memmap2::MmapMut::map_mut(&file) }
                    .map_err(|e| FsError::io(path, e))?;
                Ok(MappedHandle::from_mmap_mut(map, path.as_str()))
            }
        }
    }
}
