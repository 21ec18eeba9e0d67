//! The data-access seam for archive and asset readers.
//!
//! Readers of large container files never need a whole file in memory;
//! they ask a [`FileDataProvider`] for bounded sections on demand and
//! write extraction output through whole-file sections. Decoupling them
//! from [`FileSystem`] keeps parsers testable against in-memory data.

use std::sync::Arc;

use crate::error::Result;
use crate::fs::{FileSystem, MappingMode};
use crate::mmap::{MappedChunk, MappedHandle};
use crate::path::AbsolutePath;

/// Random-access reads over one source file plus whole-file output
/// sections for extraction targets.
pub trait FileDataProvider: Send + Sync {
    /// A read-only view of `[start, start + len)` of the source file,
    /// clamped to the data actually present; callers check
    /// [`data_len`](MappedChunk::data_len) for truncation.
    fn section(&self, start: u64, len: u64) -> Result<MappedChunk>;

    /// Total length of the source file in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates (or truncates) `dest` at exactly `size` bytes and returns
    /// a writable view over the whole file. With `size == 0` the file is
    /// created empty and no section is returned, since a zero-length
    /// region cannot be mapped.
    fn output_section(&self, dest: &AbsolutePath, size: u64) -> Result<Option<MappedChunk>>;
}

/// [`FileDataProvider`] over a [`FileSystem`] and a source path.
///
/// The source file is mapped once at construction; every section shares
/// that handle. Output sections each own a fresh writable handle, so an
/// extraction target is flushed when its last chunk is dropped.
pub struct MappedFileProvider {
    fs: Arc<dyn FileSystem>,
    source: MappedHandle,
}

impl MappedFileProvider {
    pub fn open(fs: Arc<dyn FileSystem>, source: &AbsolutePath) -> Result<Self> {
        let source = fs.create_mapping(source, MappingMode::ReadOnly)?;
        Ok(Self { fs, source })
    }

    /// Path of the mapped source file.
    pub fn path(&self) -> &str {
        self.source.path()
    }
}

impl FileDataProvider for MappedFileProvider {
    fn section(&self, start: u64, len: u64) -> Result<MappedChunk> {
        Ok(self.source.chunk(start, len))
    }

    fn len(&self) -> u64 {
        self.source.len() as u64
    }

    fn output_section(&self, dest: &AbsolutePath, size: u64) -> Result<Option<MappedChunk>> {
        if size == 0 {
            self.fs.create_file(dest)?;
            return Ok(None);
        }
        let handle = self
            .fs
            .create_mapping(dest, MappingMode::ReadWrite { size })?;
        Ok(Some(handle.chunk_mut(0, size)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFS;
    use crate::path::Convention;

    fn setup_provider(content: &[u8]) -> (Arc<MemFS>, MappedFileProvider, AbsolutePath) {
        let fs = Arc::new(MemFS::with_convention(Convention::Posix));
        let source = AbsolutePath::from_unsanitized("/data/archive.bsa", Convention::Posix).unwrap();
        fs.write(&source, content).unwrap();
        let provider = MappedFileProvider::open(fs.clone(), &source).unwrap();
        (fs, provider, source)
    }

    #[test]
    fn test_sections_share_one_mapping() {
        let (_fs, provider, _source) = setup_provider(&[10, 20, 30, 40, 50]);
        assert_eq!(provider.len(), 5);
        assert_eq!(provider.section(0, 2).unwrap().as_slice(), &[10, 20]);
        assert_eq!(provider.section(3, 100).unwrap().as_slice(), &[40, 50]);
    }

    #[test]
    fn test_section_past_end_is_empty() {
        let (_fs, provider, _source) = setup_provider(&[1, 2, 3]);
        assert!(provider.section(3, 4).unwrap().is_empty());
    }

    #[test]
    fn test_output_section_writes_the_destination() {
        let (fs, provider, _source) = setup_provider(&[1, 2, 3, 4]);
        let dest = AbsolutePath::from_unsanitized("/out/extracted.bin", Convention::Posix).unwrap();

        let mut out = provider.output_section(&dest, 4).unwrap().unwrap();
        let section = provider.section(0, 4).unwrap();
        out.copy_from(section.as_slice()).unwrap();
        drop(out);

        assert_eq!(fs.read(&dest).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_size_output_creates_an_empty_file() {
        let (fs, provider, _source) = setup_provider(&[1]);
        let dest = AbsolutePath::from_unsanitized("/out/empty.bin", Convention::Posix).unwrap();

        assert!(provider.output_section(&dest, 0).unwrap().is_none());
        assert!(fs.is_file(&dest));
        assert_eq!(fs.metadata(&dest).unwrap().size, 0);
    }

    #[test]
    fn test_missing_source_fails_to_open() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemFS::with_convention(Convention::Posix));
        let source = AbsolutePath::from_unsanitized("/nope.bsa", Convention::Posix).unwrap();
        assert!(MappedFileProvider::open(fs, &source).is_err());
    }
}
