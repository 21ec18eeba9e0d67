//! Memory-mapped file handles and clamped chunk views.
//!
//! Both backends expose the same zero-copy contract through
//! [`MappedHandle`]: the real backend wraps a `memmap2` mapping, the
//! in-memory backend pins a file's byte buffer and exposes its address.
//! A zero-length mapping is represented by a null sentinel pointer so an
//! invalid access faults instead of silently succeeding.
//!
//! Handles are shared by ownership: every [`MappedChunk`] holds a
//! reference to its handle, and the backing mapping lives as long as the
//! longest-lived holder. Dropping a chunk never unmaps a handle other
//! chunks still use.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::Arc;

use crate::error::{FsError, Result};

/// A byte buffer with a stable address for the lifetime of its
/// allocation. Backs in-memory mappings: the owning file node and any
/// number of handles share it through an `Arc`, and writes through a
/// writable mapping mutate it in place.
///
/// Concurrent writes to overlapping regions are the caller's problem to
/// serialize, same as for a real mapping.
pub(crate) struct PinnedBuffer {
    data: UnsafeCell<Box<[u8]>>,
    len: usize,
}

unsafe impl Send for PinnedBuffer {}
unsafe impl Sync for PinnedBuffer {}

impl PinnedBuffer {
    pub(crate) fn from_vec(content: Vec<u8>) -> Self {
        let len = content.len();
        Self {
            data: UnsafeCell::new(content.into_boxed_slice()),
            len,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn ptr(&self) -> *mut u8 {
        if self.len == 0 {
            return ptr::null_mut();
        }
        unsafe { (*self.data.get()).as_mut_ptr() }
    }

    /// Snapshot of the current contents.
    pub(crate) fn to_vec(&self) -> Vec<u8> {
        unsafe { (*self.data.get()).to_vec() }
    }

    /// Copies bytes starting at `offset` into `out`, returning the count
    /// copied. Reading at or past the end copies nothing.
    pub(crate) fn read_into(&self, offset: usize, out: &mut [u8]) -> usize {
        if offset >= self.len {
            return 0;
        }
        let count = (self.len - offset).min(out.len());
        let data = unsafe { &(&*self.data.get())[offset..offset + count] };
        out[..count].copy_from_slice(data);
        count
    }
}

enum Backing {
    /// Null-sentinel stand-in for a zero-length file; never mapped.
    Empty,
    Memory(Arc<PinnedBuffer>),
    MapRead(#[allow(dead_code)] memmap2::Mmap),
    MapWrite(memmap2::MmapMut),
}

struct HandleInner {
    backing: Backing,
    ptr: *mut u8,
    len: usize,
    writable: bool,
    path: String,
}

unsafe impl Send for HandleInner {}
unsafe impl Sync for HandleInner {}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if let Backing::MapWrite(map) = &self.backing {
            if let Err(e) = map.flush() {
                log::warn!("flush of mapping for {} failed: {e}", self.path);
            }
        }
    }
}

/// An opaque memory-mapping capability: a raw pointer, a length and an
/// owned disposer, cheaply cloneable. The underlying mapping is released
/// when the last clone and the last [`MappedChunk`] over it are dropped.
#[derive(Clone)]
pub struct MappedHandle {
    inner: Arc<HandleInner>,
}

impl MappedHandle {
    pub(crate) fn empty(path: &str, writable: bool) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                backing: Backing::Empty,
                ptr: ptr::null_mut(),
                len: 0,
                writable,
                path: path.to_owned(),
            }),
        }
    }

    pub(crate) fn from_pinned(buf: Arc<PinnedBuffer>, writable: bool, path: &str) -> Self {
        if buf.len() == 0 {
            return Self::empty(path, writable);
        }
        let (ptr, len) = (buf.ptr(), buf.len());
        Self {
            inner: Arc::new(HandleInner {
                backing: Backing::Memory(buf),
                ptr,
                len,
                writable,
                path: path.to_owned(),
            }),
        }
    }

    pub(crate) fn from_mmap(map: memmap2::Mmap, path: &str) -> Self {
        let (ptr, len) = (map.as_ptr() as *mut u8, map.len());
        Self {
            inner: Arc::new(HandleInner {
                backing: Backing::MapRead(map),
                ptr,
                len,
                writable: false,
                path: path.to_owned(),
            }),
        }
    }

    pub(crate) fn from_mmap_mut(mut map: memmap2::MmapMut, path: &str) -> Self {
        let (ptr, len) = (map.as_mut_ptr(), map.len());
        Self {
            inner: Arc::new(HandleInner {
                backing: Backing::MapWrite(map),
                ptr,
                len,
                writable: true,
                path: path.to_owned(),
            }),
        }
    }

    /// Length of the mapped data in bytes; zero for the empty sentinel.
    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    pub fn is_writable(&self) -> bool {
        self.inner.writable
    }

    /// The mapped base address. Null for a zero-length handle, so a raw
    /// access through it faults instead of reading someone else's bytes.
    pub fn as_ptr(&self) -> *mut u8 {
        self.inner.ptr
    }

    /// Path of the file this handle was created for.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// A read-only view over `[start, start + len)`, clamped to the
    /// mapped data length.
    pub fn chunk(&self, start: u64, len: u64) -> MappedChunk {
        MappedChunk::clamped(self.clone(), start, len, false)
    }

    /// A read-write view over `[start, start + len)`, clamped to the
    /// mapped data length.
    pub fn chunk_mut(&self, start: u64, len: u64) -> Result<MappedChunk> {
        if !self.inner.writable {
            return Err(FsError::access_denied(&self.inner.path));
        }
        Ok(MappedChunk::clamped(self.clone(), start, len, true))
    }
}

/// A clamped, disposable view over a region of a [`MappedHandle`].
///
/// The view never extends past the handle's actual data: if `start` is at
/// or past the end the chunk is empty, otherwise its length is
/// `min(len, handle_len - start)`. Callers detect truncation through
/// [`data_len`](Self::data_len) rather than assuming the requested length
/// was honored; archive metadata routinely asks for more bytes than
/// physically remain in the final chunk of a file.
pub struct MappedChunk {
    handle: MappedHandle,
    offset: usize,
    len: usize,
    writable: bool,
}

impl MappedChunk {
    fn clamped(handle: MappedHandle, start: u64, len: u64, writable: bool) -> Self {
        let total = handle.len();
        let offset = usize::try_from(start).unwrap_or(usize::MAX).min(total);
        let len = (total - offset).min(usize::try_from(len).unwrap_or(usize::MAX));
        Self {
            handle,
            offset,
            len,
            writable,
        }
    }

    /// The number of bytes actually available through this view.
    pub fn data_len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of this view within its handle.
    pub fn start(&self) -> usize {
        self.offset
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.handle.as_ptr().add(self.offset), self.len) }
    }

    /// Mutable access to the viewed bytes.
    ///
    /// Fails with [`FsError::AccessDenied`] on a read-only chunk. Writes
    /// go straight to the mapped region; overlapping concurrent writes
    /// must be serialized by the caller.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        if !self.writable {
            return Err(FsError::access_denied(self.handle.path()));
        }
        if self.len == 0 {
            return Ok(&mut []);
        }
        Ok(unsafe {
            std::slice::from_raw_parts_mut(self.handle.as_ptr().add(self.offset), self.len)
        })
    }

    /// Copies `data` into the view, returning the number of bytes that
    /// fit.
    pub fn copy_from(&mut self, data: &[u8]) -> Result<usize> {
        let target = self.as_mut_slice()?;
        let count = target.len().min(data.len());
        target[..count].copy_from_slice(&data[..count]);
        Ok(count)
    }
}
