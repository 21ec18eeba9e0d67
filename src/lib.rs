//! A cross-platform path model and filesystem abstraction for Rust.
//! Provides normalized path values, a substitutable filesystem
//! capability and memory-mapped file access. Ideal for tools that must
//! behave identically over real disks and in-memory test fixtures.
//!
//! ### Overview
//!
//! `path-kit` separates what a path *is* from what a filesystem *does*.
//! Paths are immutable values normalized at construction under an OS
//! [`Convention`]; all storage access goes through the [`FileSystem`]
//! trait, with [`OsFS`] for the real disk and [`MemFS`] for a fully
//! virtual tree.
//!
//! **Key ideas**:
//! - **Normalization**: One canonical separator and root form per
//!   convention; comparisons fold case exactly where the OS does.
//! - **Substitutability**: Code written against `Arc<dyn FileSystem>`
//!   runs unchanged over disk, memory or an [`OverlayFS`] redirection.
//! - **Testability**: `MemFS` mirrors the real backend's semantics,
//!   including memory mappings, without touching the host disk.
//! - **Zero-copy access**: [`MappedHandle`] and [`MappedChunk`] expose
//!   bounded views over mapped files for archive readers.

mod error;
mod fs;
mod glob;
mod mmap;
mod path;
mod provider;

pub use error::{FsError, Result};
pub use fs::{
    EntryKind, FileSystem, MappingMode, MemFS, Metadata, OsFS, OverlayFS, OverlayOptions,
};
pub use mmap::{MappedChunk, MappedHandle};
pub use path::{AbsolutePath, Convention, Extension, KnownPath, RelativePath};
pub use provider::{FileDataProvider, MappedFileProvider};
