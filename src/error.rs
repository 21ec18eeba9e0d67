//! Error kinds shared by the path model and all file system backends.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

/// Errors produced by path parsing and file system operations.
///
/// Every variant carries the path (and where relevant the base path,
/// attempt count or io source) so callers can diagnose a failure without
/// inspecting backend state.
#[derive(Debug, Error)]
pub enum FsError {
    /// Malformed or unrooted path input.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Relative-path computation outside the given base.
    #[error("{path} is not a subpath of {base}")]
    NotASubpath { path: String, base: String },

    /// File or directory absent where required to exist.
    #[error("{path} does not exist")]
    NotFound { path: String },

    /// Creation collision without overwrite.
    #[error("{path} already exists")]
    AlreadyExists { path: String },

    /// Non-recursive delete blocked by directory contents.
    #[error("directory {path} is not empty")]
    DirectoryNotEmpty { path: String },

    /// Read-only or permission conflict.
    #[error("access denied: {path}")]
    AccessDenied { path: String },

    /// Locked-file deletion exhausted its retries.
    #[error("{path} is still locked after {attempts} delete attempts")]
    IoBusy { path: String, attempts: u32 },

    /// Asynchronous read aborted by its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Any other io failure, with the path it occurred at.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub(crate) fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        FsError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(path: impl ToString) -> Self {
        FsError::NotFound {
            path: path.to_string(),
        }
    }

    pub(crate) fn already_exists(path: impl ToString) -> Self {
        FsError::AlreadyExists {
            path: path.to_string(),
        }
    }

    pub(crate) fn access_denied(path: impl ToString) -> Self {
        FsError::AccessDenied {
            path: path.to_string(),
        }
    }

    /// Maps an [`io::Error`] onto the matchable kinds where one applies.
    pub(crate) fn io(path: impl ToString, source: io::Error) -> Self {
        let path = path.to_string();
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound { path },
            io::ErrorKind::PermissionDenied => FsError::AccessDenied { path },
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists { path },
            _ => FsError::Io { path, source },
        }
    }
}
