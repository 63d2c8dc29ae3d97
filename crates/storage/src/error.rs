//! Storage Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Archive failures from `comicback-archive` are carried
//! as a child frame so callers can still tell "corrupt file" apart from
//! "couldn't reach the share".

use comicback_archive::error::{Error as ArchiveError, ErrorKind as ArchiveErrorKind};
use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File or directory does not exist
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied (permissions or credentials)
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Transport could not connect (network share down, bad credentials)
    #[display("storage unreachable: {_0}")]
    Unreachable(#[error(not(source))] String),
    /// Path contains invalid characters or escapes root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
    /// The file was read but is not a usable archive
    #[display("archive error: {_0}")]
    Archive(ArchiveErrorKind),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Convert an archive error into a storage error, keeping the archive
    /// crate's `Exn` frame as a child in the error tree.
    #[track_caller]
    pub fn archive(err: ArchiveError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Archive(inner))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) | Self::Unreachable(_) | Self::BackendError(_) => true,
            Self::Archive(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}
