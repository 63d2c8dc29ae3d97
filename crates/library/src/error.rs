//! Library Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Storage and catalog failures stay in the tree as child
//! frames; the kinds here say what the caller should do about them.

use comicback_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};
use derive_more::{Display, Error};
use std::path::{Path, PathBuf};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies library failures.
///
/// ### Request Errors
/// - [`ErrorKind::NotFound`]
/// - [`ErrorKind::InvalidCommand`]
/// - [`ErrorKind::InvalidLibraryConfig`]
/// - [`ErrorKind::DisabledBackend`]
///
/// ### File Errors
/// - [`ErrorKind::Unreadable`] - the file is skipped, never catalogued.
///
/// ### Dependency Errors
/// - [`ErrorKind::BackendUnreachable`] - aborts the whole scan or request.
/// - [`ErrorKind::Catalog`]
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Thumbnail`]
/// - [`ErrorKind::Task`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Library, file record or page doesn't exist
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Not a usable comic archive
    #[display("unreadable archive: {}", _0.display())]
    Unreadable(#[error(not(source))] PathBuf),
    /// The library's storage transport is down
    #[display("storage backend unreachable")]
    BackendUnreachable,
    /// Library definition can't be turned into a backend
    #[display("invalid library configuration: {_0}")]
    InvalidLibraryConfig(#[error(not(source))] String),
    /// Library needs a backend this build was compiled without
    #[display("backend disabled in this build: {_0}")]
    DisabledBackend(#[error(not(source))] String),
    /// Reading session token that isn't `+`, `-` or an integer
    #[display("invalid command: {_0:?}")]
    InvalidCommand(#[error(not(source))] String),
    #[display("catalog operation failed")]
    Catalog,
    #[display("storage operation failed")]
    Storage,
    #[display("thumbnail generation failed")]
    Thumbnail,
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnreachable | Self::Storage | Self::Task)
    }

    /// Raise a storage error touching `path` into the matching library kind.
    #[track_caller]
    pub(crate) fn storage(err: StorageError, path: &Path) -> Error {
        let kind = match &*err {
            StorageErrorKind::Unreachable(_) => Self::BackendUnreachable,
            StorageErrorKind::Archive(_) => Self::Unreadable(path.to_path_buf()),
            StorageErrorKind::NotFound(_) => Self::NotFound(path.display().to_string()),
            _ => Self::Storage,
        };
        err.raise(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comicback_archive::error::ErrorKind as ArchiveErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(StorageErrorKind::Unreachable("nas".to_string()), "unreachable")]
    #[case(StorageErrorKind::Archive(ArchiveErrorKind::Unreadable("x".to_string())), "unreadable")]
    #[case(StorageErrorKind::NotFound(PathBuf::from("a.cbz")), "not found")]
    #[case(StorageErrorKind::BackendError("boom".to_string()), "storage")]
    fn test_storage_classification(#[case] source: StorageErrorKind, #[case] expected: &str) {
        let err = ErrorKind::storage(exn::Exn::from(source), Path::new("a.cbz"));
        let actual = match &*err {
            ErrorKind::BackendUnreachable => "unreachable",
            ErrorKind::Unreadable(path) if path == Path::new("a.cbz") => "unreadable",
            ErrorKind::NotFound(path) if path == "a.cbz" => "not found",
            ErrorKind::Storage => "storage",
            other => panic!("unexpected kind: {other:?}"),
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorKind::BackendUnreachable.is_retryable());
        assert!(!ErrorKind::NotFound("file 1".to_string()).is_retryable());
        assert!(!ErrorKind::InvalidCommand("?".to_string()).is_retryable());
    }
}
