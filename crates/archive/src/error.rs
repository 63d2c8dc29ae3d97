//! Archive Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No supported container format could open the data. Don't retry with
    /// the same input; skip the file.
    #[display("unreadable archive: {_0}")]
    Unreadable(#[error(not(source))] String),
    /// The requested format is not a known archive format.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The requested format is supported but not enabled in this build.
    #[display("disabled format: {_0}")]
    DisabledFormat(#[error(not(source))] String),
    /// The page index does not exist in the archive.
    #[display("page {index} out of range (archive has {len} pages)")]
    PageIndexOutOfRange { index: usize, len: usize },
    /// The member name is not present in the archive.
    #[display("archive member not found: {_0}")]
    MemberNotFound(#[error(not(source))] String),
    /// The member was enumerated but could not be decoded.
    #[display("corrupt archive member: {_0}")]
    CorruptMember(#[error(not(source))] String),
    /// An I/O operation on the underlying file failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Unreadable("a.cbz".to_string()).to_string(), "unreadable archive: a.cbz");
        assert_eq!(
            ErrorKind::PageIndexOutOfRange { index: 3, len: 3 }.to_string(),
            "page 3 out of range (archive has 3 pages)"
        );
        assert_eq!(ErrorKind::Io.to_string(), "I/O error");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::Unreadable(String::new()).is_retryable());
        assert!(!ErrorKind::CorruptMember("001.jpg".to_string()).is_retryable());
        assert!(ErrorKind::Io.is_retryable());
    }
}
