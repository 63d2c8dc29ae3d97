//! Path validation and security utilities.
//!
//! Every path handed to a backend is relative to the library root. These
//! functions make sure it stays that way.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

fn normalize(path: &Path) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls (libsmbclient included).
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
            },
        }
    }
    Ok(components.into_iter().collect())
}

/// Validates a file path relative to the library root.
///
/// Resolves `.` and `..` without ever leaving the root, strips leading and
/// trailing slashes, and rejects NUL bytes. A path that normalizes to
/// nothing is not a file and is rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use comicback_storage::validate_path;
/// assert!(validate_path("Marvel/Saga 001.cbz").is_ok());
/// assert!(validate_path("a/../issue.cbr").is_ok()); // (never leaves library root)
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert!(validate_path("").is_err());
/// assert_eq!(
///     validate_path("wrong/../still-wrong/.././correct//./issue.cbz/").unwrap(),
///     Path::new("correct/issue.cbz")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let normalized = normalize(path)?;
    if normalized.as_os_str().is_empty() {
        exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
    }
    Ok(normalized)
}

/// Validates a directory path relative to the library root.
///
/// Same rules as [`validate`], except the empty path is allowed and denotes
/// the library root itself.
pub fn validate_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
    normalize(path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Marvel/Saga 001.cbz", "Marvel/Saga 001.cbz")]
    #[case("a//b//c.cbr", "a/b/c.cbr")]
    #[case("a/./b/./c.zip", "a/b/c.zip")]
    #[case("a/b/../c.cbz", "a/c.cbz")]
    #[case("/leading/slash.cbz", "leading/slash.cbz")]
    #[case("Trailing/", "Trailing")]
    fn test_valid_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("..")]
    #[case("a\0b")]
    #[case("")]
    #[case(".")]
    #[case("//")]
    fn test_invalid_paths(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_dir_allows_root() {
        assert_eq!(validate_dir("").unwrap(), PathBuf::new());
        assert_eq!(validate_dir("./").unwrap(), PathBuf::new());
        assert_eq!(validate_dir("Marvel/").unwrap(), Path::new("Marvel"));
        assert!(validate_dir("../outside").is_err());
    }
}
