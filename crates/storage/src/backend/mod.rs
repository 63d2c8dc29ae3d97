//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface over the places a comic library can live (local filesystem,
//! SMB network shares). The reconciler and reading sessions only ever hold a
//! [`BackendHandle`](crate::BackendHandle) and never branch on the kind of
//! backend behind it.

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "smb")]
mod smb;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "smb")]
pub use self::smb::{ShareCredentials, SmbBackend};
use crate::error::{ErrorKind, Result};
use crate::models::Listing;
use async_trait::async_trait;
use comicback_archive::{Archive, Source};
use std::path::{Path, PathBuf};

/// Directory (relative to the library root) holding generated thumbnails.
pub const THUMBNAIL_DIR: &str = ".comic-back/thumbnails";

/// Storage key of the thumbnail for a file record.
///
/// This layout is shared with existing libraries on disk and must not change.
pub fn thumbnail_path(file_id: i64) -> PathBuf {
    Path::new(THUMBNAIL_DIR).join(format!("{file_id}.jpg"))
}

/// Run blocking work (archive parsing, hashing, SMB calls) off the async
/// executor.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(err) => exn::bail!(ErrorKind::BackendError(format!("blocking task failed: {err}"))),
    }
}

/// Open an archive from a [`Source`] on the blocking pool.
pub(crate) async fn open_archive_blocking(source: Source) -> Result<Archive> {
    blocking(move || Archive::open(source).map_err(ErrorKind::archive)).await
}

/// Unified interface for storage backends.
///
/// All operations are asynchronous so that network transports don't block
/// the executor; implementations push blocking work onto
/// [`spawn_blocking`](tokio::task::spawn_blocking).
///
/// # Path Handling
/// All paths are relative to the library root and are validated with
/// [`validate_path`](crate::validate_path) (files) or
/// [`validate_dir`](crate::validate_dir) (directories, where the empty path
/// is the root). Implementations enforce this validation.
///
/// # Archives
/// [`open_archive()`](Self::open_archive) has a default implementation that
/// reads the whole container into memory; backends with direct file access
/// should override it to open the archive in place.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use comicback_storage::{backend::StorageBackend, error::Result};
///
/// async fn cover_of(backend: &dyn StorageBackend, path: &Path) -> Result<Option<Vec<u8>>> {
///     let archive = backend.open_archive(path).await?;
///     match archive.pages().first() {
///         Some(first) => Ok(Some(backend.read_member(path, first).await?)),
///         None => Ok(None),
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, for logging only.
    fn name(&self) -> &str;

    /// List the immediate children of a directory.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the directory does not
    /// exist and [`Unreachable`](ErrorKind::Unreachable) if the transport
    /// cannot connect. An empty directory is an empty [`Listing`].
    async fn list_dir(&self, path: &Path) -> Result<Listing>;

    /// Whether `path` exists and is a regular file.
    ///
    /// A missing file is `Ok(false)`, never an error; a transport failure is
    /// an error, never `Ok(false)`.
    async fn is_file(&self, path: &Path) -> Result<bool>;

    /// Whether anything (file or directory) exists at `path`.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the file does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or overwrite a file, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the file does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Open the archive container at `path` and enumerate its pages.
    ///
    /// Format detection is by probing the content, never by extension.
    /// Returns [`Archive`](ErrorKind::Archive) if the file is not a readable
    /// archive.
    async fn open_archive(&self, path: &Path) -> Result<Archive> {
        let bytes = self.read(path).await?;
        open_archive_blocking(Source::from(bytes)).await
    }

    /// Extract one member of the archive at `path`.
    async fn read_member(&self, path: &Path, member: &str) -> Result<Vec<u8>> {
        let archive = self.open_archive(path).await?;
        let member = member.to_string();
        blocking(move || archive.member(&member).map_err(ErrorKind::archive)).await
    }

    /// Extract the page at `index` of the archive at `path`.
    ///
    /// An out-of-range index surfaces as
    /// [`Archive(PageIndexOutOfRange)`](comicback_archive::error::ErrorKind::PageIndexOutOfRange).
    async fn read_page(&self, path: &Path, index: usize) -> Result<Vec<u8>> {
        let archive = self.open_archive(path).await?;
        blocking(move || archive.page(index).map_err(ErrorKind::archive)).await
    }

    /// BLAKE3 hex digest of the full file contents.
    ///
    /// Content-based (never size/mtime based) so that renamed or moved files
    /// with identical bytes produce identical digests.
    async fn content_hash(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path).await?;
        blocking(move || Ok(blake3::hash(&bytes).to_string())).await
    }

    async fn thumbnail_exists(&self, file_id: i64) -> Result<bool> {
        self.is_file(&thumbnail_path(file_id)).await
    }

    /// Store a thumbnail, replacing any previous one (last writer wins).
    async fn save_thumbnail(&self, file_id: i64, data: &[u8]) -> Result<()> {
        self.write(&thumbnail_path(file_id), data).await
    }

    /// Returns [`NotFound`](ErrorKind::NotFound) if no thumbnail was ever
    /// generated for this file.
    async fn get_thumbnail(&self, file_id: i64) -> Result<Vec<u8>> {
        self.read(&thumbnail_path(file_id)).await
    }

    /// Delete a thumbnail; deleting one that doesn't exist is not an error.
    async fn delete_thumbnail(&self, file_id: i64) -> Result<()> {
        match self.delete(&thumbnail_path(file_id)).await {
            Err(err) if matches!(&*err, ErrorKind::NotFound(_)) => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    pub(crate) fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_path_layout() {
        assert_eq!(thumbnail_path(42), Path::new(".comic-back/thumbnails/42.jpg"));
        assert!(crate::validate_path(thumbnail_path(7)).is_ok());
    }

    #[tokio::test]
    async fn test_blocking_propagates_errors() {
        let err = blocking(|| -> Result<()> { exn::bail!(ErrorKind::BackendError("boom".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
    }
}
