//! Local filesystem storage backend.
//!
//! Files are accessed under a configured root directory using `tokio::fs`.
//! Archives are opened in place from disk instead of being buffered.

use crate::backend::{blocking, open_archive_blocking};
use crate::error::{ErrorKind, Result};
use crate::path::{validate as validate_path, validate_dir};
use crate::{Listing, StorageBackend};
use async_trait::async_trait;
use comicback_archive::{Archive, Source};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use comicback_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("comics", "/srv/comics")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    /// Root directory of the library
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if `root` is relative
    /// or not a directory, and [`NotFound`](ErrorKind::NotFound) if it
    /// doesn't exist. Unlike an output directory, a library root is never
    /// created on demand.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        let metadata = std::fs::metadata(&root).map_err(|e| Self::map_io_error(e, &root))?;
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { name: name.into(), root })
    }

    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn absolute_dir(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_dir(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Classify one directory entry. Symlinks to files count as files;
    /// symlinked directories are never followed so a link cycle can't trap a
    /// recursive scan.
    async fn classify(entry: &DirEntry) -> Result<Option<bool>> {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| Self::map_io_error(e, &path))?;
        if file_type.is_dir() {
            return Ok(Some(true));
        }
        if file_type.is_file() {
            return Ok(Some(false));
        }
        if file_type.is_symlink()
            && let Ok(target) = fs::metadata(&path).await
            && target.is_file()
        {
            return Ok(Some(false));
        }
        Ok(None)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_dir(&self, path: &Path) -> Result<Listing> {
        let abs_path = self.absolute_dir(path)?;
        let mut entries = fs::read_dir(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        let mut listing = Listing::default();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, path))? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(backend = %self.name, path = %entry.path().display(), "Skipping non UTF-8 name");
                continue;
            };
            match Self::classify(&entry).await? {
                Some(true) => listing.directories.push(name),
                Some(false) => listing.files.push(name),
                None => tracing::trace!(backend = %self.name, name = %name, "Skipping special file"),
            }
        }
        Ok(listing.sorted())
    }

    async fn is_file(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        match fs::metadata(&abs_path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Self::map_io_error(err, path).into()),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_dir(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn open_archive(&self, path: &Path) -> Result<Archive> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        open_archive_blocking(Source::from(abs_path)).await
    }

    async fn content_hash(&self, path: &Path) -> Result<String> {
        let abs_path = self.absolute_path(path)?;
        let relative = path.to_path_buf();
        blocking(move || {
            let file = std::fs::File::open(&abs_path).map_err(|e| Self::map_io_error(e, &relative))?;
            let mut hasher = blake3::Hasher::new();
            hasher.update_reader(file).or_raise(|| ErrorKind::BackendError(format!("hashing {}", relative.display())))?;
            Ok(hasher.finalize().to_string())
        })
        .await
    }
}
