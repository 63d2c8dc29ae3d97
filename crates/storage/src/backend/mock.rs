//! In-memory storage backend for testing.

use crate::error::{ErrorKind, Result};
use crate::path::{validate as validate_path, validate_dir};
use crate::{Listing, StorageBackend};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Files live in a map behind a [`RwLock`]; directories exist implicitly
/// whenever some file path passes through them. The transport can be "taken
/// down" with [`set_unreachable`](Self::set_unreachable) to exercise
/// failure paths.
///
/// # Examples
///
/// ```
/// use comicback_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("Series/001.cbz", b"...")]);
/// assert!(backend.is_file(Path::new("Series/001.cbz")).await?);
/// assert_eq!(backend.list_dir(Path::new("")).await?.directories, vec!["Series"]);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
    unreachable: AtomicBool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation; broken test setup should never
    /// pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Simulate the transport going down (or coming back up).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Move a file, as a user would outside the application.
    pub async fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut guard = self.storage.write().await;
        let data = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, data);
        Ok(())
    }

    /// Snapshot of every stored path.
    pub async fn paths(&self) -> Vec<PathBuf> {
        self.storage.read().await.keys().cloned().collect()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Unreachable(format!("mock backend `{}` is down", self.name)));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_dir(&self, path: &Path) -> Result<Listing> {
        self.check_reachable()?;
        let dir = validate_dir(path)?;
        let guard = self.storage.read().await;
        if guard.contains_key(&dir) {
            exn::bail!(ErrorKind::NotFound(dir));
        }
        let mut directories = BTreeSet::new();
        let mut listing = Listing::default();
        let mut found = dir.as_os_str().is_empty();
        for key in guard.keys() {
            let Ok(relative) = key.strip_prefix(&dir) else {
                continue;
            };
            found = true;
            let mut components = relative.components();
            let (Some(Component::Normal(first)), rest) = (components.next(), components.as_path()) else {
                continue;
            };
            let name = first.to_string_lossy().into_owned();
            match rest.as_os_str().is_empty() {
                true => listing.files.push(name),
                false => {
                    directories.insert(name);
                },
            }
        }
        if !found {
            exn::bail!(ErrorKind::NotFound(dir));
        }
        listing.directories = directories.into_iter().collect();
        Ok(listing.sorted())
    }

    async fn is_file(&self, path: &Path) -> Result<bool> {
        self.check_reachable()?;
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.check_reachable()?;
        let path = validate_dir(path)?;
        Ok(self.storage.read().await.keys().any(|key| key.starts_with(&path)))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.check_reachable()?;
        let path = validate_path(path)?;
        self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.check_reachable()?;
        let path = validate_path(path)?;
        self.storage.write().await.insert(path, data.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.check_reachable()?;
        let path = validate_path(path)?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::zip_bytes;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write(Path::new("test.cbz"), b"hello").await.unwrap();
        assert_eq!(backend.read(Path::new("test.cbz")).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_list_dir_derives_directories() {
        let backend = MockBackend::with_files([
            ("a.cbz", b"a".as_slice()),
            ("Series/001.cbz", b"1"),
            ("Series/Arc/002.cbz", b"2"),
            ("Other/x.cbr", b"x"),
        ]);
        let root = backend.list_dir(Path::new("")).await.unwrap();
        assert_eq!(root.directories, vec!["Other", "Series"]);
        assert_eq!(root.files, vec!["a.cbz"]);
        let series = backend.list_dir(Path::new("Series")).await.unwrap();
        assert_eq!(series.directories, vec!["Arc"]);
        assert_eq!(series.files, vec!["001.cbz"]);
    }

    #[tokio::test]
    async fn test_list_missing_dir() {
        let backend = MockBackend::with_files([("Series/001.cbz", b"1")]);
        let err = backend.list_dir(Path::new("Seri")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = backend.list_dir(Path::new("Series/001.cbz")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(MockBackend::default().list_dir(Path::new("")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename() {
        let backend = MockBackend::with_files([("a.cbz", b"a")]);
        backend.rename("a.cbz", "moved/b.cbz").await.unwrap();
        assert!(!backend.is_file(Path::new("a.cbz")).await.unwrap());
        assert!(backend.is_file(Path::new("moved/b.cbz")).await.unwrap());
        assert_eq!(backend.paths().await, vec![PathBuf::from("moved/b.cbz")]);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let backend = MockBackend::with_files([("a.cbz", b"a")]);
        backend.set_unreachable(true);
        let err = backend.list_dir(Path::new("")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unreachable(_)));
        assert!(backend.is_file(Path::new("a.cbz")).await.is_err());
        backend.set_unreachable(false);
        assert!(backend.is_file(Path::new("a.cbz")).await.unwrap());
    }

    #[tokio::test]
    async fn test_default_archive_methods_buffer_bytes() {
        let backend = MockBackend::with_files([("issue.cbz", zip_bytes(&[("b.jpg", b"B"), ("a.jpg", b"A")]))]);
        let archive = backend.open_archive(Path::new("issue.cbz")).await.unwrap();
        assert_eq!(archive.pages(), ["a.jpg", "b.jpg"]);
        assert_eq!(backend.read_page(Path::new("issue.cbz"), 0).await.unwrap(), b"A");
        assert_eq!(backend.read_member(Path::new("issue.cbz"), "b.jpg").await.unwrap(), b"B");
    }
}
