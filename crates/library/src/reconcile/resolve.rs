use crate::error::{ErrorKind, Result};
use crate::reconcile::Reconciler;
use comicback_catalog::{FileRecord, NewFile};
use comicback_storage::error::ErrorKind as StorageErrorKind;
use exn::ResultExt;
use std::path::Path;

/// What resolving a single file did to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A record already existed at this path and was left alone.
    Unchanged(FileRecord),
    /// First sighting of this content; a record was created at page 0.
    Created(FileRecord),
    /// Content already known at a path that no longer exists: the existing
    /// record was pointed here, keeping its id and reading position.
    Relocated { record: FileRecord, from: String },
    /// Not a usable comic (unreadable, no image pages, or gone mid-scan).
    /// Nothing was written.
    Skipped { path: String, reason: String },
}

impl Resolution {
    pub fn record(&self) -> Option<&FileRecord> {
        match self {
            Self::Unchanged(record) | Self::Created(record) | Self::Relocated { record, .. } => Some(record),
            Self::Skipped { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<FileRecord> {
        match self {
            Self::Unchanged(record) | Self::Created(record) | Self::Relocated { record, .. } => Some(record),
            Self::Skipped { .. } => None,
        }
    }
}

impl Reconciler {
    /// Resolve the archive at `full_path` (relative to the library root)
    /// against the catalog.
    ///
    /// 1. A record at the same path wins and is returned untouched.
    /// 2. Otherwise the file is opened and hashed; unreadable files and
    ///    archives without image pages are skipped.
    /// 3. A record with the same hash whose own path has disappeared is the
    ///    same file moved here, and gets relocated.
    /// 4. Anything else (including a copy of a file still present at its
    ///    old path) gets a new record.
    ///
    /// Steps 3 and 4 run under the library's write lock and re-check the path
    /// first, so concurrent resolves of the same content can't duplicate it.
    pub async fn resolve_file(&self, full_path: &str) -> Result<Resolution> {
        let ctx = &self.ctx;
        let library_id = ctx.library().id;
        let catalog = ctx.catalog();
        if let Some(record) = catalog.get_file_by_path(library_id, full_path).await.or_raise(|| ErrorKind::Catalog)? {
            tracing::trace!(path = full_path, id = record.id, "Known path");
            return Ok(Resolution::Unchanged(record));
        }

        let path = Path::new(full_path);
        let backend = ctx.backend();
        let archive = match backend.open_archive(path).await {
            Ok(archive) => archive,
            Err(err) => return skip_or_raise(err, full_path),
        };
        let kind = archive.kind();
        let pages = archive.into_pages();
        if pages.is_empty() {
            tracing::warn!(path = full_path, "Archive contains no image pages; skipping");
            return Ok(Resolution::Skipped { path: full_path.to_string(), reason: "no image pages".to_string() });
        }
        let content_hash = match backend.content_hash(path).await {
            Ok(hash) => hash,
            Err(err) => return skip_or_raise(err, full_path),
        };

        let _guard = ctx.lock_writes().await;
        if let Some(record) = catalog.get_file_by_path(library_id, full_path).await.or_raise(|| ErrorKind::Catalog)? {
            return Ok(Resolution::Unchanged(record));
        }
        let matches = catalog.get_files_by_hash(library_id, &content_hash).await.or_raise(|| ErrorKind::Catalog)?;
        for candidate in matches {
            let still_there = backend
                .is_file(Path::new(&candidate.full_path))
                .await
                .map_err(|err| ErrorKind::storage(err, Path::new(&candidate.full_path)))?;
            if still_there {
                tracing::debug!(path = full_path, copy_of = %candidate.full_path, "Same content at an existing path");
                continue;
            }
            let relocated =
                catalog.relocate_file(candidate.id, full_path).await.or_raise(|| ErrorKind::Catalog)?;
            if let Some(record) = relocated {
                tracing::info!(id = record.id, from = %candidate.full_path, to = full_path, "Relocated moved file");
                return Ok(Resolution::Relocated { record, from: candidate.full_path });
            }
        }

        let new = NewFile { library_id, full_path: full_path.to_string(), kind, pages, content_hash };
        let record = catalog.insert_file(&new).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::info!(id = record.id, path = full_path, pages = record.page_count(), "Catalogued new file");
        Ok(Resolution::Created(record))
    }
}

/// Unusable files become a skip; transport and other failures propagate.
fn skip_or_raise(err: comicback_storage::error::Error, full_path: &str) -> Result<Resolution> {
    let reason = match &*err {
        StorageErrorKind::Archive(inner) => inner.to_string(),
        StorageErrorKind::NotFound(_) => "disappeared during scan".to_string(),
        _ => return Err(ErrorKind::storage(err, Path::new(full_path))),
    };
    tracing::warn!(path = full_path, reason = %reason, "Skipping unusable file");
    Ok(Resolution::Skipped { path: full_path.to_string(), reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{comic, context_with, zip_bytes};
    use comicback_storage::StorageBackend;

    #[tokio::test]
    async fn test_new_file_starts_at_first_page() {
        let (ctx, _) = context_with([("a.cbz", comic(3, 1))]).await;
        let reconciler = Reconciler::new(ctx, Default::default());
        let Resolution::Created(record) = reconciler.resolve_file("a.cbz").await.unwrap() else {
            panic!("expected a new record");
        };
        assert_eq!(record.page_count(), 3);
        assert_eq!(record.current_page, 0);
        assert_eq!(record.pages, vec!["01.png", "02.png", "03.png"]);
        assert_eq!((record.directory.as_str(), record.name.as_str(), record.extension.as_str()), ("", "a", ".cbz"));
    }

    #[tokio::test]
    async fn test_known_path_is_untouched() {
        let (ctx, _) = context_with([("a.cbz", comic(2, 1))]).await;
        let reconciler = Reconciler::new(ctx, Default::default());
        let created = reconciler.resolve_file("a.cbz").await.unwrap().into_record().unwrap();
        let again = reconciler.resolve_file("a.cbz").await.unwrap();
        assert_eq!(again, Resolution::Unchanged(created));
    }

    #[tokio::test]
    async fn test_move_keeps_identity() {
        let (ctx, backend) = context_with([("a.cbz", comic(3, 1))]).await;
        let reconciler = Reconciler::new(ctx.clone(), Default::default());
        let created = reconciler.resolve_file("a.cbz").await.unwrap().into_record().unwrap();
        ctx.catalog().set_current_page(created.id, 2).await.unwrap();
        backend.rename("a.cbz", "Series/b.cbr").await.unwrap();

        let Resolution::Relocated { record, from } = reconciler.resolve_file("Series/b.cbr").await.unwrap() else {
            panic!("expected a relocation");
        };
        assert_eq!(from, "a.cbz");
        assert_eq!(record.id, created.id);
        assert_eq!(record.current_page, 2);
        assert_eq!(record.content_hash, created.content_hash);
        assert_eq!(record.created_at, created.created_at);
        let split = (record.directory.as_str(), record.name.as_str(), record.extension.as_str());
        assert_eq!(split, ("Series", "b", ".cbr"));
        assert_eq!(ctx.catalog().count_files(ctx.library().id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_copy_gets_its_own_record() {
        let bytes = comic(2, 1);
        let (ctx, _) = context_with([("a.cbz", bytes.clone()), ("copy.cbz", bytes)]).await;
        let reconciler = Reconciler::new(ctx.clone(), Default::default());
        let original = reconciler.resolve_file("a.cbz").await.unwrap().into_record().unwrap();
        let Resolution::Created(copy) = reconciler.resolve_file("copy.cbz").await.unwrap() else {
            panic!("expected a second record");
        };
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.content_hash, original.content_hash);
    }

    #[tokio::test]
    async fn test_zero_pages_are_skipped() {
        let (ctx, _) = context_with([("notes.cbz", zip_bytes(&[("readme.txt", b"hi")]))]).await;
        let reconciler = Reconciler::new(ctx.clone(), Default::default());
        let resolution = reconciler.resolve_file("notes.cbz").await.unwrap();
        assert!(matches!(resolution, Resolution::Skipped { .. }));
        assert_eq!(ctx.catalog().count_files(ctx.library().id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_garbage_is_skipped() {
        let (ctx, _) = context_with([("broken.cbr", b"this is not an archive".to_vec())]).await;
        let reconciler = Reconciler::new(ctx.clone(), Default::default());
        let resolution = reconciler.resolve_file("broken.cbr").await.unwrap();
        assert!(matches!(resolution, Resolution::Skipped { .. }));
        assert_eq!(ctx.catalog().count_files(ctx.library().id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_backend_propagates() {
        let (ctx, backend) = context_with([("a.cbz", comic(1, 1))]).await;
        backend.set_unreachable(true);
        let reconciler = Reconciler::new(ctx, Default::default());
        let err = reconciler.resolve_file("a.cbz").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendUnreachable));
    }

    #[tokio::test]
    async fn test_concurrent_resolves_insert_once() {
        let (ctx, backend) = context_with([("a.cbz", comic(2, 1))]).await;
        let first = Reconciler::new(ctx.clone(), Default::default());
        let second = Reconciler::new(ctx.clone(), Default::default());
        let (a, b) = tokio::join!(first.resolve_file("a.cbz"), second.resolve_file("a.cbz"));
        let (a, b) = (a.unwrap().into_record().unwrap(), b.unwrap().into_record().unwrap());
        assert_eq!(a.id, b.id);
        assert_eq!(ctx.catalog().count_files(ctx.library().id).await.unwrap(), 1);
        assert!(backend.is_file(Path::new("a.cbz")).await.unwrap());
    }
}
