use crate::error::{ErrorKind, Result};
use crate::reconcile::walk::ScanReport;
use crate::reconcile::{Reconciler, Resolution, is_archive_name, join, normalize_dir};
use comicback_catalog::{FileId, FileRecord};
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    /// Relative to the library root.
    pub path: String,
    pub kind: EntryKind,
    /// File record whose cover stands in for this entry, if any.
    pub thumbnail: Option<FileId>,
}

impl From<&FileRecord> for DirectoryEntry {
    fn from(record: &FileRecord) -> Self {
        Self {
            name: format!("{}{}", record.name, record.extension),
            path: record.full_path.clone(),
            kind: EntryKind::File,
            thumbnail: Some(record.id),
        }
    }
}

/// A reconciled directory: its visible subdirectories and its catalogued
/// comics, both ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirContent {
    pub directories: Vec<DirectoryEntry>,
    pub files: Vec<FileRecord>,
}

impl DirContent {
    /// Directories first, then files.
    pub fn entries(&self) -> Vec<DirectoryEntry> {
        self.directories.iter().cloned().chain(self.files.iter().map(DirectoryEntry::from)).collect()
    }
}

impl Reconciler {
    /// List a directory, reconciling every archive directly inside it.
    ///
    /// Unusable files are left out of the result; a failure on a single file
    /// is logged and doesn't stop the rest. Only an unreachable backend (or
    /// a catalog failure) fails the whole listing.
    pub async fn get_dir_content(&self, path: &str, generate_thumbnails: bool) -> Result<DirContent> {
        let directory = normalize_dir(path)?;
        let (content, _) = self.reconcile_dir(&directory, generate_thumbnails).await?;
        Ok(content)
    }

    pub(crate) async fn reconcile_dir(
        &self,
        directory: &str,
        generate_thumbnails: bool,
    ) -> Result<(DirContent, ScanReport)> {
        let ctx = &self.ctx;
        let listing = ctx
            .backend()
            .list_dir(Path::new(directory))
            .await
            .map_err(|err| ErrorKind::storage(err, Path::new(directory)))?;
        let mut report = ScanReport { directories: 1, ..ScanReport::default() };

        let mut directories = Vec::new();
        for name in listing.directories {
            if self.is_ignored(&name) {
                tracing::trace!(directory, name = %name, "Ignoring directory");
                continue;
            }
            let path = join(directory, &name);
            let thumbnail = ctx
                .catalog()
                .first_file_under(ctx.library().id, &path)
                .await
                .or_raise(|| ErrorKind::Catalog)?
                .map(|record| record.id);
            directories.push(DirectoryEntry { name, path, kind: EntryKind::Directory, thumbnail });
        }

        let mut pending = listing
            .files
            .iter()
            .filter(|name| is_archive_name(name))
            .map(|name| {
                let full_path = join(directory, name);
                async move {
                    let resolution = self.resolve_file(&full_path).await;
                    (full_path, resolution)
                }
            });
        let mut files = Vec::new();
        let mut in_flight = FuturesUnordered::new();
        in_flight.extend(pending.by_ref().take(self.config.concurrency.max(1)));
        while let Some((full_path, resolution)) = in_flight.next().await {
            match resolution {
                Ok(resolution) => {
                    report.count(&resolution);
                    if let Some(record) = resolution.into_record() {
                        files.push(record);
                    }
                },
                Err(err) if matches!(&*err, ErrorKind::BackendUnreachable | ErrorKind::Catalog) => return Err(err),
                Err(err) => {
                    tracing::error!(path = %full_path, error = ?err, "Failed to reconcile file");
                    report.failed += 1;
                },
            }
            // Promote the next file in listing order.
            if let Some(next) = pending.next() {
                in_flight.push(next);
            }
        }
        files.sort_by(|a, b| a.full_path.cmp(&b.full_path));

        if generate_thumbnails && let Some(thumbnailer) = &self.thumbnailer {
            for record in &files {
                match self.ensure_thumbnail(thumbnailer, record).await {
                    Ok(true) => report.thumbnails += 1,
                    Ok(false) => {},
                    Err(err) if matches!(&*err, ErrorKind::BackendUnreachable) => return Err(err),
                    Err(err) => {
                        let path = &record.full_path;
                        tracing::warn!(id = record.id, path = %path, error = ?err, "Thumbnail generation failed");
                    },
                }
            }
        }

        tracing::debug!(directory, files = files.len(), subdirectories = directories.len(), "Reconciled directory");
        Ok((DirContent { directories, files }, report))
    }

    /// Generate and store a record's thumbnail unless one exists already.
    /// Returns whether a thumbnail was written.
    async fn ensure_thumbnail(
        &self,
        thumbnailer: &Arc<dyn crate::thumbnail::Thumbnailer>,
        record: &FileRecord,
    ) -> Result<bool> {
        let backend = self.ctx.backend();
        let path = Path::new(&record.full_path);
        let exists = backend.thumbnail_exists(record.id).await.map_err(|err| ErrorKind::storage(err, path))?;
        if exists {
            return Ok(false);
        }
        let cover = backend.read_page(path, 0).await.map_err(|err| ErrorKind::storage(err, path))?;
        let thumbnailer = Arc::clone(thumbnailer);
        let jpeg = tokio::task::spawn_blocking(move || thumbnailer.thumbnail(&cover))
            .await
            .or_raise(|| ErrorKind::Task)??;
        backend.save_thumbnail(record.id, &jpeg).await.map_err(|err| ErrorKind::storage(err, path))?;
        tracing::debug!(id = record.id, path = %record.full_path, "Generated thumbnail");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{comic, context_with, zip_bytes};
    use crate::thumbnail::ImageThumbnailer;
    use comicback_config::ScanConfig;
    use comicback_storage::StorageBackend;
    use rstest::rstest;

    #[tokio::test]
    async fn test_lists_and_filters() {
        let (ctx, _) = context_with([
            ("b.cbz", comic(1, 2)),
            ("a.cbr", comic(2, 1)),
            ("cover.jpg", b"not a comic".to_vec()),
            ("empty.cbz", zip_bytes(&[("info.txt", b"x")])),
            ("Series/001.cbz", comic(1, 3)),
            ("@eaDir/a.cbz", comic(1, 4)),
            (".hidden/a.cbz", comic(1, 5)),
            ("Scans/raw.cbz", comic(1, 6)),
        ])
        .await;
        let config = ScanConfig { ignored_directories: vec!["Scans".to_string()], ..Default::default() };
        let reconciler = Reconciler::new(ctx, config);
        let content = reconciler.get_dir_content("", false).await.unwrap();
        let names: Vec<_> = content.files.iter().map(|f| f.full_path.as_str()).collect();
        assert_eq!(names, vec!["a.cbr", "b.cbz"]);
        assert_eq!(content.directories.len(), 1);
        assert_eq!(content.directories[0].path, "Series");
        // Nothing catalogued under Series yet.
        assert_eq!(content.directories[0].thumbnail, None);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(16)]
    #[tokio::test]
    async fn test_resolves_every_file_whatever_the_concurrency(#[case] concurrency: usize) {
        let files: Vec<_> = (0..7u8).map(|i| (format!("{i:02}.cbz"), comic(1, i))).collect();
        let (ctx, _) = context_with(files).await;
        let reconciler = Reconciler::new(ctx, ScanConfig { concurrency, ..Default::default() });
        let (content, report) = reconciler.reconcile_dir("", false).await.unwrap();
        assert_eq!(report.created, 7);
        assert_eq!(report.failed, 0);
        let names: Vec<_> = content.files.iter().map(|f| f.full_path.as_str()).collect();
        assert_eq!(names, ["00.cbz", "01.cbz", "02.cbz", "03.cbz", "04.cbz", "05.cbz", "06.cbz"]);
    }

    #[tokio::test]
    async fn test_directory_thumbnail_prefers_direct_children() {
        let (ctx, _) = context_with([
            ("Series/Arc/001.cbz", comic(1, 1)),
            ("Series/z.cbz", comic(1, 2)),
        ])
        .await;
        let reconciler = Reconciler::new(ctx, Default::default());
        reconciler.get_dir_content("Series/Arc", false).await.unwrap();
        let root = reconciler.get_dir_content("", false).await.unwrap();
        let nested = root.directories[0].thumbnail.unwrap();
        let series = reconciler.get_dir_content("Series", false).await.unwrap();
        let direct = series.files[0].id;
        assert_ne!(nested, direct);
        let root = reconciler.get_dir_content("", false).await.unwrap();
        assert_eq!(root.directories[0].thumbnail, Some(direct));
    }

    #[tokio::test]
    async fn test_generates_missing_thumbnails() {
        let (ctx, backend) = context_with([("a.cbz", comic(2, 1)), ("b.cbz", comic(1, 2))]).await;
        let reconciler =
            Reconciler::new(ctx, Default::default()).with_thumbnailer(Arc::new(ImageThumbnailer::default()));
        let content = reconciler.get_dir_content("", true).await.unwrap();
        for record in &content.files {
            let jpeg = backend.get_thumbnail(record.id).await.unwrap();
            assert_eq!(image::guess_format(&jpeg).unwrap(), image::ImageFormat::Jpeg);
        }
        let (_, report) = reconciler.reconcile_dir("", true).await.unwrap();
        assert_eq!(report.thumbnails, 0);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let (ctx, _) = context_with([("a.cbz", comic(1, 1))]).await;
        let reconciler = Reconciler::new(ctx, Default::default());
        let err = reconciler.get_dir_content("nope", false).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unreachable_listing() {
        let (ctx, backend) = context_with([("a.cbz", comic(1, 1))]).await;
        backend.set_unreachable(true);
        let reconciler = Reconciler::new(ctx, Default::default());
        let err = reconciler.get_dir_content("", false).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendUnreachable));
    }

    #[test]
    fn test_entries_order() {
        let content = DirContent {
            directories: vec![DirectoryEntry {
                name: "Series".to_string(),
                path: "Series".to_string(),
                kind: EntryKind::Directory,
                thumbnail: None,
            }],
            files: vec![],
        };
        assert_eq!(content.entries()[0].kind, EntryKind::Directory);
        assert_eq!(serde_json::to_value(&content.entries()[0]).unwrap()["kind"], "directory");
    }
}
