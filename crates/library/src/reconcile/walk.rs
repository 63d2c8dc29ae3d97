use crate::error::{ErrorKind, Result};
use crate::reconcile::{Reconciler, Resolution, normalize_dir};
use exn::ResultExt;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::instrument;

/// Tally of what a scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub directories: u64,
    pub created: u64,
    pub relocated: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub failed: u64,
    pub thumbnails: u64,
    pub purged: u64,
}

impl ScanReport {
    pub(crate) fn count(&mut self, resolution: &Resolution) {
        match resolution {
            Resolution::Unchanged(_) => self.unchanged += 1,
            Resolution::Created(_) => self.created += 1,
            Resolution::Relocated { .. } => self.relocated += 1,
            Resolution::Skipped { .. } => self.skipped += 1,
        }
    }

    pub(crate) fn merge(&mut self, other: ScanReport) {
        self.directories += other.directories;
        self.created += other.created;
        self.relocated += other.relocated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.thumbnails += other.thumbnails;
        self.purged += other.purged;
    }

    /// Whether the scan changed any record.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.relocated == 0 && self.purged == 0
    }
}

impl Reconciler {
    /// Reconcile every directory under `path`, depth first, generating
    /// thumbnails along the way.
    ///
    /// Uses an explicit stack, never visits a directory twice, and stops
    /// descending past the configured depth. A subdirectory that can't be
    /// listed is logged and counted as failed; the starting directory failing
    /// (or the backend becoming unreachable anywhere) fails the scan.
    #[instrument(skip(self), fields(library = %self.ctx.library().name))]
    pub async fn scan_in_depth(&self, path: &str) -> Result<ScanReport> {
        let root = normalize_dir(path)?;
        let mut report = ScanReport::default();
        let mut visited = HashSet::new();
        let mut stack = vec![(root.clone(), 0usize)];
        while let Some((directory, depth)) = stack.pop() {
            if !visited.insert(directory.clone()) {
                continue;
            }
            let (content, partial) = match self.reconcile_dir(&directory, true).await {
                Ok(result) => result,
                Err(err) if directory == root || matches!(&*err, ErrorKind::BackendUnreachable) => return Err(err),
                Err(err) => {
                    tracing::error!(directory = %directory, error = ?err, "Failed to list directory");
                    report.failed += 1;
                    continue;
                },
            };
            report.merge(partial);
            if depth >= self.config.max_depth {
                if !content.directories.is_empty() {
                    tracing::warn!(directory = %directory, depth, "Maximum scan depth reached; not descending");
                }
                continue;
            }
            // Reversed so that subdirectories pop off the stack in path order.
            for entry in content.directories.into_iter().rev() {
                stack.push((entry.path, depth + 1));
            }
        }
        tracing::info!(?report, "Scan complete");
        Ok(report)
    }

    /// Remove every record whose file no longer exists, along with its
    /// thumbnail. Returns how many were removed.
    ///
    /// Existence is checked now, not taken from an earlier scan, so run this
    /// right after a full scan: records are only ever removed for files that
    /// are gone at purge time.
    #[instrument(skip(self), fields(library = %self.ctx.library().name))]
    pub async fn purge_deleted_files(&self) -> Result<u64> {
        let ctx = &self.ctx;
        let backend = ctx.backend();
        let records = ctx.catalog().list_files(ctx.library().id).await.or_raise(|| ErrorKind::Catalog)?;
        let mut purged = 0;
        for record in records {
            let path = Path::new(&record.full_path);
            match backend.is_file(path).await {
                Ok(true) => continue,
                Ok(false) => {},
                Err(err) => {
                    let err = ErrorKind::storage(err, path);
                    if matches!(&*err, ErrorKind::BackendUnreachable) {
                        return Err(err);
                    }
                    tracing::warn!(path = %record.full_path, error = ?err, "Couldn't check file; keeping record");
                    continue;
                },
            }
            if let Err(err) = backend.delete_thumbnail(record.id).await {
                tracing::warn!(id = record.id, error = ?err, "Failed to delete thumbnail");
            }
            if ctx.catalog().delete_file(record.id).await.or_raise(|| ErrorKind::Catalog)? {
                tracing::info!(id = record.id, path = %record.full_path, "Purged deleted file");
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// A full scan of `path`, then a purge if asked for.
    pub async fn scan(&self, path: &str, purge: bool) -> Result<ScanReport> {
        let mut report = self.scan_in_depth(path).await?;
        if purge {
            report.purged = self.purge_deleted_files().await?;
        }
        Ok(report)
    }
}
