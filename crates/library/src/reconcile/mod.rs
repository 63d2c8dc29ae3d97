//! Keeping the catalog in step with storage.
//!
//! The [`Reconciler`] walks one library at a time. Every archive it meets is
//! resolved against the catalog by path first, then by content hash, so a
//! renamed or moved file keeps its record (and the reader's place in it)
//! instead of showing up as something new. Files that aren't usable comics
//! are logged and skipped; they never get a record.
//!
//! [`Reconciler::scan`] is the usual entry point: a full depth-first pass
//! over a subtree, optionally followed by [`purge_deleted_files`].
//!
//! [`purge_deleted_files`]: Reconciler::purge_deleted_files

mod directory;
mod resolve;
mod walk;

pub use self::directory::{DirContent, DirectoryEntry, EntryKind};
pub use self::resolve::Resolution;
pub use self::walk::ScanReport;
use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::thumbnail::Thumbnailer;
use comicback_archive::ArchiveKind;
use comicback_config::ScanConfig;
use comicback_storage::validate_dir;
use std::path::Path;
use std::sync::Arc;

/// Directory names never descended into, on top of anything starting with
/// a dot (which covers the thumbnail directory itself).
pub const BLACKLIST: [&str; 6] =
    ["@eaDir", "#recycle", "$RECYCLE.BIN", "System Volume Information", "lost+found", "__MACOSX"];

/// Whether a file name looks like a comic archive (`.cbz`, `.cbr`, `.zip`
/// or `.rar`, any case). Only used to pick which files to open.
pub fn is_archive_name(name: &str) -> bool {
    ArchiveKind::from_path(name).is_some()
}

/// Normalize a caller-supplied directory into the catalog's `a/b/c` form;
/// the library root is the empty string.
pub(crate) fn normalize_dir(path: &str) -> Result<String> {
    let normalized = validate_dir(path).map_err(|err| ErrorKind::storage(err, Path::new(path)))?;
    let parts: Vec<_> = normalized.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    Ok(parts.join("/"))
}

pub(crate) fn join(directory: &str, name: &str) -> String {
    match directory {
        "" => name.to_string(),
        dir => format!("{dir}/{name}"),
    }
}

/// Synchronizes one library's catalog records with its storage.
pub struct Reconciler {
    ctx: Context,
    config: ScanConfig,
    thumbnailer: Option<Arc<dyn Thumbnailer>>,
}

impl Reconciler {
    /// A reconciler that doesn't generate thumbnails until
    /// [`with_thumbnailer`](Self::with_thumbnailer) gives it the means to.
    pub fn new(ctx: Context, config: ScanConfig) -> Self {
        Self { ctx, config, thumbnailer: None }
    }

    pub fn with_thumbnailer(mut self, thumbnailer: Arc<dyn Thumbnailer>) -> Self {
        self.thumbnailer = Some(thumbnailer);
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn is_ignored(&self, name: &str) -> bool {
        name.starts_with('.')
            || BLACKLIST.contains(&name)
            || self.config.ignored_directories.iter().any(|ignored| ignored == name)
    }
}
