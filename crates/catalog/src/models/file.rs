use crate::error::{Error, ErrorKind, Result};
use crate::models::LibraryId;
use comicback_archive::ArchiveKind;
use exn::ResultExt;
use std::path::Path;
use time::UtcDateTime;

pub type FileId = i64;

/// Split a library-relative path into `(directory, name, extension)`.
///
/// `name` is the file stem and `extension` keeps its leading dot, so
/// `"Series/Issue 1.cbz"` becomes `("Series", "Issue 1", ".cbz")`. Files at
/// the library root have an empty directory.
pub fn split_path(full_path: &str) -> (String, String, String) {
    let path = Path::new(full_path);
    let directory = path.parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
    let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    (directory, name, extension)
}

/// A catalogued comic archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub library_id: LibraryId,
    /// Path relative to the library root; unique within the library.
    pub full_path: String,
    pub directory: String,
    pub name: String,
    pub extension: String,
    pub kind: ArchiveKind,
    /// Page member names in page order. Never empty.
    pub pages: Vec<String>,
    /// Always within `0..pages.len()`.
    pub current_page: usize,
    pub content_hash: String,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

impl FileRecord {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_on_last_page(&self) -> bool {
        self.current_page + 1 == self.pages.len()
    }
}

/// A file about to be catalogued for the first time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFile {
    pub library_id: LibraryId,
    pub full_path: String,
    pub kind: ArchiveKind,
    pub pages: Vec<String>,
    pub content_hash: String,
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    id: i64,
    library_id: i64,
    full_path: String,
    directory: String,
    name: String,
    extension: String,
    kind: String,
    page_count: i64,
    pages: String,
    current_page: i64,
    content_hash: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self> {
        let pages: Vec<String> = serde_json::from_str(&row.pages).or_raise(|| ErrorKind::InvalidData("pages"))?;
        if i64::try_from(pages.len()).ok() != Some(row.page_count) {
            exn::bail!(ErrorKind::InvalidData("page count"));
        }
        Ok(Self {
            id: row.id,
            library_id: row.library_id,
            full_path: row.full_path,
            directory: row.directory,
            name: row.name,
            extension: row.extension,
            kind: row.kind.parse::<ArchiveKind>().or_raise(|| ErrorKind::InvalidData("archive kind"))?,
            pages,
            current_page: usize::try_from(row.current_page).or_raise(|| ErrorKind::InvalidData("current page"))?,
            content_hash: row.content_hash,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("created at"))?,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("updated at"))?,
        })
    }
}

/// Bind values for inserting a file, in column order.
pub(crate) struct NewFileRow {
    pub(crate) library_id: i64,
    pub(crate) full_path: String,
    pub(crate) directory: String,
    pub(crate) name: String,
    pub(crate) extension: String,
    pub(crate) kind: &'static str,
    pub(crate) page_count: i64,
    pub(crate) pages: String,
    pub(crate) content_hash: String,
}

impl TryFrom<&NewFile> for NewFileRow {
    type Error = Error;
    fn try_from(file: &NewFile) -> Result<Self> {
        if file.pages.is_empty() {
            exn::bail!(ErrorKind::InvalidData("page count"));
        }
        let (directory, name, extension) = split_path(&file.full_path);
        Ok(Self {
            library_id: file.library_id,
            full_path: file.full_path.clone(),
            directory,
            name,
            extension,
            kind: file.kind.as_str(),
            page_count: i64::try_from(file.pages.len()).or_raise(|| ErrorKind::InvalidData("page count"))?,
            pages: serde_json::to_string(&file.pages).or_raise(|| ErrorKind::InvalidData("pages"))?,
            content_hash: file.content_hash.clone(),
        })
    }
}
