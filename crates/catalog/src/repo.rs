//! Repository for libraries and their file records.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    FileId, FileRecord, FileRow, Library, LibraryId, LibraryRow, NewFile, NewFileRow, NewLibrary, NewLibraryRow,
    split_path,
};
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;

/// Catalog queries.
///
/// Each method is a single statement, so there are no multi-step
/// transactions to get wrong; the reconciler serializes its own
/// lookup-then-write sequences.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn files(rows: Vec<FileRow>) -> Result<Vec<FileRecord>> {
        rows.into_iter().map(FileRecord::try_from).collect()
    }

    fn now() -> i64 {
        UtcDateTime::now().unix_timestamp()
    }

    // =========================================================================
    // Libraries
    // =========================================================================

    /// Store a new library.
    ///
    /// Returns [`InvalidLibraryConfig`](ErrorKind::InvalidLibraryConfig)
    /// without touching the database if the definition is unusable, and
    /// [`AlreadyExists`](ErrorKind::AlreadyExists) if the name is taken.
    pub async fn create_library(&self, library: &NewLibrary) -> Result<Library> {
        library.validate()?;
        let row = NewLibraryRow::from(library);
        let result = sqlx::query_as::<_, LibraryRow>(include_str!("../queries/insert_library.sql"))
            .bind(row.name)
            .bind(row.root)
            .bind(row.kind)
            .bind(row.hidden)
            .bind(row.server)
            .bind(row.share)
            .bind(row.username)
            .bind(row.password)
            .fetch_one(&self.pool)
            .await;
        let row = match result {
            Ok(row) => row,
            Err(err) if err.as_database_error().is_some_and(|db| db.is_unique_violation()) => {
                return Err(err).or_raise(|| ErrorKind::AlreadyExists(library.name.clone()));
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Database),
        };
        let library = Library::try_from(row)?;
        tracing::info!(library = %library.name, kind = %library.kind, "Created library");
        Ok(library)
    }

    pub async fn get_library_by_name(&self, name: impl AsRef<str>) -> Result<Option<Library>> {
        let row: Option<LibraryRow> = sqlx::query_as(include_str!("../queries/get_library_by_name.sql"))
            .bind(name.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Library::try_from).transpose()
    }

    /// All libraries, ordered by name.
    pub async fn list_libraries(&self) -> Result<Vec<Library>> {
        let rows: Vec<LibraryRow> = sqlx::query_as(include_str!("../queries/list_libraries.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Library::try_from).collect()
    }

    /// Change a library's root and hidden flag. Kind and credentials are
    /// fixed for the life of a library.
    pub async fn update_library(&self, id: LibraryId, root: &str, hidden: bool) -> Result<Option<Library>> {
        if root.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidLibraryConfig("root must not be empty".to_string()));
        }
        let row: Option<LibraryRow> = sqlx::query_as(include_str!("../queries/update_library.sql"))
            .bind(root)
            .bind(hidden)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Library::try_from).transpose()
    }

    /// Delete a library and (by cascade) all of its file records.
    ///
    /// Returns `false` if there was no such library.
    pub async fn delete_library(&self, id: LibraryId) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_library.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Files: lookups
    // =========================================================================

    pub async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Exact path lookup; the fast path for an unchanged tree.
    pub async fn get_file_by_path(&self, library_id: LibraryId, full_path: &str) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file_by_path.sql"))
            .bind(library_id)
            .bind(full_path)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Every record in the library with this content hash, oldest first.
    ///
    /// More than one record can share a hash when identical copies of a file
    /// live at different paths.
    pub async fn get_files_by_hash(&self, library_id: LibraryId, content_hash: &str) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/get_files_by_hash.sql"))
            .bind(library_id)
            .bind(content_hash)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::files(rows)
    }

    /// The record whose path sorts first among the direct children of
    /// `directory`, else among all of its descendants.
    ///
    /// Used to pick a cover for a folder tile. The empty directory is the
    /// library root.
    pub async fn first_file_under(&self, library_id: LibraryId, directory: &str) -> Result<Option<FileRecord>> {
        let direct: Option<FileRow> = sqlx::query_as(include_str!("../queries/first_file_in_directory.sql"))
            .bind(library_id)
            .bind(directory)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if let Some(row) = direct {
            return FileRecord::try_from(row).map(Some);
        }
        let prefix = match directory {
            "" => String::new(),
            dir => format!("{dir}/"),
        };
        let nested: Option<FileRow> = sqlx::query_as(include_str!("../queries/first_file_with_prefix.sql"))
            .bind(library_id)
            .bind(&prefix)
            .bind(&prefix)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        nested.map(FileRecord::try_from).transpose()
    }

    /// Every record in the library, ordered by path.
    pub async fn list_files(&self, library_id: LibraryId) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_files.sql"))
            .bind(library_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::files(rows)
    }

    pub async fn count_files(&self, library_id: LibraryId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_files.sql"))
            .bind(library_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("file count"))
    }

    // =========================================================================
    // Files: writes
    // =========================================================================

    /// Catalogue a newly discovered file at page 0.
    ///
    /// Idempotent on `(library, full_path)`: if a record for the path already
    /// exists (say, a concurrent scan got there first), that record is
    /// returned untouched instead of inserting a duplicate.
    pub async fn insert_file(&self, file: &NewFile) -> Result<FileRecord> {
        let row = NewFileRow::try_from(file)?;
        let now = Self::now();
        sqlx::query(include_str!("../queries/insert_file.sql"))
            .bind(row.library_id)
            .bind(&row.full_path)
            .bind(row.directory)
            .bind(row.name)
            .bind(row.extension)
            .bind(row.kind)
            .bind(row.page_count)
            .bind(row.pages)
            .bind(row.content_hash)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let record = self.get_file_by_path(row.library_id, &row.full_path).await?;
        record.ok_or_else(|| exn::Exn::from(ErrorKind::Database))
    }

    /// Point an existing record at a new path.
    ///
    /// Only the path-derived fields change; id, page list, current page,
    /// content hash and both timestamps are preserved. Returns `None` if the
    /// record no longer exists.
    pub async fn relocate_file(&self, id: FileId, new_full_path: &str) -> Result<Option<FileRecord>> {
        let (directory, name, extension) = split_path(new_full_path);
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/relocate_file.sql"))
            .bind(new_full_path)
            .bind(directory)
            .bind(name)
            .bind(extension)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Persist a new current page.
    ///
    /// The write only happens if `page` is below the record's page count
    /// (checked in the same statement). Returns the updated record, `None`
    /// if either the record doesn't exist or the page is out of range.
    pub async fn set_current_page(&self, id: FileId, page: usize) -> Result<Option<FileRecord>> {
        let page = i64::try_from(page).or_raise(|| ErrorKind::InvalidData("page"))?;
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/set_current_page.sql"))
            .bind(page)
            .bind(Self::now())
            .bind(id)
            .bind(page)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Returns `false` if there was no such record.
    pub async fn delete_file(&self, id: FileId) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_file.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
