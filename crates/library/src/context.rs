use crate::backend::open_backend;
use crate::error::{ErrorKind, Result};
use comicback_archive::content_type;
use comicback_catalog::{FileId, FileRecord, Library, Repository};
use comicback_storage::BackendHandle;
use exn::ResultExt;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

/// Raw page bytes ready to hand to a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl Debug for Page {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Page")
            .field("bytes", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// One library together with its storage backend and the catalog.
///
/// Cloning is cheap, and clones share the library's write lock: every
/// reconciler built from the same context (or a clone of it) serializes its
/// catalog writes, so two overlapping scans can't both insert the same file.
#[derive(Clone)]
pub struct Context {
    library: Library,
    backend: BackendHandle,
    catalog: Repository,
    writes: Arc<Mutex<()>>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Context")
            .field("library", &self.library.name)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(library: Library, backend: BackendHandle, catalog: Repository) -> Self {
        Self { library, backend, catalog, writes: Arc::new(Mutex::new(())) }
    }

    /// Select the library's backend and build a context around it.
    pub fn open(library: Library, catalog: Repository) -> Result<Self> {
        let backend = open_backend(&library)?;
        Ok(Self::new(library, backend, catalog))
    }

    /// Look a library up by name and open it.
    pub async fn open_by_name(catalog: Repository, name: &str) -> Result<Self> {
        let library = catalog
            .get_library_by_name(name)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("library `{name}`"))))?;
        Self::open(library, catalog)
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub fn catalog(&self) -> &Repository {
        &self.catalog
    }

    pub(crate) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    /// Fetch a file record belonging to this library.
    ///
    /// A record that exists but belongs to another library is reported as
    /// not found.
    pub async fn file(&self, file_id: FileId) -> Result<FileRecord> {
        let record = self.catalog.get_file(file_id).await.or_raise(|| ErrorKind::Catalog)?;
        match record {
            Some(record) if record.library_id == self.library.id => Ok(record),
            _ => exn::bail!(ErrorKind::NotFound(format!("file {file_id} in library `{}`", self.library.name))),
        }
    }

    /// Read one page of a file.
    ///
    /// The content type comes from the first page's extension. An index past
    /// the last page is [`NotFound`](ErrorKind::NotFound).
    pub async fn fetch_page(&self, file_id: FileId, index: usize) -> Result<Page> {
        let record = self.file(file_id).await?;
        self.page_of(&record, index).await
    }

    pub(crate) async fn page_of(&self, record: &FileRecord, index: usize) -> Result<Page> {
        let Some(member) = record.pages.get(index) else {
            exn::bail!(ErrorKind::NotFound(format!(
                "page {index} of file {} ({} pages)",
                record.id,
                record.page_count()
            )));
        };
        let path = Path::new(&record.full_path);
        let bytes = self.backend.read_member(path, member).await.map_err(|err| ErrorKind::storage(err, path))?;
        let content_type = record.pages.first().and_then(|first| content_type(first)).unwrap_or(FALLBACK_CONTENT_TYPE);
        Ok(Page { bytes, content_type })
    }

    /// The stored cover thumbnail of a file, as JPEG.
    pub async fn fetch_cover(&self, file_id: FileId) -> Result<Page> {
        let record = self.file(file_id).await?;
        let bytes = match self.backend.get_thumbnail(record.id).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let path = comicback_storage::thumbnail_path(record.id);
                return Err(ErrorKind::storage(err, &path));
            },
        };
        Ok(Page { bytes, content_type: THUMBNAIL_CONTENT_TYPE })
    }
}
