use crate::error::{ErrorKind, Result};
use crate::source::Source;
use crate::{ArchiveKind, cbz, page_names};
use exn::OptionExt;
#[cfg(feature = "rar")]
use std::path::Path;
#[cfg(feature = "rar")]
use tempfile::TempPath;
use tracing::instrument;

/// An opened comic archive and its page list.
///
/// Opening only reads the container's directory; page data is extracted on
/// demand. The archive keeps its [`Source`] so each extraction re-opens the
/// container, which keeps [`Archive`] `Send + 'static` and cheap to move
/// into blocking tasks.
#[derive(Debug)]
pub struct Archive {
    kind: ArchiveKind,
    source: Source,
    pages: Vec<String>,
    /// Temporary on-disk copy of in-memory rar data; removed on drop.
    #[cfg(feature = "rar")]
    spill: Option<TempPath>,
}

impl ArchiveKind {
    /// Attempt to open `source` as this container format.
    ///
    /// Succeeds only if the container's directory can be read. An archive
    /// with zero image members is still a successful open; it simply has an
    /// empty page list.
    pub fn try_open(self, source: Source) -> Result<Archive> {
        match self {
            ArchiveKind::Zip => {
                let members = cbz::list_members(&source)?;
                Ok(Archive::new(self, source, members))
            },
            #[cfg(feature = "rar")]
            ArchiveKind::Rar => {
                if !crate::cbr::has_signature(&source)? {
                    exn::bail!(ErrorKind::Unreadable(format!("missing rar signature: {}", source.describe())));
                }
                let (path, spill) = match source {
                    Source::Path(path) => (path, None),
                    Source::Bytes(bytes) => {
                        let spilled = crate::cbr::spill(&bytes)?;
                        (spilled.to_path_buf(), Some(spilled))
                    },
                };
                let members = crate::cbr::list_members(&path)?;
                let mut archive = Archive::new(self, Source::Path(path), members);
                archive.spill = spill;
                Ok(archive)
            },
            #[cfg(not(feature = "rar"))]
            ArchiveKind::Rar => exn::bail!(ErrorKind::DisabledFormat(self.to_string())),
        }
    }
}

impl Archive {
    fn new(kind: ArchiveKind, source: Source, members: Vec<String>) -> Self {
        Self {
            kind,
            source,
            pages: page_names(members),
            #[cfg(feature = "rar")]
            spill: None,
        }
    }

    /// Open an archive by probing each supported format in
    /// [`PROBE_ORDER`](ArchiveKind::PROBE_ORDER); the first format that can
    /// read the container wins.
    ///
    /// Returns [`Unreadable`](ErrorKind::Unreadable) if no format accepts the
    /// data, or [`Io`](ErrorKind::Io) if the source itself can't be read.
    #[instrument(skip_all, fields(source = %source.describe()))]
    pub fn open(source: Source) -> Result<Self> {
        for kind in ArchiveKind::PROBE_ORDER {
            match kind.try_open(source.clone()) {
                Ok(archive) => {
                    tracing::debug!(kind = %kind, pages = archive.page_count(), "Opened archive");
                    return Ok(archive);
                },
                Err(err) if *err == ErrorKind::Io => return Err(err),
                Err(err) => tracing::trace!(kind = %kind, error = ?err, "Archive probe failed"),
            }
        }
        exn::bail!(ErrorKind::Unreadable(source.describe()))
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Page member names in page order.
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<String> {
        self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Extract the page at `index` (zero-based).
    ///
    /// Returns [`PageIndexOutOfRange`](ErrorKind::PageIndexOutOfRange) for an
    /// index outside `0..page_count()`, and
    /// [`CorruptMember`](ErrorKind::CorruptMember) if an enumerated page
    /// can't be extracted.
    pub fn page(&self, index: usize) -> Result<Vec<u8>> {
        let name = self
            .pages
            .get(index)
            .ok_or_raise(|| ErrorKind::PageIndexOutOfRange { index, len: self.pages.len() })?;
        match self.member(name) {
            Err(err) if matches!(&*err, ErrorKind::MemberNotFound(_) | ErrorKind::Unreadable(_)) => {
                Err(err.raise(ErrorKind::CorruptMember(name.clone())))
            },
            other => other,
        }
    }

    /// Extract any member by name, image or not.
    pub fn member(&self, name: &str) -> Result<Vec<u8>> {
        match self.kind {
            ArchiveKind::Zip => cbz::read_member(&self.source, name),
            #[cfg(feature = "rar")]
            ArchiveKind::Rar => crate::cbr::read_member(self.rar_path()?, name),
            #[cfg(not(feature = "rar"))]
            ArchiveKind::Rar => exn::bail!(ErrorKind::DisabledFormat(self.kind.to_string())),
        }
    }

    #[cfg(feature = "rar")]
    fn rar_path(&self) -> Result<&Path> {
        match &self.source {
            Source::Path(path) => Ok(path),
            // try_open always spills rar bytes to disk.
            Source::Bytes(_) => exn::bail!(ErrorKind::Unreadable(self.source.describe())),
        }
    }
}

/// Detect the container format of `source` by probing.
pub fn detect_kind(source: impl Into<Source>) -> Result<ArchiveKind> {
    Archive::open(source.into()).map(|archive| archive.kind())
}
