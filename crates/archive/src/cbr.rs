//! Rar container support.
//!
//! `unrar` only operates on files, so in-memory sources are spilled to a
//! temporary file first (see [`spill`]).

use crate::construct::RAR_MAGIC;
use crate::error::{ErrorKind, Result};
use crate::source::Source;
use exn::ResultExt;
use std::io::Write;
use std::path::Path;
use tempfile::TempPath;

/// Cheap signature check so non-rar data never reaches the C library.
pub(crate) fn has_signature(source: &Source) -> Result<bool> {
    Ok(source.head(RAR_MAGIC.len())? == RAR_MAGIC)
}

/// Write in-memory archive data to a temporary file that lives as long as
/// the returned [`TempPath`].
pub(crate) fn spill(bytes: &[u8]) -> Result<TempPath> {
    let mut file = tempfile::Builder::new().prefix("comicback-").suffix(".rar").tempfile().or_raise(|| ErrorKind::Io)?;
    file.write_all(bytes).or_raise(|| ErrorKind::Io)?;
    file.flush().or_raise(|| ErrorKind::Io)?;
    Ok(file.into_temp_path())
}

pub(crate) fn list_members(path: &Path) -> Result<Vec<String>> {
    let listing = match unrar::Archive::new(path).open_for_listing() {
        Ok(listing) => listing,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = ?err, "unrar refused to open archive");
            exn::bail!(ErrorKind::Unreadable(format!("not a rar archive: {}", path.display())));
        },
    };
    let mut members = Vec::new();
    for header in listing {
        let header = match header {
            Ok(header) => header,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = ?err, "unrar failed reading header");
                exn::bail!(ErrorKind::Unreadable(format!("damaged rar archive: {}", path.display())));
            },
        };
        if header.is_file() {
            members.push(header.filename.to_string_lossy().into_owned());
        }
    }
    Ok(members)
}

pub(crate) fn read_member(path: &Path, name: &str) -> Result<Vec<u8>> {
    let corrupt = || ErrorKind::CorruptMember(name.to_string());
    let mut archive = match unrar::Archive::new(path).open_for_processing() {
        Ok(archive) => archive,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = ?err, "unrar refused to open archive");
            exn::bail!(ErrorKind::Unreadable(format!("not a rar archive: {}", path.display())));
        },
    };
    loop {
        let header = match archive.read_header() {
            Ok(Some(header)) => header,
            Ok(None) => exn::bail!(ErrorKind::MemberNotFound(name.to_string())),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = ?err, "unrar failed reading header");
                exn::bail!(corrupt());
            },
        };
        archive = if header.entry().filename.to_string_lossy() == name {
            return match header.read() {
                Ok((data, _rest)) => Ok(data),
                Err(err) => {
                    tracing::debug!(path = %path.display(), member = name, error = ?err, "unrar failed extracting");
                    exn::bail!(corrupt())
                },
            };
        } else {
            match header.skip() {
                Ok(rest) => rest,
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = ?err, "unrar failed skipping member");
                    exn::bail!(corrupt());
                },
            }
        };
    }
}
