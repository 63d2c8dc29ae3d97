use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub(crate) trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Where the bytes of an archive live.
///
/// Network backends hand over the whole container as bytes; the local
/// backend hands over a path so large archives are never buffered.
#[derive(Clone, Debug)]
pub enum Source {
    Bytes(Arc<[u8]>),
    Path(PathBuf),
}

impl Source {
    /// Open a fresh seekable reader over the archive data.
    pub(crate) fn reader(&self) -> Result<Box<dyn ReadSeek>> {
        Ok(match self {
            Source::Bytes(bytes) => Box::new(Cursor::new(Arc::clone(bytes))),
            Source::Path(path) => Box::new(File::open(path).or_raise(|| ErrorKind::Io)?),
        })
    }

    /// Read up to `len` leading bytes for signature checks.
    pub(crate) fn head(&self, len: usize) -> Result<Vec<u8>> {
        match self {
            Source::Bytes(bytes) => Ok(bytes[..len.min(bytes.len())].to_vec()),
            Source::Path(path) => {
                let file = File::open(path).or_raise(|| ErrorKind::Io)?;
                let mut buffer = Vec::with_capacity(len);
                file.take(len as u64).read_to_end(&mut buffer).or_raise(|| ErrorKind::Io)?;
                Ok(buffer)
            },
        }
    }

    /// Human-readable description for log fields and error messages.
    pub fn describe(&self) -> String {
        match self {
            Source::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
            Source::Path(path) => path.display().to_string(),
        }
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes.into())
    }
}

impl From<Arc<[u8]>> for Source {
    fn from(bytes: Arc<[u8]>) -> Self {
        Source::Bytes(bytes)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_of_bytes() {
        let source = Source::from(b"0123456789".to_vec());
        assert_eq!(source.head(4).unwrap(), b"0123");
        assert_eq!(source.head(100).unwrap(), b"0123456789");
    }

    #[test]
    fn test_head_of_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        std::fs::write(&path, b"Rar!\x1A\x07\x00rest").unwrap();
        let source = Source::from(path.as_path());
        assert_eq!(source.head(7).unwrap(), b"Rar!\x1A\x07\x00");
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let source = Source::from(PathBuf::from("/definitely/not/here.cbz"));
        let err = source.head(4).unwrap_err();
        assert_eq!(*err, ErrorKind::Io);
    }
}
