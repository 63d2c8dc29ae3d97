//! Zip container support.

use crate::error::{ErrorKind, Result};
use crate::source::{ReadSeek, Source};
use exn::ResultExt;
use std::io::Read;
use zip::ZipArchive;
use zip::result::ZipError;

fn open(source: &Source) -> Result<ZipArchive<Box<dyn ReadSeek>>> {
    let reader = source.reader()?;
    ZipArchive::new(reader).or_raise(|| ErrorKind::Unreadable(format!("not a zip archive: {}", source.describe())))
}

/// List every file member (directories excluded) in container order.
pub(crate) fn list_members(source: &Source) -> Result<Vec<String>> {
    let archive = open(source)?;
    Ok(archive.file_names().filter(|name| !name.ends_with('/')).map(str::to_string).collect())
}

pub(crate) fn read_member(source: &Source, name: &str) -> Result<Vec<u8>> {
    let mut archive = open(source)?;
    let mut member = match archive.by_name(name) {
        Ok(member) => member,
        Err(ZipError::FileNotFound) => exn::bail!(ErrorKind::MemberNotFound(name.to_string())),
        Err(err) => return Err(err).or_raise(|| ErrorKind::CorruptMember(name.to_string())),
    };
    // Sizes in the central directory are untrusted; they're only a hint.
    let mut buffer = Vec::with_capacity(usize::try_from(member.size()).unwrap_or(0).min(64 * 1024 * 1024));
    member.read_to_end(&mut buffer).or_raise(|| ErrorKind::CorruptMember(name.to_string()))?;
    Ok(buffer)
}


#[cfg(test)]
mod tests {
    use super::fixtures::zip_bytes;
    use super::*;

    #[test]
    fn test_list_members() {
        let source = Source::from(zip_bytes(&[("002.jpg", b"two"), ("001.jpg", b"one"), ("ComicInfo.xml", b"<x/>")]));
        let members = list_members(&source).unwrap();
        assert_eq!(members, vec!["002.jpg", "001.jpg", "ComicInfo.xml"]);
    }

    #[test]
    fn test_read_member() {
        let source = Source::from(zip_bytes(&[("001.jpg", b"one"), ("002.jpg", b"two")]));
        assert_eq!(read_member(&source, "002.jpg").unwrap(), b"two");
    }

    #[test]
    fn test_read_missing_member() {
        let source = Source::from(zip_bytes(&[("001.jpg", b"one")]));
        let err = read_member(&source, "999.jpg").unwrap_err();
        assert_eq!(*err, ErrorKind::MemberNotFound("999.jpg".to_string()));
    }

    #[test]
    fn test_not_a_zip() {
        let source = Source::from(b"definitely not a zip file".to_vec());
        let err = list_members(&source).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unreadable(_)));
    }

    #[test]
    fn test_open_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issue.cbz");
        std::fs::write(&path, zip_bytes(&[("a.png", b"png")])).unwrap();
        let source = Source::from(path);
        assert_eq!(list_members(&source).unwrap(), vec!["a.png"]);
        assert_eq!(read_member(&source, "a.png").unwrap(), b"png");
    }
}
