use crate::ArchiveKind;
use crate::error::{Error, ErrorKind};
use std::{path::Path, str::FromStr};

#[cfg(feature = "rar")]
pub(crate) const RAR_MAGIC: [u8; 6] = [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07];

impl FromStr for ArchiveKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zip" | "cbz" => Ok(ArchiveKind::Zip),
            "rar" | "cbr" => Ok(ArchiveKind::Rar),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ArchiveKind {
    /// Guess the archive format from a file extension.
    ///
    /// This is a hint for filtering directory listings only; opening always
    /// probes the content.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(|ext| ext.to_str()).and_then(|ext| match ext.to_lowercase().as_str() {
            "cbz" | "zip" => Some(ArchiveKind::Zip),
            "cbr" | "rar" => Some(ArchiveKind::Rar),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ArchiveKind;
    use rstest::rstest;

    #[rstest]
    #[case("zip", ArchiveKind::Zip)]
    #[case("ZIP", ArchiveKind::Zip)]
    #[case("cbz", ArchiveKind::Zip)]
    #[case("rar", ArchiveKind::Rar)]
    #[case("cbr", ArchiveKind::Rar)]
    fn test_from_str(#[case] test: &str, #[case] expected: ArchiveKind) {
        assert_eq!(test.parse::<ArchiveKind>().unwrap(), expected);
    }

    #[rstest]
    #[case("7z")]
    #[case("pdf")]
    #[case(" ")]
    fn test_from_str_invalid(#[case] test: &str) {
        assert!(test.parse::<ArchiveKind>().is_err());
    }

    #[rstest]
    #[case("Saga/Volume 1.cbz", Some(ArchiveKind::Zip))]
    #[case("issue.CBR", Some(ArchiveKind::Rar))]
    #[case("issue.zip", Some(ArchiveKind::Zip))]
    #[case("issue.rar", Some(ArchiveKind::Rar))]
    #[case("issue.pdf", None)]
    #[case("README", None)]
    // Dotfile with no extension.
    #[case(".cbz", None)]
    fn test_from_path(#[case] test: &str, #[case] expected: Option<ArchiveKind>) {
        assert_eq!(ArchiveKind::from_path(test), expected);
    }
}
