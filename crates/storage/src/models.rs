//! Storage models.

/// Result of listing a single directory.
///
/// Names are bare entry names (not paths), sorted, and never include `.` or
/// `..`. Anything that is neither a regular file nor a directory (sockets,
/// broken symlinks) is left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

impl Listing {
    pub(crate) fn sorted(mut self) -> Self {
        self.directories.sort();
        self.files.sort();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}
