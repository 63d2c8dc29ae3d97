mod file;
mod library;

pub use self::file::{FileId, FileRecord, NewFile, split_path};
pub(crate) use self::file::{FileRow, NewFileRow};
pub use self::library::{Library, LibraryId, LibraryKind, NetworkCredentials, NewLibrary};
pub(crate) use self::library::{LibraryRow, NewLibraryRow};
