//! SQLite catalog for comic libraries.
//!
//! The catalog records which libraries exist and, per library, which comic
//! archives have been discovered: where they live, their page lists, their
//! content hash and the reader's current page. It is *derived* state: the
//! files on storage are the source of truth and the reconciler keeps the two
//! in sync.
//!
//! # Architecture
//! - **Libraries**: a named root on some storage backend (local directory
//!   or SMB share). Library names are unique.
//! - **Files**: one record per archive path within a library, identified
//!   for move detection by a content hash. Deleting a library cascades to
//!   its files.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{
    FileId, FileRecord, Library, LibraryId, LibraryKind, NetworkCredentials, NewFile, NewLibrary, split_path,
};
pub use crate::repo::Repository;
