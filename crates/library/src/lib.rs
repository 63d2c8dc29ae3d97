//! Comic libraries on top of storage and the catalog.
//!
//! - [`open_backend`] picks a library's storage backend once; nothing else
//!   looks at the library kind.
//! - [`Context`] bundles a library with its backend and the catalog, and
//!   serves pages and covers.
//! - [`Reconciler`] scans storage and brings the catalog up to date.
//! - [`ReadingSession`] moves a reader through a file one command at a time.

mod backend;
mod context;
pub mod error;
mod reconcile;
mod session;
mod thumbnail;

pub use crate::backend::open_backend;
pub use crate::context::{Context, Page};
pub use crate::reconcile::{
    BLACKLIST, DirContent, DirectoryEntry, EntryKind, Reconciler, Resolution, ScanReport, is_archive_name,
};
pub use crate::session::{Command, FileState, Frame, ReadingSession};
pub use crate::thumbnail::{ImageThumbnailer, Thumbnailer};
