//! Comic archive reading with content-based format detection.
//!
//! This crate opens the image containers comic books are distributed in
//! (`.cbz`/`.zip` and `.cbr`/`.rar`), providing:
//!
//! - **Format probing** by actually opening the data with each supported
//!   container in a fixed order ([`Archive::open`], [`ArchiveKind::try_open`]).
//!   File extensions are only ever a hint ([`ArchiveKind::from_path`]); a
//!   mislabeled file must fail cleanly rather than be silently misparsed.
//! - **Page listing**: image members filtered by extension and sorted
//!   lexicographically ([`page_names`]), which is the page order.
//! - **Page extraction** by index ([`Archive::page`]) or by member name
//!   ([`Archive::member`]).
//!
//! Zip is always available. Rar is behind the (default) `rar` feature and
//! needs an on-disk file; rar data supplied as bytes is spilled to a
//! temporary file for the lifetime of the [`Archive`].
//!
//! Everything in this crate is blocking. Async callers should run it inside
//! `spawn_blocking`.

mod archive;
mod cbz;
#[cfg(feature = "rar")]
mod cbr;
mod construct;
pub mod error;
mod source;
mod util;

pub use crate::archive::{Archive, detect_kind};
pub use crate::source::Source;
pub use crate::util::{content_type, is_image, page_names};

/// Image extensions recognised as comic pages (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// A supported archive container format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// Zip container (.cbz, .zip)
    Zip,
    /// Rar container (.cbr, .rar)
    Rar,
}

impl ArchiveKind {
    /// Order in which formats are probed; first successful open wins.
    pub const PROBE_ORDER: [ArchiveKind; 2] = [ArchiveKind::Zip, ArchiveKind::Rar];
}
