pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::{StorageBackend, THUMBNAIL_DIR, thumbnail_path};
pub use crate::models::Listing;
pub use crate::path::{validate as validate_path, validate_dir};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
