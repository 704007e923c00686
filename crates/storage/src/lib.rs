//! Filesystem abstraction over the content tree.
//!
//! Everything that touches the content directory goes through a
//! [`StorageBackend`]: listings, descriptor reads, deletion of removed
//! content, and the queue of change events fed by the watch transport.

pub mod backend;
mod change;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::change::ChangeQueue;
pub use crate::models::{ChangeEvent, ChangeKind, FileInfo, Listing};
pub use crate::path::{validate as validate_path, validate_dir as validate_dir_path};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
