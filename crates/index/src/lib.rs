//! SQLite indexes over the content tree.
//!
//! The indexes are not the source of truth - the content tree is. Either
//! database can be deleted and rebuilt by rescanning.
//!
//! # Architecture
//! Two databases, each with its own migrations:
//! - **Content** ([`ContentArchive`]): one flat record per content
//!   directory, built from its descriptor, with kind sub-records, tags and
//!   replacement chaining.
//! - **Facets** ([`FacetsArchive`]): one facet tree per directory, stored
//!   one table per nesting level and kept in sync by a structural diff.

mod content;
mod db;
pub mod error;
mod facets;

pub use crate::content::{ContentArchive, ContentQuery, ContentRecord, Projection, TagCount};
pub use crate::db::{Catalog, Database};
pub use crate::facets::{FacetsArchive, SyncStats};
