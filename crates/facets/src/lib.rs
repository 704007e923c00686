//! Facets: per-directory metadata about the files a directory holds.
//!
//! Facets are maintained incrementally. Each file event is handed to every
//! [`FacetProcessor`] in the [`Registry`] that can process the file; the
//! processors update the kind they own and the record is pruned afterwards.
//! Detail fields (titles, dimensions, durations) come from a [`Probe`].

pub mod error;
mod models;
pub mod probe;
pub mod processor;
mod registry;

pub use crate::models::{Audio, Clip, Facets, Generic, Html, Image, ImageEntry, Track, Video};
pub use crate::probe::{FfprobeProbe, Fragment, NullProbe, Probe};
pub use crate::processor::{Context, FacetProcessor};
pub use crate::registry::Registry;
