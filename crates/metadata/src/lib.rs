//! Content descriptors.
//!
//! A descriptor is the JSON file that sits in a content directory and
//! describes the item. Descriptors written by older tooling come in older
//! *generations*; [`process`] upgrades them, validates them against the
//! current schema, normalises their keys and finally parses them into a typed
//! [`Descriptor`].

mod content_type;
mod datetime;
pub mod error;
pub mod generation;
mod models;
mod read;
pub mod schema;

pub use crate::content_type::ContentType;
pub use crate::datetime::parse as parse_datetime;
pub use crate::models::{App, Audio, Clip, Content, Descriptor, Generic, Html, Image, Picture, Track, Video};
pub use crate::read::{load, read_raw};

use crate::error::{ErrorKind, Result};
use crate::generation::Raw;
use exn::ResultExt;
use serde_json::Value;

/// Run a raw descriptor through the whole pipeline.
///
/// 1. upgrade to the latest generation
/// 2. validate (every invalid key is reported at once)
/// 3. rename deprecated keys, fill defaults, strip unknown keys
/// 4. normalise timestamps and parse into a [`Descriptor`]
pub fn process(mut raw: Raw) -> Result<Descriptor> {
    generation::upgrade(&mut raw)?;
    let invalid = schema::validate(&raw);
    if !invalid.is_empty() {
        exn::bail!(ErrorKind::Invalid(invalid));
    }
    schema::replace_aliases(&mut raw);
    schema::add_missing_keys(&mut raw);
    schema::clean_keys(&mut raw);
    datetime::normalize(&mut raw);
    serde_json::from_value(Value::Object(raw)).or_raise(|| ErrorKind::Invalid(vec!["content: unexpected shape".to_string()]))
}
