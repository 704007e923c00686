//! Timestamp recognition inside descriptors.

use crate::generation::Raw;
use crate::schema;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

fn parse_naive(text: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"))
        .or_else(|_| PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]")))
        .or_else(|_| PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")))
        .ok()
        .or_else(|| Date::parse(text, format_description!("[year]-[month]-[day]")).ok().map(Date::midnight))
}

/// Parse any of the timestamp shapes found in descriptors. Values without an
/// offset are taken to be UTC.
pub fn parse(text: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(text, &Rfc3339).ok().or_else(|| parse_naive(text).map(PrimitiveDateTime::assume_utc))
}

/// Rewrite the timestamp fields of a descriptor into their canonical
/// RFC 3339 form so that typed fields can deserialize them. Other strings
/// are left alone, even when they look like dates.
pub fn normalize(meta: &mut Raw) {
    for key in schema::timestamp_keys() {
        if let Some(Value::String(text)) = meta.get_mut(key)
            && let Some(canonical) = parse(text).and_then(|dt| dt.format(&Rfc3339).ok())
        {
            *text = canonical;
        }
    }
}
