//! Schema of the latest descriptor generation.
//!
//! Validation runs on the raw descriptor, before deprecated keys are renamed,
//! so aliases are part of the schema too.

use crate::content_type::ContentType;
use crate::datetime;
use crate::generation::Raw;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy)]
enum Rule {
    /// Non-empty string, must be present.
    Title,
    /// String or null.
    Text,
    /// Recognisable timestamp string, or null.
    Timestamp,
    Flag,
    Integer,
    /// Mapping of known content kinds to mappings, at least one.
    Content,
}

/// Every key a processed descriptor may carry, with its default (if any).
static FIELDS: [(&str, Rule, Option<fn() -> Value>); 17] = [
    ("gen", Rule::Integer, None),
    ("title", Rule::Title, None),
    ("content", Rule::Content, None),
    ("url", Rule::Text, Some(|| json!(""))),
    ("timestamp", Rule::Timestamp, Some(|| Value::Null)),
    ("broadcast", Rule::Timestamp, Some(|| Value::Null)),
    ("language", Rule::Text, Some(|| Value::Null)),
    ("license", Rule::Text, Some(|| Value::Null)),
    ("publisher", Rule::Text, Some(|| Value::Null)),
    ("keywords", Rule::Text, Some(|| json!(""))),
    ("is_partner", Rule::Flag, Some(|| json!(false))),
    ("is_sponsored", Rule::Flag, Some(|| json!(false))),
    ("archive", Rule::Text, Some(|| json!("core"))),
    ("cover", Rule::Text, Some(|| Value::Null)),
    ("thumbnail", Rule::Text, Some(|| Value::Null)),
    ("replaces", Rule::Text, Some(|| Value::Null)),
    // Read-only alias, removed by `replace_aliases`.
    ("partner", Rule::Text, None),
];

/// Deprecated key and the key that replaced it.
const ALIASES: [(&str, &str); 1] = [("partner", "publisher")];

fn check(rule: Rule, value: Option<&Value>) -> Result<(), &'static str> {
    match (rule, value) {
        (Rule::Title, Some(Value::String(s))) if !s.trim().is_empty() => Ok(()),
        (Rule::Title, _) => Err("must be a non-empty string"),
        (Rule::Content, Some(Value::Object(kinds))) => {
            if kinds.is_empty() {
                return Err("must declare at least one content kind");
            }
            for (key, value) in kinds {
                if ContentType::from_key(key).is_none() {
                    return Err("declares an unknown content kind");
                }
                if !value.is_object() {
                    return Err("content kinds must be mappings");
                }
            }
            Ok(())
        },
        (Rule::Content, _) => Err("must be a mapping of content kinds"),
        (_, None | Some(Value::Null)) => Ok(()),
        (Rule::Text, Some(Value::String(_))) => Ok(()),
        (Rule::Text, _) => Err("must be a string"),
        (Rule::Timestamp, Some(Value::String(s))) if datetime::parse(s).is_some() => Ok(()),
        (Rule::Timestamp, _) => Err("must be a date or timestamp"),
        (Rule::Flag, Some(Value::Bool(_))) => Ok(()),
        (Rule::Flag, _) => Err("must be a boolean"),
        (Rule::Integer, Some(v)) if v.is_u64() => Ok(()),
        (Rule::Integer, _) => Err("must be a non-negative integer"),
    }
}

/// Validate a descriptor, returning one message per offending key (empty
/// when valid). Unknown keys are not an error; they are stripped later.
pub fn validate(meta: &Raw) -> Vec<String> {
    FIELDS
        .iter()
        .filter_map(|(key, rule, _)| check(*rule, meta.get(*key)).err().map(|message| format!("{key}: {message}")))
        .collect()
}

/// Move values from deprecated keys to their replacements, unless the
/// replacement is already set.
pub fn replace_aliases(meta: &mut Raw) {
    for (deprecated, current) in ALIASES {
        if let Some(value) = meta.remove(deprecated) {
            let unset = meta.get(current).is_none_or(Value::is_null);
            if unset {
                meta.insert(current.to_string(), value);
            }
        }
    }
}

/// Fill in every missing key that has a declared default.
pub fn add_missing_keys(meta: &mut Raw) {
    for (key, _, default) in FIELDS {
        if let Some(default) = default {
            meta.entry(key).or_insert_with(default);
        }
    }
}

/// Drop every key the schema does not know about (including aliases, which
/// have been replaced by now).
pub fn clean_keys(meta: &mut Raw) {
    meta.retain(|key, _| {
        FIELDS.iter().any(|(known, _, _)| *known == key.as_str())
            && !ALIASES.iter().any(|(deprecated, _)| *deprecated == key.as_str())
    });
}

/// Keys holding timestamps.
pub(crate) fn timestamp_keys() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().filter(|(_, rule, _)| matches!(rule, Rule::Timestamp)).map(|(key, ..)| *key)
}
