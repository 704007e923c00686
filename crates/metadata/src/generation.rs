//! Descriptor generations and the adapters between them.
//!
//! Each generation is recognised by a detector over the raw descriptor's
//! keys. A generation with an upgrader is not the latest: the upgrader
//! rewrites the descriptor into the shape of the next generation and stamps
//! its `gen` number.

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use serde_json::{Map, Value, json};

pub type Raw = Map<String, Value>;

/// Generation every descriptor ends up at after [`upgrade`].
pub const LATEST: u64 = 1;

struct Generation {
    number: u64,
    detect: fn(&Raw) -> bool,
    upgrade: Option<fn(&mut Raw)>,
}

/// Keys that only ever appeared in generation 0 descriptors.
const GEN0_CLUES: [&str; 4] = ["index", "keep_formatting", "images", "multipage"];

fn detect_gen0(meta: &Raw) -> bool {
    GEN0_CLUES.iter().any(|clue| meta.contains_key(*clue))
}

fn gen0_to_gen1(meta: &mut Raw) {
    for clue in GEN0_CLUES {
        meta.remove(clue);
    }
    meta.insert("content".to_string(), json!({"generic": {}}));
    meta.insert("gen".to_string(), json!(1));
}

fn detect_gen1(meta: &Raw) -> bool {
    meta.contains_key("content")
}

/// Probed in order; the first detector to match wins.
static GENERATIONS: [Generation; 2] = [
    Generation { number: 0, detect: detect_gen0, upgrade: Some(gen0_to_gen1) },
    Generation { number: 1, detect: detect_gen1, upgrade: None },
];

fn lookup(number: u64) -> Option<&'static Generation> {
    GENERATIONS.iter().find(|g| g.number == number)
}

/// The explicit `gen` of a descriptor, or the first generation whose
/// detector recognises it.
///
/// An explicit `gen` is trusted as-is, even when no generation is
/// registered under that number; only a non-integer `gen` is rejected.
pub fn detect(meta: &Raw) -> Result<u64> {
    if let Some(explicit) = meta.get("gen") {
        return explicit.as_u64().ok_or_raise(|| ErrorKind::UnknownGeneration);
    }
    match GENERATIONS.iter().find(|g| (g.detect)(meta)) {
        Some(generation) => Ok(generation.number),
        None => exn::bail!(ErrorKind::UnknownGeneration),
    }
}

/// Run every registered adapter from the descriptor's generation onwards,
/// returning the generation reached. This is [`LATEST`] unless the
/// descriptor declares a generation without an adapter, where upgrading
/// stops.
///
/// Upgrading an up-to-date descriptor only stamps its `gen`, so applying
/// this twice is the same as applying it once.
pub fn upgrade(meta: &mut Raw) -> Result<u64> {
    let mut current = detect(meta)?;
    while let Some(adapter) = lookup(current).and_then(|g| g.upgrade) {
        adapter(meta);
        let next = detect(meta)?;
        if next <= current {
            // An adapter that does not move forward would loop forever.
            exn::bail!(ErrorKind::UnknownGeneration);
        }
        tracing::trace!(from = current, to = next, "Upgraded metadata generation");
        current = next;
    }
    meta.insert("gen".to_string(), json!(current));
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn raw(value: Value) -> Raw {
        match value {
            Value::Object(map) => map,
            _ => panic!("test descriptor must be an object"),
        }
    }

    #[rstest]
    #[case(json!({"title": "t", "index": "main.html"}), 0)]
    #[case(json!({"title": "t", "images": 3}), 0)]
    #[case(json!({"title": "t", "content": {"generic": {}}}), 1)]
    #[case(json!({"gen": 1, "index": "main.html"}), 1)]
    #[case(json!({"gen": 7, "content": {}}), 7)]
    fn test_detect(#[case] meta: Value, #[case] expected: u64) {
        assert_eq!(detect(&raw(meta)).unwrap(), expected);
    }

    #[rstest]
    #[case(json!({"title": "t"}))]
    #[case(json!({"gen": "one"}))]
    #[case(json!({"gen": -1, "content": {}}))]
    fn test_detect_unknown(#[case] meta: Value) {
        let err = detect(&raw(meta)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownGeneration));
    }

    #[test]
    fn test_upgrade_gen0() {
        let mut meta = raw(json!({"title": "t", "index": "a.html", "keep_formatting": true, "multipage": false}));
        assert_eq!(upgrade(&mut meta).unwrap(), 1);
        assert_eq!(Value::Object(meta), json!({"title": "t", "gen": 1, "content": {"generic": {}}}));
    }

    #[test]
    fn test_upgrade_stops_without_adapter() {
        let mut meta = raw(json!({"gen": 7, "title": "t", "index": "a.html"}));
        assert_eq!(upgrade(&mut meta).unwrap(), 7);
        // Left untouched: no adapter is registered for generation 7.
        assert_eq!(meta.get("index"), Some(&json!("a.html")));
        assert_eq!(meta.get("gen"), Some(&json!(7)));
    }

    #[rstest]
    #[case(json!({"title": "t", "index": "a.html"}))]
    #[case(json!({"title": "t", "content": {"video": {}}}))]
    #[case(json!({"gen": 1, "title": "t", "content": {"html": {"index": "x.html"}}}))]
    fn test_upgrade_is_idempotent(#[case] meta: Value) {
        let mut once = raw(meta);
        upgrade(&mut once).unwrap();
        let mut twice = once.clone();
        upgrade(&mut twice).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.get("gen"), Some(&json!(LATEST)));
    }
}
