//! Content-type registry shared by the content and facet indexes.

bitflags::bitflags! {
    /// Which kind(s) an item of content represents.
    ///
    /// Stored as an integer bitmask; the set bits name exactly the kind
    /// sub-records that belong to the item.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContentType: u32 {
        const GENERIC = 1;
        const HTML = 2;
        const VIDEO = 4;
        const AUDIO = 8;
        const APP = 16;
        const IMAGE = 32;
    }
}

const KEYS: [(ContentType, &str); 6] = [
    (ContentType::GENERIC, "generic"),
    (ContentType::HTML, "html"),
    (ContentType::VIDEO, "video"),
    (ContentType::AUDIO, "audio"),
    (ContentType::APP, "app"),
    (ContentType::IMAGE, "image"),
];

impl ContentType {
    /// Kinds that are left out of unfiltered listings when they are the
    /// only kind an item has.
    pub const EXCLUDED: Self = Self::APP;
    /// Kinds whose sub-record is loaded along with listings filtered to
    /// them.
    pub const PREFETCHABLE: Self = Self::APP;

    /// Look up a kind by its descriptor key (`"video"`, `"html"`, ...).
    pub fn from_key(key: &str) -> Option<Self> {
        KEYS.iter().find(|(_, k)| *k == key).map(|(t, _)| *t)
    }

    /// OR together the masks of every recognised key; unknown keys are
    /// ignored.
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        keys.into_iter().filter_map(Self::from_key).fold(Self::empty(), |acc, t| acc | t)
    }

    /// Descriptor keys of every kind set in this mask.
    pub fn keys(self) -> impl Iterator<Item = &'static str> {
        KEYS.into_iter().filter(move |(t, _)| self.contains(*t)).map(|(_, k)| k)
    }

    /// Build from a stored mask, rejecting unknown bits.
    pub fn from_stored(bits: i64) -> Option<Self> {
        u32::try_from(bits).ok().and_then(Self::from_bits)
    }

    pub fn stored(self) -> i64 {
        i64::from(self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["generic"], 1)]
    #[case(&["html", "video"], 6)]
    #[case(&["audio", "image", "nonsense"], 40)]
    #[case(&[], 0)]
    fn test_from_keys(#[case] keys: &[&str], #[case] expected: u32) {
        assert_eq!(ContentType::from_keys(keys.iter().copied()).bits(), expected);
    }

    #[test]
    fn test_keys_round_trip() {
        let mask = ContentType::HTML | ContentType::APP;
        assert_eq!(mask.keys().collect::<Vec<_>>(), ["html", "app"]);
        assert_eq!(ContentType::from_keys(mask.keys()), mask);
    }

    #[test]
    fn test_from_stored() {
        assert_eq!(ContentType::from_stored(32), Some(ContentType::IMAGE));
        assert_eq!(ContentType::from_stored(64), None);
        assert_eq!(ContentType::from_stored(-1), None);
    }
}
