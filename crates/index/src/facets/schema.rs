//! Static description of the facet tables.
//!
//! Each nesting level of a facet tree maps to one table. A table lists its
//! scalar columns, the key columns that identify a row (and on which writes
//! replace), and the child tables hanging off its mapping keys.

use curator_metadata::ContentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Column {
    Text,
    Integer,
    Real,
}

#[derive(Debug)]
pub(crate) enum Child {
    /// A nested mapping, at most one row.
    One(&'static Table),
    /// A nested list, one row per element.
    Many(&'static Table),
}

#[derive(Debug)]
pub(crate) struct Table {
    pub(crate) name: &'static str,
    pub(crate) key: &'static [&'static str],
    pub(crate) columns: &'static [(&'static str, Column)],
    pub(crate) children: &'static [(&'static str, Child)],
    /// Kind bit that must be set in `facet_types` for this sub-tree to be
    /// loaded.
    pub(crate) mask: Option<ContentType>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

const PATH: (&str, Column) = ("path", Column::Text);
const FILE: (&str, Column) = ("file", Column::Text);

static GENERIC: Table = Table {
    name: "generic",
    key: &["path"],
    columns: &[PATH],
    children: &[],
    mask: Some(ContentType::GENERIC),
};

static HTML: Table = Table {
    name: "html",
    key: &["path"],
    columns: &[PATH, ("index", Column::Text)],
    children: &[],
    mask: Some(ContentType::HTML),
};

static GALLERY: Table = Table {
    name: "gallery",
    key: &["path", "file"],
    columns: &[PATH, FILE, ("title", Column::Text), ("width", Column::Integer), ("height", Column::Integer)],
    children: &[],
    mask: None,
};

static IMAGE: Table = Table {
    name: "image",
    key: &["path"],
    columns: &[PATH],
    children: &[("gallery", Child::Many(&GALLERY))],
    mask: Some(ContentType::IMAGE),
};

static PLAYLIST: Table = Table {
    name: "playlist",
    key: &["path", "file"],
    columns: &[
        PATH,
        FILE,
        ("author", Column::Text),
        ("title", Column::Text),
        ("duration", Column::Real),
        ("genre", Column::Text),
        ("album", Column::Text),
    ],
    children: &[],
    mask: None,
};

static AUDIO: Table = Table {
    name: "audio",
    key: &["path"],
    columns: &[PATH, ("cover", Column::Text)],
    children: &[("playlist", Child::Many(&PLAYLIST))],
    mask: Some(ContentType::AUDIO),
};

static CLIPS: Table = Table {
    name: "clips",
    key: &["path", "file"],
    columns: &[
        PATH,
        FILE,
        ("title", Column::Text),
        ("author", Column::Text),
        ("description", Column::Text),
        ("width", Column::Integer),
        ("height", Column::Integer),
        ("duration", Column::Real),
        ("thumbnail", Column::Text),
    ],
    children: &[],
    mask: None,
};

static VIDEO: Table = Table {
    name: "video",
    key: &["path"],
    columns: &[PATH],
    children: &[("clips", Child::Many(&CLIPS))],
    mask: Some(ContentType::VIDEO),
};

/// The `facets` table at the top of every tree.
pub(crate) static ROOT: Table = Table {
    name: "facets",
    key: &["path"],
    columns: &[PATH, ("facet_types", Column::Integer)],
    children: &[
        ("generic", Child::One(&GENERIC)),
        ("html", Child::One(&HTML)),
        ("image", Child::One(&IMAGE)),
        ("audio", Child::One(&AUDIO)),
        ("video", Child::One(&VIDEO)),
    ],
    mask: None,
};

/// Every table, parents before their children.
pub(crate) static ALL_TABLES: [&Table; 9] = [&ROOT, &GENERIC, &HTML, &IMAGE, &GALLERY, &AUDIO, &PLAYLIST, &VIDEO, &CLIPS];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_columns() {
        for table in ALL_TABLES {
            for key in table.key {
                assert!(table.columns.iter().any(|(name, _)| name == key), "{}.{key}", table.name);
            }
        }
    }

    #[test]
    fn test_kind_tables_are_masked() {
        for (key, child) in ROOT.children {
            let Child::One(table) = child else {
                panic!("{key} should be a mapping");
            };
            assert_eq!(table.mask, ContentType::from_key(key));
        }
    }
}
