use crate::error::{Error, ErrorKind};
use curator_metadata::{Content, ContentType, Descriptor};
use exn::{OptionExt, ResultExt};
use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// A record flattened into a JSON object, optionally narrowed to a set of
/// fields.
pub type Projection = serde_json::Map<String, serde_json::Value>;

fn serialize_content_type<S: serde::Serializer>(value: &ContentType, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u32(value.bits())
}

/// One item of content as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRecord {
    pub path: String,
    pub url: String,
    pub title: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    /// When the record was last written by ingestion.
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
    pub favorite: bool,
    pub views: u64,
    pub is_partner: bool,
    pub is_sponsored: bool,
    pub archive: String,
    pub publisher: Option<String>,
    pub license: Option<String>,
    /// Tag name to tag id.
    pub tags: BTreeMap<String, i64>,
    pub language: Option<String>,
    /// Total size of the content directory, in bytes.
    pub size: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub broadcast: Option<OffsetDateTime>,
    pub keywords: String,
    pub disabled: bool,
    #[serde(serialize_with = "serialize_content_type")]
    pub content_type: ContentType,
    pub cover: Option<String>,
    pub thumbnail: Option<String>,
    pub replaces: Option<String>,
    #[serde(rename = "gen")]
    pub generation: u64,
    /// Kind sub-records; only the kinds that have been loaded are present.
    pub content: Content,
}

impl ContentRecord {
    /// Fresh record for a processed descriptor. Counters and flags that the
    /// index owns (views, favorite, tags, disabled) start out empty.
    pub fn from_descriptor(path: impl Into<String>, descriptor: Descriptor, size: u64, updated: OffsetDateTime) -> Self {
        let content_type = descriptor.content_type();
        Self {
            path: path.into(),
            url: descriptor.url,
            title: descriptor.title,
            timestamp: descriptor.timestamp,
            updated,
            favorite: false,
            views: 0,
            is_partner: descriptor.is_partner,
            is_sponsored: descriptor.is_sponsored,
            archive: descriptor.archive,
            publisher: descriptor.publisher,
            license: descriptor.license,
            tags: BTreeMap::new(),
            language: descriptor.language,
            size,
            broadcast: descriptor.broadcast,
            keywords: descriptor.keywords,
            disabled: false,
            content_type,
            cover: descriptor.cover,
            thumbnail: descriptor.thumbnail,
            replaces: descriptor.replaces,
            generation: descriptor.generation,
            content: descriptor.content,
        }
    }

    /// Presentation label, see [`Descriptor::label`].
    pub fn label(&self) -> &'static str {
        match (self.archive.as_str(), self.is_sponsored, self.is_partner) {
            ("core", _, _) => "core",
            (_, true, _) => "sponsored",
            (_, _, true) => "partner",
            _ => "core",
        }
    }

    /// Flatten into a JSON object, keeping only `fields` (and always `path`)
    /// when given.
    pub fn project(&self, fields: Option<&[&str]>) -> crate::error::Result<Projection> {
        let serde_json::Value::Object(mut map) = serde_json::to_value(self).or_raise(|| ErrorKind::InvalidData("record"))?
        else {
            exn::bail!(ErrorKind::InvalidData("record"));
        };
        if let Some(fields) = fields {
            map.retain(|key, _| key == "path" || fields.contains(&key.as_str()));
        }
        Ok(map)
    }
}

/// Filters for listing content. Every filter that is set must match.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    /// Case-insensitive substring of title, publisher or keywords.
    pub terms: Option<String>,
    pub tag: Option<i64>,
    pub lang: Option<String>,
    /// Records must have every kind in this mask.
    pub content_type: Option<ContentType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TagCount {
    pub tag_id: i64,
    pub name: String,
    pub count: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ContentRow {
    pub(crate) path: String,
    pub(crate) url: String,
    pub(crate) title: String,
    pub(crate) timestamp: Option<i64>,
    pub(crate) updated: i64,
    pub(crate) favorite: bool,
    pub(crate) views: i64,
    pub(crate) is_partner: bool,
    pub(crate) is_sponsored: bool,
    pub(crate) archive: String,
    pub(crate) publisher: Option<String>,
    pub(crate) license: Option<String>,
    pub(crate) tags: String,
    pub(crate) language: Option<String>,
    pub(crate) size: i64,
    pub(crate) broadcast: Option<i64>,
    pub(crate) keywords: String,
    pub(crate) disabled: bool,
    pub(crate) content_type: i64,
    pub(crate) cover: Option<String>,
    pub(crate) thumbnail: Option<String>,
    pub(crate) replaces: Option<String>,
    pub(crate) r#gen: i64,
}

fn to_datetime(timestamp: i64, field: &'static str) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp(timestamp).or_raise(|| ErrorKind::InvalidData(field))
}

impl TryFrom<&ContentRecord> for ContentRow {
    type Error = Error;
    fn try_from(record: &ContentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            path: record.path.clone(),
            url: record.url.clone(),
            title: record.title.clone(),
            timestamp: record.timestamp.map(OffsetDateTime::unix_timestamp),
            updated: record.updated.unix_timestamp(),
            favorite: record.favorite,
            views: i64::try_from(record.views).or_raise(|| ErrorKind::InvalidData("views"))?,
            is_partner: record.is_partner,
            is_sponsored: record.is_sponsored,
            archive: record.archive.clone(),
            publisher: record.publisher.clone(),
            license: record.license.clone(),
            tags: serde_json::to_string(&record.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
            language: record.language.clone(),
            size: i64::try_from(record.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            broadcast: record.broadcast.map(OffsetDateTime::unix_timestamp),
            keywords: record.keywords.clone(),
            disabled: record.disabled,
            content_type: record.content_type.stored(),
            cover: record.cover.clone(),
            thumbnail: record.thumbnail.clone(),
            replaces: record.replaces.clone(),
            r#gen: i64::try_from(record.generation).or_raise(|| ErrorKind::InvalidData("gen"))?,
        })
    }
}

impl TryFrom<ContentRow> for ContentRecord {
    type Error = Error;
    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            timestamp: row.timestamp.map(|t| to_datetime(t, "timestamp")).transpose()?,
            updated: to_datetime(row.updated, "updated")?,
            views: u64::try_from(row.views).or_raise(|| ErrorKind::InvalidData("views"))?,
            tags: serde_json::from_str(&row.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            broadcast: row.broadcast.map(|t| to_datetime(t, "broadcast")).transpose()?,
            content_type: ContentType::from_stored(row.content_type).ok_or_raise(|| ErrorKind::InvalidData("content type"))?,
            generation: u64::try_from(row.r#gen).or_raise(|| ErrorKind::InvalidData("gen"))?,
            path: row.path,
            url: row.url,
            title: row.title,
            favorite: row.favorite,
            is_partner: row.is_partner,
            is_sponsored: row.is_sponsored,
            archive: row.archive,
            publisher: row.publisher,
            license: row.license,
            language: row.language,
            keywords: row.keywords,
            disabled: row.disabled,
            cover: row.cover,
            thumbnail: row.thumbnail,
            replaces: row.replaces,
            content: Content::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn record() -> ContentRecord {
        let mut descriptor = Descriptor::new("Title", Content::generic());
        descriptor.timestamp = Some(datetime!(2014-03-01 12:00:00 UTC));
        ContentRecord::from_descriptor("books/a", descriptor, 2048, datetime!(2015-01-01 00:00:00 UTC))
    }

    #[test]
    fn test_row_round_trip() {
        let mut model = record();
        model.tags.insert("science".to_string(), 3);
        model.views = 7;
        let row = ContentRow::try_from(&model).unwrap();
        assert_eq!(row.tags, r#"{"science":3}"#);
        assert_eq!(row.content_type, 1);
        let back = ContentRecord::try_from(row).unwrap();
        // Kind sub-records live in their own tables.
        assert_eq!(back, ContentRecord { content: Content::default(), ..model });
    }

    #[test]
    fn test_invalid_row() {
        let mut row = ContentRow::try_from(&record()).unwrap();
        row.content_type = 1 << 10;
        let err = ContentRecord::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("content type")));
    }

    #[test]
    fn test_project() {
        let projection = record().project(Some(&["title", "content_type", "nonsense"])).unwrap();
        assert_eq!(
            serde_json::Value::Object(projection),
            json!({"path": "books/a", "title": "Title", "content_type": 1})
        );
        let full = record().project(None).unwrap();
        assert_eq!(full.get("timestamp"), Some(&json!("2014-03-01T12:00:00Z")));
        assert_eq!(full.get("content"), Some(&json!({"generic": {"description": null}})));
        assert_eq!(full.get("gen"), Some(&json!(1)));
    }
}
