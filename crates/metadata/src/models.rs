//! Typed descriptor produced by the processing pipeline.

use crate::content_type::ContentType;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

fn default_archive() -> String {
    "core".to_string()
}

fn default_index() -> String {
    "index.html".to_string()
}

/// A fully processed content descriptor at the latest generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Descriptor generation (`gen` on disk).
    #[serde(rename = "gen")]
    pub generation: u64,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub broadcast: Option<OffsetDateTime>,
    pub language: Option<String>,
    pub license: Option<String>,
    pub publisher: Option<String>,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub is_partner: bool,
    #[serde(default)]
    pub is_sponsored: bool,
    #[serde(default = "default_archive")]
    pub archive: String,
    pub cover: Option<String>,
    pub thumbnail: Option<String>,
    /// Path of an older item this one supersedes.
    pub replaces: Option<String>,
    pub content: Content,
}
impl Descriptor {
    /// Minimal descriptor of a single kind, handy for building records by
    /// hand.
    pub fn new(title: impl Into<String>, content: Content) -> Self {
        Self {
            generation: crate::generation::LATEST,
            title: title.into(),
            url: String::new(),
            timestamp: None,
            broadcast: None,
            language: None,
            license: None,
            publisher: None,
            keywords: String::new(),
            is_partner: false,
            is_sponsored: false,
            archive: default_archive(),
            cover: None,
            thumbnail: None,
            replaces: None,
            content,
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.content.content_type()
    }

    /// Presentation label: core archive items are always "core", otherwise
    /// sponsorship wins over partnership.
    pub fn label(&self) -> &'static str {
        match (self.archive.as_str(), self.is_sponsored, self.is_partner) {
            ("core", _, _) => "core",
            (_, true, _) => "sponsored",
            (_, _, true) => "partner",
            _ => "core",
        }
    }
}

/// Kind sub-records of a descriptor. At least one is present after
/// validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<Generic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<Html>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
}
impl Content {
    pub fn generic() -> Self {
        Self { generic: Some(Generic::default()), ..Self::default() }
    }

    /// Bitwise OR of the masks of every populated kind.
    pub fn content_type(&self) -> ContentType {
        let mut mask = ContentType::empty();
        mask.set(ContentType::GENERIC, self.generic.is_some());
        mask.set(ContentType::HTML, self.html.is_some());
        mask.set(ContentType::VIDEO, self.video.is_some());
        mask.set(ContentType::AUDIO, self.audio.is_some());
        mask.set(ContentType::APP, self.app.is_some());
        mask.set(ContentType::IMAGE, self.image.is_some());
        mask
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generic {
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Html {
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default)]
    pub keep_formatting: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub description: Option<String>,
    #[serde(default)]
    pub clips: Vec<Clip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub file: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<f64>,
    #[serde(alias = "size")]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audio {
    pub description: Option<String>,
    #[serde(default)]
    pub playlist: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub file: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub description: Option<String>,
    #[serde(default, alias = "album")]
    pub gallery: Vec<Picture>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    pub file: String,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(alias = "size")]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub version: Option<String>,
    pub description: Option<String>,
}
