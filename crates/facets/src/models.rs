//! Typed facet records.
//!
//! One [`Facets`] value describes a single directory. Each kind is present
//! only while it has something to say; [`Facets::prune`] enforces that after
//! every mutation.

use curator_metadata::ContentType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    /// Directory the facets describe, relative to the content root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<Generic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<Html>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
}
impl Facets {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Self::default() }
    }

    /// Mask of every populated kind.
    pub fn facet_types(&self) -> ContentType {
        let mut mask = ContentType::empty();
        mask.set(ContentType::GENERIC, self.generic.is_some());
        mask.set(ContentType::HTML, self.html.is_some());
        mask.set(ContentType::IMAGE, self.image.is_some());
        mask.set(ContentType::AUDIO, self.audio.is_some());
        mask.set(ContentType::VIDEO, self.video.is_some());
        mask
    }

    /// Drop entries without a file, then every kind left with nothing in it.
    pub fn prune(&mut self) {
        if self.html.as_ref().is_some_and(|html| html.index.is_empty()) {
            self.html = None;
        }
        if let Some(image) = &mut self.image {
            image.gallery.retain(|entry| !entry.file.is_empty());
            if image.gallery.is_empty() {
                self.image = None;
            }
        }
        if let Some(audio) = &mut self.audio {
            audio.playlist.retain(|track| !track.file.is_empty());
            if audio.playlist.is_empty() {
                self.audio = None;
            }
        }
        if let Some(video) = &mut self.video {
            video.clips.retain(|clip| !clip.file.is_empty());
            if video.clips.is_empty() {
                self.video = None;
            }
        }
    }
}

/// Marker: the directory has been seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generic {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Html {
    /// File name of the page to open first.
    pub index: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub gallery: Vec<ImageEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub file: String,
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audio {
    pub cover: Option<String>,
    #[serde(default)]
    pub playlist: Vec<Track>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub file: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub genre: Option<String>,
    pub album: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub clips: Vec<Clip>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub file: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
}

/// Insert `entry` into a list kept sorted by file name, replacing the entry
/// for the same file if there is one.
pub(crate) fn upsert_by_file<T>(list: &mut Vec<T>, entry: T, file: impl Fn(&T) -> &str) {
    match list.binary_search_by(|probe| file(probe).cmp(file(&entry))) {
        Ok(index) => list[index] = entry,
        Err(index) => list.insert(index, entry),
    }
}
