//! Facet processors.
//!
//! A processor owns one kind of a [`Facets`] record and keeps it current as
//! single files of the directory come and go. Which processors see a file is
//! decided by [`FacetProcessor::can_process`], normally on the extension.

mod audio;
mod generic;
mod html;
mod image;
mod video;

pub use self::audio::AudioProcessor;
pub use self::generic::GenericProcessor;
pub use self::html::HtmlProcessor;
pub use self::image::ImageProcessor;
pub use self::video::VideoProcessor;
use crate::error::{ErrorKind, Result};
use crate::models::Facets;
use crate::probe::{Fragment, Probe};
use async_trait::async_trait;
use curator_storage::StorageBackend;
use exn::ResultExt;
use std::path::{Path, PathBuf};

pub const HTML_EXTENSIONS: [&str; 2] = ["html", "htm"];
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];
pub const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "ogg", "oga", "flac", "wav", "m4a"];
pub const VIDEO_EXTENSIONS: [&str; 8] = ["mp4", "m4v", "webm", "ogv", "flv", "wmv", "mkv", "avi"];

/// Lowercased extension of a file name, without the dot (empty if none).
pub fn extension(file: &str) -> String {
    Path::new(file).extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default()
}

/// File name without its extension.
pub fn stem(file: &str) -> &str {
    Path::new(file).file_stem().and_then(|s| s.to_str()).unwrap_or(file)
}

pub(crate) fn is_image(file: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension(file).as_str())
}

/// Everything a processor may look at while updating one directory.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub backend: &'a dyn StorageBackend,
    pub probe: &'a dyn Probe,
    /// Directory being processed, relative to the content root.
    pub dir: &'a Path,
}

impl<'a> Context<'a> {
    pub fn new(backend: &'a dyn StorageBackend, probe: &'a dyn Probe, dir: &'a Path) -> Self {
        Self { backend, probe, dir }
    }

    pub fn file_path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Names of the files currently in the directory, sorted.
    pub async fn files(&self) -> Result<Vec<String>> {
        let listing = self.backend.list_dir(self.dir).await.or_raise(|| ErrorKind::Storage)?;
        Ok(listing.file_names().collect())
    }

    /// Probe one file. Extraction failures are logged and yield an empty
    /// fragment, so a single bad file never fails the directory.
    pub async fn fragment(&self, file: &str) -> Fragment {
        let path = self.file_path(file);
        match self.probe.probe(self.backend, &path).await {
            Ok(fragment) => fragment,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = ?err, "Could not extract file metadata");
                Fragment::default()
            },
        }
    }
}

/// Keeps one kind of facet current, file by file.
///
/// `partial` asks for the file identity only; detail fields that need the
/// probe are filled by a later full pass.
#[async_trait]
pub trait FacetProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extensions(&self) -> &'static [&'static str];

    fn can_process(&self, file: &str) -> bool {
        self.extensions().contains(&extension(file).as_str())
    }

    async fn add_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str, partial: bool) -> Result<()>;

    async fn remove_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str) -> Result<()>;

    /// A file that is already known has changed. Unless a processor knows
    /// better, this is the same as adding it again.
    async fn update_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str, partial: bool) -> Result<()> {
        self.add_file(cx, facets, file, partial).await
    }
}
