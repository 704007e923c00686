use crate::error::Result;
use crate::models::Facets;
use crate::processor::{
    AudioProcessor, Context, FacetProcessor, GenericProcessor, HtmlProcessor, ImageProcessor, VideoProcessor,
};
use tracing::instrument;

/// The set of processors consulted for every file, in a fixed order.
pub struct Registry {
    processors: Vec<Box<dyn FacetProcessor>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(vec![
            Box::new(GenericProcessor),
            Box::new(HtmlProcessor),
            Box::new(ImageProcessor),
            Box::new(AudioProcessor),
            Box::new(VideoProcessor),
        ])
    }
}

impl Registry {
    pub fn new(processors: Vec<Box<dyn FacetProcessor>>) -> Self {
        Self { processors }
    }

    /// Every processor that wants to see `file`.
    pub fn for_file<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a dyn FacetProcessor> + 'a {
        self.processors.iter().map(|p| -> &'a dyn FacetProcessor { &**p }).filter(move |processor| processor.can_process(file))
    }

    pub async fn add_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str, partial: bool) -> Result<()> {
        for processor in self.for_file(file) {
            processor.add_file(cx, facets, file, partial).await?;
        }
        facets.prune();
        Ok(())
    }

    pub async fn update_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str, partial: bool) -> Result<()> {
        for processor in self.for_file(file) {
            processor.update_file(cx, facets, file, partial).await?;
        }
        facets.prune();
        Ok(())
    }

    pub async fn remove_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str) -> Result<()> {
        for processor in self.for_file(file) {
            processor.remove_file(cx, facets, file).await?;
        }
        facets.prune();
        Ok(())
    }

    /// Build the facets of a directory from scratch by adding every file it
    /// holds. Returns `None` for a directory without files.
    #[instrument(level = "debug", skip(self, cx), fields(dir = %cx.dir.display()))]
    pub async fn generate(&self, cx: &Context<'_>, partial: bool) -> Result<Option<Facets>> {
        let files = cx.files().await?;
        if files.is_empty() {
            return Ok(None);
        }
        let mut facets = Facets::new(cx.dir.to_string_lossy());
        for file in &files {
            self.add_file(cx, &mut facets, file, partial).await?;
        }
        tracing::debug!(files = files.len(), facet_types = ?facets.facet_types(), "Generated facets");
        Ok(Some(facets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Html, ImageEntry};
    use crate::processor::fixtures;
    use curator_metadata::ContentType;
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case("page.HTM", &["generic", "html"])]
    #[case("song.flac", &["generic", "audio"])]
    #[case("movie.mkv", &["generic", "video"])]
    #[case("photo.jpeg", &["generic", "image", "audio", "video"])]
    #[case("notes.txt", &["generic"])]
    fn test_dispatch(#[case] file: &str, #[case] expected: &[&str]) {
        let registry = Registry::default();
        let names: Vec<_> = registry.for_file(file).map(|p| p.name()).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_generate() {
        let backend = fixtures::backend(&["index.html", "a.jpg", "notes.txt"]);
        let probe = fixtures::probe(&[("a.jpg", fixtures::titled("A"))]);
        let cx = Context::new(&backend, &probe, Path::new("d"));
        let registry = Registry::default();

        let facets = registry.generate(&cx, false).await.unwrap().unwrap();
        assert_eq!(facets.path, "d");
        assert_eq!(facets.facet_types(), ContentType::GENERIC | ContentType::HTML | ContentType::IMAGE);
        assert_eq!(facets.html, Some(Html { index: "index.html".to_string() }));
        let gallery = &facets.image.as_ref().unwrap().gallery;
        assert_eq!(gallery, &[ImageEntry { file: "a.jpg".to_string(), title: Some("A".to_string()), ..ImageEntry::default() }]);

        let empty = Context::new(&backend, &probe, Path::new("nowhere"));
        assert_eq!(registry.generate(&empty, false).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_skips_probe() {
        let backend = fixtures::backend(&["a.jpg", "b.mp3"]);
        let probe = fixtures::probe(&[]);
        let cx = Context::new(&backend, &probe, Path::new("d"));
        let facets = Registry::default().generate(&cx, true).await.unwrap().unwrap();
        assert_eq!(probe.calls(), 0);
        assert_eq!(facets.facet_types(), ContentType::GENERIC | ContentType::IMAGE | ContentType::AUDIO);
    }
}
