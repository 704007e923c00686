use super::{Context, FacetProcessor, IMAGE_EXTENSIONS};
use crate::error::Result;
use crate::models::{Facets, Image, ImageEntry, upsert_by_file};
use async_trait::async_trait;

/// Keeps the gallery of a directory of pictures, ordered by file name.
pub struct ImageProcessor;

#[async_trait]
impl FacetProcessor for ImageProcessor {
    fn name(&self) -> &'static str {
        "image"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &IMAGE_EXTENSIONS
    }

    async fn add_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str, partial: bool) -> Result<()> {
        let mut entry = ImageEntry { file: file.to_string(), ..ImageEntry::default() };
        if !partial {
            let fragment = cx.fragment(file).await;
            entry.title = fragment.title;
            entry.width = fragment.width;
            entry.height = fragment.height;
        }
        let image = facets.image.get_or_insert_with(Image::default);
        upsert_by_file(&mut image.gallery, entry, |e| e.file.as_str());
        Ok(())
    }

    async fn remove_file(&self, _cx: &Context<'_>, facets: &mut Facets, file: &str) -> Result<()> {
        if let Some(image) = &mut facets.image {
            image.gallery.retain(|entry| entry.file != file);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Fragment;
    use crate::processor::fixtures;
    use std::path::Path;

    #[tokio::test]
    async fn test_gallery_lifecycle() {
        let backend = fixtures::backend(&["b.jpg", "a.png"]);
        let fragment = Fragment { title: Some("Harbour".to_string()), width: Some(640), height: Some(480), ..Fragment::default() };
        let probe = fixtures::probe(&[("a.png", fragment)]);
        let cx = Context::new(&backend, &probe, Path::new("d"));
        let mut facets = Facets::new("d");

        ImageProcessor.add_file(&cx, &mut facets, "b.jpg", true).await.unwrap();
        ImageProcessor.add_file(&cx, &mut facets, "a.png", false).await.unwrap();
        assert_eq!(probe.calls(), 1);
        let gallery = &facets.image.as_ref().unwrap().gallery;
        assert_eq!(
            gallery[0],
            ImageEntry { file: "a.png".to_string(), title: Some("Harbour".to_string()), width: Some(640), height: Some(480) }
        );
        assert_eq!(gallery[1], ImageEntry { file: "b.jpg".to_string(), ..ImageEntry::default() });

        // A failing probe still records the file.
        ImageProcessor.update_file(&cx, &mut facets, "b.jpg", false).await.unwrap();
        assert_eq!(facets.image.as_ref().unwrap().gallery.len(), 2);

        ImageProcessor.remove_file(&cx, &mut facets, "a.png").await.unwrap();
        ImageProcessor.remove_file(&cx, &mut facets, "b.jpg").await.unwrap();
        facets.prune();
        assert_eq!(facets.image, None);
    }
}
