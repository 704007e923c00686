use super::{Context, FacetProcessor, HTML_EXTENSIONS, extension, stem};
use crate::error::Result;
use crate::models::{Facets, Html};
use async_trait::async_trait;

/// Page names that make a good entry point, best first.
const INDEX_NAMES: [&str; 3] = ["index", "main", "start"];

/// Tracks the page to open first in a directory of HTML pages.
pub struct HtmlProcessor;

impl HtmlProcessor {
    /// Best entry point among `files`: a well-known page name if there is
    /// one, otherwise the first page.
    fn choose_index<'a>(files: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        let pages: Vec<&str> = files.into_iter().filter(|f| HTML_EXTENSIONS.contains(&extension(f).as_str())).collect();
        INDEX_NAMES
            .iter()
            .find_map(|name| pages.iter().find(|page| stem(page).eq_ignore_ascii_case(name)).copied())
            .or_else(|| pages.first().copied())
    }

    async fn find_index(cx: &Context<'_>, facets: &mut Facets, exclude: Option<&str>) -> Result<()> {
        let files = cx.files().await?;
        let index = Self::choose_index(files.iter().map(String::as_str).filter(|file| Some(*file) != exclude));
        tracing::trace!(dir = %cx.dir.display(), index = ?index, "Chose HTML index");
        facets.html = index.map(|index| Html { index: index.to_string() });
        Ok(())
    }
}

#[async_trait]
impl FacetProcessor for HtmlProcessor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &HTML_EXTENSIONS
    }

    async fn add_file(&self, cx: &Context<'_>, facets: &mut Facets, _file: &str, _partial: bool) -> Result<()> {
        let settled = facets.html.as_ref().is_some_and(|html| stem(&html.index).eq_ignore_ascii_case(INDEX_NAMES[0]));
        if settled {
            return Ok(());
        }
        Self::find_index(cx, facets, None).await
    }

    async fn remove_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str) -> Result<()> {
        if facets.html.as_ref().is_some_and(|html| html.index == file) {
            facets.html = None;
            Self::find_index(cx, facets, Some(file)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::fixtures;
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case(&["about.html", "main.htm", "start.html"], Some("main.htm"))]
    #[case(&["start.html", "INDEX.HTML", "main.html"], Some("INDEX.HTML"))]
    #[case(&["b.html", "a.html", "style.css"], Some("b.html"))]
    #[case(&["style.css", "index.txt"], None)]
    fn test_choose_index(#[case] files: &[&str], #[case] expected: Option<&str>) {
        assert_eq!(HtmlProcessor::choose_index(files.iter().copied()), expected);
    }

    #[tokio::test]
    async fn test_recomputes_index_on_removal() {
        let backend = fixtures::backend(&["index.html", "main.html", "other.html"]);
        let probe = fixtures::probe(&[]);
        let cx = Context::new(&backend, &probe, Path::new("d"));
        let mut facets = Facets::new("d");
        HtmlProcessor.add_file(&cx, &mut facets, "main.html", false).await.unwrap();
        assert_eq!(facets.html, Some(Html { index: "index.html".to_string() }));

        HtmlProcessor.remove_file(&cx, &mut facets, "other.html").await.unwrap();
        assert_eq!(facets.html, Some(Html { index: "index.html".to_string() }));

        // The event arrives while the listing may still show the file.
        HtmlProcessor.remove_file(&cx, &mut facets, "index.html").await.unwrap();
        assert_eq!(facets.html, Some(Html { index: "main.html".to_string() }));
    }
}
