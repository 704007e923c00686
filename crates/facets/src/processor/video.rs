use super::{Context, FacetProcessor, VIDEO_EXTENSIONS, extension, is_image, stem};
use crate::error::Result;
use crate::models::{Clip, Facets, Video, upsert_by_file};
use async_trait::async_trait;

/// Keeps the clip list of a directory of videos. A picture sharing a clip's
/// file stem is that clip's thumbnail.
pub struct VideoProcessor;

impl VideoProcessor {
    async fn find_thumbnail(cx: &Context<'_>, file: &str) -> Result<Option<String>> {
        let files = cx.files().await?;
        Ok(files.into_iter().find(|candidate| is_image(candidate) && stem(candidate) == stem(file)))
    }
}

#[async_trait]
impl FacetProcessor for VideoProcessor {
    fn name(&self) -> &'static str {
        "video"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &VIDEO_EXTENSIONS
    }

    fn can_process(&self, file: &str) -> bool {
        VIDEO_EXTENSIONS.contains(&extension(file).as_str()) || is_image(file)
    }

    async fn add_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str, partial: bool) -> Result<()> {
        if is_image(file) {
            if let Some(clip) = facets.video.iter_mut().flat_map(|v| v.clips.iter_mut()).find(|c| stem(&c.file) == stem(file)) {
                clip.thumbnail = Some(file.to_string());
            }
            return Ok(());
        }
        let mut clip = Clip { file: file.to_string(), ..Clip::default() };
        if !partial {
            let fragment = cx.fragment(file).await;
            clip.title = fragment.title;
            clip.author = fragment.author;
            clip.description = fragment.description;
            clip.width = fragment.width;
            clip.height = fragment.height;
            clip.duration = fragment.duration;
        }
        clip.thumbnail = Self::find_thumbnail(cx, file).await?;
        let video = facets.video.get_or_insert_with(Video::default);
        upsert_by_file(&mut video.clips, clip, |c| c.file.as_str());
        Ok(())
    }

    async fn remove_file(&self, _cx: &Context<'_>, facets: &mut Facets, file: &str) -> Result<()> {
        let Some(video) = &mut facets.video else {
            return Ok(());
        };
        match is_image(file) {
            true => video.clips.iter_mut().filter(|c| c.thumbnail.as_deref() == Some(file)).for_each(|c| c.thumbnail = None),
            false => video.clips.retain(|clip| clip.file != file),
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
    async fn test_clips_and_thumbnails() {
        let backend = fixtures::backend(&["talk.mp4", "talk.jpg", "demo.webm"]);
        let fragment = Fragment {
            title: Some("Talk".to_string()),
            width: Some(1280),
            height: Some(720),
            duration: Some(300.0),
            description: Some("A talk".to_string()),
            ..Fragment::default()
        };
        let probe = fixtures::probe(&[("talk.mp4", fragment)]);
        let cx = Context::new(&backend, &probe, Path::new("d"));
        let mut facets = Facets::new("d");

        VideoProcessor.add_file(&cx, &mut facets, "talk.mp4", false).await.unwrap();
        VideoProcessor.add_file(&cx, &mut facets, "demo.webm", true).await.unwrap();
        let clips = &facets.video.as_ref().unwrap().clips;
        assert_eq!(clips[0], Clip { file: "demo.webm".to_string(), ..Clip::default() });
        assert_eq!(clips[1].thumbnail.as_deref(), Some("talk.jpg"));
        assert_eq!((clips[1].width, clips[1].height), (Some(1280), Some(720)));
        assert_eq!(clips[1].description.as_deref(), Some("A talk"));

        VideoProcessor.remove_file(&cx, &mut facets, "talk.jpg").await.unwrap();
        assert_eq!(facets.video.as_ref().unwrap().clips[1].thumbnail, None);
        VideoProcessor.add_file(&cx, &mut facets, "talk.jpg", false).await.unwrap();
        assert_eq!(facets.video.as_ref().unwrap().clips[1].thumbnail.as_deref(), Some("talk.jpg"));

        VideoProcessor.remove_file(&cx, &mut facets, "talk.mp4").await.unwrap();
        VideoProcessor.remove_file(&cx, &mut facets, "demo.webm").await.unwrap();
        facets.prune();
        assert_eq!(facets.video, None);
    }
}
