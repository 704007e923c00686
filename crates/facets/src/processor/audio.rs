use super::{AUDIO_EXTENSIONS, Context, FacetProcessor, extension, is_image, stem};
use crate::error::Result;
use crate::models::{Audio, Facets, Track, upsert_by_file};
use async_trait::async_trait;

/// Name fragments that make an image a good album cover, best first.
const COVER_NAMES: [&str; 3] = ["cover", "album", "art"];

/// Keeps the playlist of a directory of audio files, plus the picture that
/// best serves as its cover. Image files are watched for the cover only.
pub struct AudioProcessor;

impl AudioProcessor {
    fn choose_cover<'a>(files: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        let images: Vec<&str> = files.into_iter().filter(|file| is_image(file)).collect();
        COVER_NAMES.iter().find_map(|name| images.iter().find(|image| stem(image).to_lowercase().contains(name)).copied())
    }

    async fn refresh_cover(cx: &Context<'_>, audio: &mut Audio, exclude: Option<&str>) -> Result<()> {
        let files = cx.files().await?;
        let cover = Self::choose_cover(files.iter().map(String::as_str).filter(|file| Some(*file) != exclude));
        audio.cover = cover.map(str::to_string);
        Ok(())
    }
}

#[async_trait]
impl FacetProcessor for AudioProcessor {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &AUDIO_EXTENSIONS
    }

    fn can_process(&self, file: &str) -> bool {
        AUDIO_EXTENSIONS.contains(&extension(file).as_str()) || is_image(file)
    }

    async fn add_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str, partial: bool) -> Result<()> {
        if is_image(file) {
            // A new picture can only matter to an existing playlist.
            if let Some(audio) = &mut facets.audio {
                Self::refresh_cover(cx, audio, None).await?;
            }
            return Ok(());
        }
        let mut track = Track { file: file.to_string(), ..Track::default() };
        if !partial {
            let fragment = cx.fragment(file).await;
            track.author = fragment.author;
            track.title = fragment.title;
            track.duration = fragment.duration;
            track.genre = fragment.genre;
            track.album = fragment.album;
        }
        let audio = facets.audio.get_or_insert_with(Audio::default);
        upsert_by_file(&mut audio.playlist, track, |t| t.file.as_str());
        if audio.cover.is_none() {
            Self::refresh_cover(cx, audio, None).await?;
        }
        Ok(())
    }

    async fn remove_file(&self, cx: &Context<'_>, facets: &mut Facets, file: &str) -> Result<()> {
        let Some(audio) = &mut facets.audio else {
            return Ok(());
        };
        if is_image(file) {
            if audio.cover.as_deref() == Some(file) {
                Self::refresh_cover(cx, audio, Some(file)).await?;
            }
            return Ok(());
        }
        audio.playlist.retain(|track| track.file != file);
        if audio.playlist.is_empty() {
            facets.audio = None;
        }
        Ok(())
    }
}
