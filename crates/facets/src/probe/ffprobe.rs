use super::{Fragment, Probe};
use crate::error::{ErrorKind, Result};
use crate::processor::{IMAGE_EXTENSIONS, extension};
use async_trait::async_trait;
use curator_storage::StorageBackend;
use exn::{OptionExt, ResultExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::instrument;

const TITLE_TAGS: [&str; 2] = ["title", "ImageDescription"];
const AUTHOR_TAGS: [&str; 2] = ["author", "artist"];
const DESCRIPTION_TAGS: [&str; 2] = ["description", "comment"];

/// Runs `ffprobe` against local files.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }

    /// Use the configured binary if there is one, otherwise look for
    /// `ffprobe` on `PATH`.
    pub fn discover(configured: Option<&Path>, timeout: Duration) -> Result<Self> {
        if let Some(binary) = configured {
            return Ok(Self::new(binary, timeout));
        }
        match which::which("ffprobe") {
            Ok(binary) => {
                tracing::debug!(ffprobe = %binary.display(), "Discovered ffprobe on system");
                Ok(Self::new(binary, timeout))
            },
            Err(_) => {
                tracing::info!("ffprobe executable not found in PATH");
                exn::bail!(ErrorKind::ProbeNotFound);
            },
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl Probe for FfprobeProbe {
    #[instrument(level = "trace", skip(self, backend), fields(path = %path.display()))]
    async fn probe(&self, backend: &dyn StorageBackend, path: &Path) -> Result<Fragment> {
        let local = backend.local_path(path).ok_or_raise(|| ErrorKind::NotLocal(path.to_path_buf()))?;
        // Still images carry their tags on the (single) frame.
        let entries = match IMAGE_EXTENSIONS.contains(&extension(&path.to_string_lossy()).as_str()) {
            true => "frames",
            false => "format:streams",
        };
        let mut command = Command::new(&self.binary);
        command
            .args(["-v", "quiet", "-i"])
            .arg(&local)
            .args(["-show_entries", entries, "-print_format", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        // Dropping the output future on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .or_raise(|| ErrorKind::ProbeTimeout)?
            .or_raise(|| ErrorKind::Io)?;
        if !output.status.success() {
            exn::bail!(ErrorKind::ProbeFailed(output.status.code().unwrap_or(-1)));
        }
        let data: Value = serde_json::from_slice(&output.stdout).or_raise(|| ErrorKind::ProbeOutput)?;
        Ok(parse_ffprobe(&data))
    }
}

fn sections(data: &Value) -> impl Iterator<Item = &Value> {
    let list = |key: &str| data.get(key).and_then(Value::as_array).into_iter().flatten();
    data.get("format").into_iter().chain(list("streams")).chain(list("frames"))
}

/// First tag, in section order, matching any of `names` (case-insensitively).
fn find_tag(data: &Value, names: &[&str]) -> Option<String> {
    sections(data).filter_map(|section| section.get("tags").and_then(Value::as_object)).find_map(|tags| {
        names.iter().find_map(|name| {
            tags.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .and_then(|(_, value)| value.as_str())
                .map(str::to_string)
        })
    })
}

/// ffprobe reports numbers as strings in some places and as numbers in
/// others.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn duration(data: &Value) -> Option<f64> {
    if let Some(duration) = data.get("format").and_then(|f| f.get("duration")).and_then(number) {
        return Some(duration);
    }
    sections(data).filter_map(|s| s.get("duration").and_then(number)).reduce(f64::max)
}

fn dimensions(data: &Value) -> (Option<u32>, Option<u32>) {
    let dimension = |section: &Value, key: &str| section.get(key).and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok());
    sections(data)
        .find_map(|section| Some((dimension(section, "width")?, dimension(section, "height")?)))
        .map_or((None, None), |(width, height)| (Some(width), Some(height)))
}

/// Build a [`Fragment`] from the JSON that ffprobe prints.
pub fn parse_ffprobe(data: &Value) -> Fragment {
    let (width, height) = dimensions(data);
    Fragment {
        title: find_tag(data, &TITLE_TAGS),
        width,
        height,
        duration: duration(data),
        author: find_tag(data, &AUTHOR_TAGS),
        description: find_tag(data, &DESCRIPTION_TAGS),
        genre: find_tag(data, &["genre"]),
        album: find_tag(data, &["album"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_storage::backend::MockBackend;
    use serde_json::json;

    #[test]
    fn test_parse_audio() {
        let data = json!({
            "streams": [{"codec_type": "audio", "duration": "181.2"}],
            "format": {
                "duration": "181.224",
                "tags": {"TITLE": "Song", "ARTIST": "Band", "GENRE": "Folk", "album": "Live", "comment": "demo"},
            },
        });
        let fragment = parse_ffprobe(&data);
        assert_eq!(fragment.title.as_deref(), Some("Song"));
        assert_eq!(fragment.author.as_deref(), Some("Band"));
        assert_eq!(fragment.description.as_deref(), Some("demo"));
        assert_eq!(fragment.genre.as_deref(), Some("Folk"));
        assert_eq!(fragment.album.as_deref(), Some("Live"));
        assert_eq!(fragment.duration, Some(181.224));
        assert_eq!((fragment.width, fragment.height), (None, None));
    }

    #[test]
    fn test_parse_video_falls_back_to_longest_stream() {
        let data = json!({
            "streams": [
                {"codec_type": "audio", "duration": "10.0"},
                {"codec_type": "video", "width": 1280, "height": 720, "duration": "12.5"},
            ],
            "format": {"tags": {"author": "Someone"}},
        });
        let fragment = parse_ffprobe(&data);
        assert_eq!(fragment.duration, Some(12.5));
        assert_eq!((fragment.width, fragment.height), (Some(1280), Some(720)));
        assert_eq!(fragment.author.as_deref(), Some("Someone"));
        assert_eq!(fragment.title, None);
    }

    #[test]
    fn test_parse_image_frame() {
        let data = json!({"frames": [{"width": 640, "height": 480, "tags": {"ImageDescription": "Harbour"}}]});
        let fragment = parse_ffprobe(&data);
        assert_eq!(fragment.title.as_deref(), Some("Harbour"));
        assert_eq!((fragment.width, fragment.height), (Some(640), Some(480)));
    }

    #[tokio::test]
    async fn test_rejects_files_without_local_path() {
        let probe = FfprobeProbe::new("/nonexistent/ffprobe", Duration::from_secs(1));
        let backend = MockBackend::with_files([("d/a.mp3", "ID3")]);
        let err = probe.probe(&backend, Path::new("d/a.mp3")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotLocal(_)));
        assert!(err.is_extraction());
    }

    #[test]
    fn test_discover_prefers_configured_binary() {
        let probe = FfprobeProbe::discover(Some(Path::new("/opt/ffprobe")), Duration::from_secs(5)).unwrap();
        assert_eq!(probe.binary(), Path::new("/opt/ffprobe"));
    }
}
