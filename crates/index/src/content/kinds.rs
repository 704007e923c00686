//! Kind sub-records of content: one table per kind, plus one table per
//! kind-owned list. List rows remember their position in the descriptor.

use crate::error::{ErrorKind, Result};
use curator_metadata::{App, Audio, Clip, Content, ContentType, Generic, Html, Image, Picture, Track, Video};
use exn::ResultExt;
use sqlx::SqliteConnection;

/// Every table holding kind data, children included.
const TABLES: [&str; 9] = ["generic", "html", "video", "clips", "audio", "playlist", "image", "gallery", "app"];

fn position(index: usize) -> Result<i64> {
    i64::try_from(index).or_raise(|| ErrorKind::InvalidData("position"))
}

/// Delete every kind row of a record.
pub(crate) async fn clear(conn: &mut SqliteConnection, path: &str) -> Result<()> {
    for table in TABLES {
        sqlx::query(&format!("DELETE FROM {table} WHERE path = ?"))
            .bind(path)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    Ok(())
}

/// Write every populated kind of a record.
pub(crate) async fn insert(conn: &mut SqliteConnection, path: &str, content: &Content) -> Result<()> {
    if let Some(generic) = &content.generic {
        sqlx::query("INSERT INTO generic (path, description) VALUES (?, ?)")
            .bind(path)
            .bind(&generic.description)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    if let Some(html) = &content.html {
        sqlx::query(r#"INSERT INTO html (path, "index", keep_formatting, description) VALUES (?, ?, ?, ?)"#)
            .bind(path)
            .bind(&html.index)
            .bind(html.keep_formatting)
            .bind(&html.description)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    if let Some(video) = &content.video {
        sqlx::query("INSERT INTO video (path, description) VALUES (?, ?)")
            .bind(path)
            .bind(&video.description)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (index, clip) in video.clips.iter().enumerate() {
            sqlx::query(
                "INSERT INTO clips (path, position, file, title, description, duration, resolution) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(path)
            .bind(position(index)?)
            .bind(&clip.file)
            .bind(&clip.title)
            .bind(&clip.description)
            .bind(clip.duration)
            .bind(&clip.resolution)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        }
    }
    if let Some(audio) = &content.audio {
        sqlx::query("INSERT INTO audio (path, description) VALUES (?, ?)")
            .bind(path)
            .bind(&audio.description)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (index, track) in audio.playlist.iter().enumerate() {
            sqlx::query("INSERT INTO playlist (path, position, file, title, author, duration) VALUES (?, ?, ?, ?, ?, ?)")
                .bind(path)
                .bind(position(index)?)
                .bind(&track.file)
                .bind(&track.title)
                .bind(&track.author)
                .bind(track.duration)
                .execute(&mut *conn)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
    }
    if let Some(image) = &content.image {
        sqlx::query("INSERT INTO image (path, description) VALUES (?, ?)")
            .bind(path)
            .bind(&image.description)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (index, picture) in image.gallery.iter().enumerate() {
            sqlx::query(
                "INSERT INTO gallery (path, position, file, title, caption, thumbnail, resolution) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(path)
            .bind(position(index)?)
            .bind(&picture.file)
            .bind(&picture.title)
            .bind(&picture.caption)
            .bind(&picture.thumbnail)
            .bind(&picture.resolution)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        }
    }
    if let Some(app) = &content.app {
        sqlx::query("INSERT INTO app (path, version, description) VALUES (?, ?, ?)")
            .bind(path)
            .bind(&app.version)
            .bind(&app.description)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    Ok(())
}

type ClipRow = (String, Option<String>, Option<String>, Option<f64>, Option<String>);
type TrackRow = (String, Option<String>, Option<String>, Option<f64>);
type PictureRow = (String, Option<String>, Option<String>, Option<String>, Option<String>);

/// Load exactly the kinds named by `mask`. A kind whose row is missing is
/// left empty.
pub(crate) async fn load(conn: &mut SqliteConnection, path: &str, mask: ContentType) -> Result<Content> {
    let mut content = Content::default();
    if mask.contains(ContentType::GENERIC) {
        content.generic = sqlx::query_as::<_, (Option<String>,)>("SELECT description FROM generic WHERE path = ?")
            .bind(path)
            .fetch_optional(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?
            .map(|(description,)| Generic { description });
    }
    if mask.contains(ContentType::HTML) {
        content.html = sqlx::query_as::<_, (String, bool, Option<String>)>(
            r#"SELECT "index", keep_formatting, description FROM html WHERE path = ?"#,
        )
        .bind(path)
        .fetch_optional(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?
        .map(|(index, keep_formatting, description)| Html { index, keep_formatting, description });
    }
    if mask.contains(ContentType::VIDEO) {
        let description = description(conn, "video", path).await?;
        if let Some(description) = description {
            let clips: Vec<ClipRow> = sqlx::query_as(
                "SELECT file, title, description, duration, resolution FROM clips WHERE path = ? ORDER BY position",
            )
            .bind(path)
            .fetch_all(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
            let clips = clips
                .into_iter()
                .map(|(file, title, description, duration, resolution)| Clip { file, title, description, duration, resolution })
                .collect();
            content.video = Some(Video { description, clips });
        }
    }
    if mask.contains(ContentType::AUDIO) {
        let description = description(conn, "audio", path).await?;
        if let Some(description) = description {
            let playlist: Vec<TrackRow> =
                sqlx::query_as("SELECT file, title, author, duration FROM playlist WHERE path = ? ORDER BY position")
                    .bind(path)
                    .fetch_all(&mut *conn)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
            let playlist =
                playlist.into_iter().map(|(file, title, author, duration)| Track { file, title, author, duration }).collect();
            content.audio = Some(Audio { description, playlist });
        }
    }
    if mask.contains(ContentType::IMAGE) {
        let description = description(conn, "image", path).await?;
        if let Some(description) = description {
            let gallery: Vec<PictureRow> = sqlx::query_as(
                "SELECT file, title, caption, thumbnail, resolution FROM gallery WHERE path = ? ORDER BY position",
            )
            .bind(path)
            .fetch_all(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
            let gallery = gallery
                .into_iter()
                .map(|(file, title, caption, thumbnail, resolution)| Picture { file, title, caption, thumbnail, resolution })
                .collect();
            content.image = Some(Image { description, gallery });
        }
    }
    if mask.contains(ContentType::APP) {
        content.app = sqlx::query_as::<_, (Option<String>, Option<String>)>("SELECT version, description FROM app WHERE path = ?")
            .bind(path)
            .fetch_optional(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?
            .map(|(version, description)| App { version, description });
    }
    Ok(content)
}

/// `Some(description)` when the kind row exists (the description itself may
/// be null).
async fn description(conn: &mut SqliteConnection, table: &'static str, path: &str) -> Result<Option<Option<String>>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(&format!("SELECT description FROM {table} WHERE path = ?"))
        .bind(path)
        .fetch_optional(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(row.map(|(description,)| description))
}
