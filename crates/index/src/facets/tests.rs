use super::*;
use curator_facets::probe::MockProbe;
use curator_facets::{Audio, Clip, Fragment, Generic, Html, Image, ImageEntry, Track, Video};
use curator_storage::StorageBackend;
use curator_storage::backend::MockBackend;

struct Fixture {
    archive: FacetsArchive,
    backend: Arc<MockBackend>,
    probe: Arc<MockProbe>,
}

async fn fixture(files: &[&str]) -> Fixture {
    let db = Database::connect_in_memory(Catalog::Facets).await.unwrap();
    let backend = Arc::new(MockBackend::with_files(files.iter().map(|file| (*file, "data"))));
    let sunset = Fragment { title: Some("Sunset".to_string()), width: Some(640), height: Some(480), ..Fragment::default() };
    let probe = Arc::new(MockProbe::with_fragments([("d/a.jpg", sunset)]));
    let archive = FacetsArchive::new(&db, backend.clone(), probe.clone(), Arc::new(Registry::default())).unwrap();
    Fixture { archive, backend, probe }
}

fn sunset() -> ImageEntry {
    ImageEntry { file: "a.jpg".to_string(), title: Some("Sunset".to_string()), width: Some(640), height: Some(480) }
}

fn everything() -> Facets {
    Facets {
        generic: Some(Generic {}),
        html: Some(Html { index: "index.html".to_string() }),
        image: Some(Image { gallery: vec![sunset(), ImageEntry { file: "b.png".to_string(), ..ImageEntry::default() }] }),
        audio: Some(Audio {
            cover: Some("cover.jpg".to_string()),
            playlist: vec![
                Track { file: "01.mp3".to_string(), title: Some("Intro".to_string()), duration: Some(61.5), ..Track::default() },
                Track { file: "02.mp3".to_string(), genre: Some("Folk".to_string()), ..Track::default() },
            ],
        }),
        video: Some(Video {
            clips: vec![Clip {
                file: "talk.mp4".to_string(),
                width: Some(1280),
                height: Some(720),
                duration: Some(3600.0),
                thumbnail: Some("talk.jpg".to_string()),
                ..Clip::default()
            }],
        }),
        ..Facets::new("d")
    }
}

#[tokio::test]
async fn test_new_rejects_content_database() {
    let db = Database::connect_in_memory(Catalog::Content).await.unwrap();
    let err = FacetsArchive::new(&db, Arc::new(MockBackend::default()), Arc::new(MockProbe::default()), Arc::default())
        .err()
        .unwrap();
    assert!(matches!(&*err, ErrorKind::BackendMisuse(_)));
}

#[tokio::test]
async fn test_image_added_then_removed() {
    let f = fixture(&["d/a.jpg", "d/notes.txt"]).await;
    f.archive.update_facets("d/notes.txt", false).await.unwrap();
    f.archive.update_facets("d/a.jpg", false).await.unwrap();

    let facets = f.archive.get_facets("d").await.unwrap().unwrap();
    assert_eq!(facets.facet_types(), ContentType::GENERIC | ContentType::IMAGE);
    assert_eq!(facets.image.unwrap().gallery, [sunset()]);

    f.backend.remove(Path::new("d/a.jpg")).await.unwrap();
    f.archive.remove_facets("d/a.jpg").await.unwrap();
    let facets = f.archive.get_facets("d").await.unwrap().unwrap();
    assert_eq!(facets.image, None);
    assert_eq!(facets.facet_types(), ContentType::GENERIC);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gallery").fetch_one(&f.archive.pool).await.unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_last_file_removes_directory() {
    let f = fixture(&["d/a.jpg"]).await;
    f.archive.update_facets("d/a.jpg", false).await.unwrap();
    f.backend.remove(Path::new("d/a.jpg")).await.unwrap();
    let stats = f.archive.remove_facets("d/a.jpg").await.unwrap();
    // facets, generic, image and one gallery row.
    assert_eq!(stats, SyncStats { upserts: 0, deletes: 4 });
    assert_eq!(f.archive.get_facets("d").await.unwrap(), None);
    assert!(f.archive.remove_facets("d/a.jpg").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unchanged_update_writes_nothing() {
    let f = fixture(&["d/a.jpg"]).await;
    let first = f.archive.update_facets("d/a.jpg", false).await.unwrap();
    assert_eq!(first, SyncStats { upserts: 4, deletes: 0 });
    let second = f.archive.update_facets("d/a.jpg", false).await.unwrap();
    assert!(second.is_empty(), "{second:?}");
    assert_eq!(f.probe.calls(), 2);
}

#[tokio::test]
async fn test_round_trip() {
    let f = fixture(&[]).await;
    let original = everything();
    f.archive.save_facets(None, Some(&original)).await.unwrap();
    assert_eq!(f.archive.get_facets("d").await.unwrap().as_ref(), Some(&original));
    assert!(f.archive.save_facets(Some(&original), Some(&original)).await.unwrap().is_empty());

    let mut changed = original.clone();
    changed.html = None;
    changed.audio.as_mut().unwrap().playlist.remove(0);
    changed.video.as_mut().unwrap().clips[0].title = Some("Keynote".to_string());
    let stats = f.archive.save_facets(Some(&original), Some(&changed)).await.unwrap();
    // html row and first track go; the clip and the new facet_types are written.
    assert_eq!(stats, SyncStats { upserts: 2, deletes: 2 });
    assert_eq!(f.archive.get_facets("d").await.unwrap(), Some(changed));
}

#[tokio::test]
async fn test_partial_update_then_rebuild() {
    let f = fixture(&["d/a.jpg"]).await;
    f.archive.update_facets("d/a.jpg", true).await.unwrap();
    assert_eq!(f.probe.calls(), 0);
    let partial = f.archive.get_facets("d").await.unwrap().unwrap();
    assert_eq!(partial.image.unwrap().gallery[0].title, None);

    let stats = f.archive.rebuild("d").await.unwrap();
    assert_eq!(stats, SyncStats { upserts: 1, deletes: 0 });
    let full = f.archive.get_facets("d").await.unwrap().unwrap();
    assert_eq!(full.image.unwrap().gallery, [sunset()]);
}

#[tokio::test]
async fn test_html_index_follows_removal() {
    let f = fixture(&["d/index.html", "d/main.html"]).await;
    f.archive.update_facets("d/main.html", false).await.unwrap();
    f.archive.update_facets("d/index.html", false).await.unwrap();
    assert_eq!(f.archive.get_facets("d").await.unwrap().unwrap().html.unwrap().index, "index.html");

    f.backend.remove(Path::new("d/index.html")).await.unwrap();
    f.archive.remove_facets("d/index.html").await.unwrap();
    assert_eq!(f.archive.get_facets("d").await.unwrap().unwrap().html.unwrap().index, "main.html");
}

#[tokio::test]
async fn test_remove_dir() {
    let f = fixture(&[]).await;
    for path in ["a", "a/b", "ab"] {
        let facets = Facets { generic: Some(Generic {}), ..Facets::new(path) };
        f.archive.save_facets(None, Some(&facets)).await.unwrap();
    }
    assert_eq!(f.archive.remove_dir("a").await.unwrap(), 2);
    assert!(f.archive.get_facets("a/b").await.unwrap().is_none());
    assert!(f.archive.get_facets("ab").await.unwrap().is_some());
    assert_eq!(f.archive.remove_dir("").await.unwrap(), 1);
}

#[tokio::test]
async fn test_generate_does_not_store() {
    let f = fixture(&["d/a.jpg", "d/index.html"]).await;
    let generated = f.archive.generate("d", false).await.unwrap().unwrap();
    assert_eq!(generated.facet_types(), ContentType::GENERIC | ContentType::HTML | ContentType::IMAGE);
    assert_eq!(f.archive.get_facets("d").await.unwrap(), None);
    assert_eq!(f.archive.generate("empty", false).await.unwrap(), None);
}
