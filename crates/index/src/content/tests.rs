use super::*;
use curator_storage::StorageBackend;
use curator_storage::backend::MockBackend;
use serde_json::json;
use std::sync::Arc;

fn descriptor(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

fn generic(title: &str) -> Vec<u8> {
    descriptor(json!({"title": title, "content": {"generic": {}}}))
}

async fn archive(files: Vec<(&str, Vec<u8>)>) -> (ContentArchive, Arc<MockBackend>) {
    let db = Database::connect_in_memory(Catalog::Content).await.unwrap();
    let backend = Arc::new(MockBackend::with_files(files));
    let archive =
        ContentArchive::new(&db, backend.clone(), vec![".contentinfo".to_string(), "info.json".to_string()]).unwrap();
    (archive, backend)
}

#[tokio::test]
async fn test_new_rejects_facets_database() {
    let db = Database::connect_in_memory(Catalog::Facets).await.unwrap();
    let err = ContentArchive::new(&db, Arc::new(MockBackend::default()), Vec::new()).err().unwrap();
    assert!(matches!(&*err, ErrorKind::BackendMisuse(_)));
}

#[tokio::test]
async fn test_add_and_get() {
    let (archive, _) = archive(vec![
        ("books/a/info.json", generic("Moby Dick")),
        ("books/a/cover.jpg", b"jpeg".to_vec()),
        ("books/b/notes.txt", b"no descriptor".to_vec()),
    ])
    .await;
    let added = archive.add_to_archive(["books/a", "books/b"]).await.unwrap();
    assert_eq!(added, 1);

    let record = archive.single("books/a").await.unwrap().unwrap();
    assert_eq!(record.title, "Moby Dick");
    assert_eq!(record.content_type, ContentType::GENERIC);
    assert_eq!(record.content, curator_metadata::Content::generic());
    assert_eq!(record.size, (generic("Moby Dick").len() + 4) as u64);
    assert_eq!(record.label(), "core");
    assert!(archive.single("books/b").await.unwrap().is_none());
    assert!(archive.last_update().await.unwrap().is_some());
}

#[tokio::test]
async fn test_missing_cover_is_dropped() {
    let (archive, _) = archive(vec![
        ("a/info.json", descriptor(json!({"title": "A", "cover": "cover.jpg", "thumbnail": "thumb.png", "content": {"generic": {}}}))),
        ("a/thumb.png", b"png".to_vec()),
    ])
    .await;
    archive.add_to_archive(["a"]).await.unwrap();
    let record = archive.single("a").await.unwrap().unwrap();
    assert_eq!(record.cover, None);
    assert_eq!(record.thumbnail.as_deref(), Some("thumb.png"));
}

#[tokio::test]
async fn test_replacement_removes_old_record() {
    let (archive, _) = archive(vec![
        ("old/info.json", generic("Edition 1")),
        ("new/info.json", descriptor(json!({"title": "Edition 2", "replaces": "old", "content": {"generic": {}}}))),
    ])
    .await;
    archive.add_to_archive(["old"]).await.unwrap();
    archive.add_to_archive(["new"]).await.unwrap();
    assert!(archive.single("old").await.unwrap().is_none());
    assert_eq!(archive.single("new").await.unwrap().unwrap().replaces.as_deref(), Some("old"));
    assert_eq!(archive.count(&ContentQuery::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_reingest_preserves_index_owned_fields() {
    let (archive, backend) = archive(vec![("a/info.json", generic("First"))]).await;
    archive.add_to_archive(["a"]).await.unwrap();
    assert!(archive.add_view("a").await.unwrap());
    archive.add_tags("a", &["science"]).await.unwrap();

    backend.write(Path::new("a/info.json"), &generic("Second")).await.unwrap();
    archive.add_to_archive(["a"]).await.unwrap();
    let record = archive.single("a").await.unwrap().unwrap();
    assert_eq!(record.title, "Second");
    assert_eq!(record.views, 1);
    assert_eq!(record.tags.keys().collect::<Vec<_>>(), ["science"]);
    assert!(!archive.add_view("missing").await.unwrap());
}

#[tokio::test]
async fn test_tags() {
    let (archive, _) = archive(vec![("a/info.json", generic("A")), ("b/info.json", generic("B"))]).await;
    archive.add_to_archive(["a", "b"]).await.unwrap();

    archive.add_tags("a", &["science", "history"]).await.unwrap();
    let tags = archive.add_tags("a", &["science"]).await.unwrap();
    assert_eq!(tags.len(), 2);
    archive.add_tags("b", &["science"]).await.unwrap();

    let cloud = archive.tag_cloud().await.unwrap();
    assert_eq!(cloud.iter().map(|t| (t.name.as_str(), t.count)).collect::<Vec<_>>(), [("science", 2), ("history", 1)]);
    assert_eq!(archive.tag_name(cloud[0].tag_id).await.unwrap().as_deref(), Some("science"));

    let science = ContentQuery { tag: Some(cloud[0].tag_id), ..ContentQuery::default() };
    assert_eq!(archive.count(&science).await.unwrap(), 2);

    let tags = archive.remove_tags("a", &["science"]).await.unwrap();
    assert_eq!(tags.keys().collect::<Vec<_>>(), ["history"]);
    assert_eq!(archive.single("a").await.unwrap().unwrap().tags, tags);

    let err = archive.add_tags("missing", &["x"]).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::ContentNotFound(path) if path == "missing"));
}

#[tokio::test]
async fn test_forget_removes_taggings() {
    let (archive, backend) = archive(vec![("a/info.json", generic("A"))]).await;
    archive.add_to_archive(["a"]).await.unwrap();
    archive.add_tags("a", &["science"]).await.unwrap();
    assert_eq!(archive.forget(["a", "missing"]).await.unwrap(), 1);
    assert!(archive.tag_cloud().await.unwrap().is_empty());
    assert!(backend.exists(Path::new("a/info.json")).await.unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn test_forget_continues_past_failures() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (archive, _) = archive(vec![("a/info.json", generic("A")), ("b/info.json", generic("B"))]).await;
    archive.add_to_archive(["a", "b"]).await.unwrap();
    // Not valid UTF-8, so it cannot be looked up at all.
    let unusable = PathBuf::from(OsStr::from_bytes(b"c\xff"));
    let paths = [PathBuf::from("a"), unusable, PathBuf::from("b")];
    assert_eq!(archive.forget(&paths).await.unwrap(), 2);
    assert_eq!(archive.count(&ContentQuery::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_remove_from_archive() {
    let (archive, backend) = archive(vec![("a/info.json", generic("A")), ("b/info.json", generic("B"))]).await;
    archive.add_to_archive(["a", "b"]).await.unwrap();
    // Files already gone must not keep the record alive.
    backend.remove(Path::new("b")).await.unwrap();
    assert_eq!(archive.remove_from_archive(["a", "b"]).await.unwrap(), 2);
    assert!(!backend.exists(Path::new("a")).await.unwrap());
    assert_eq!(archive.count(&ContentQuery::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_listing_filters() {
    let (archive, _) = archive(vec![
        (
            "a/info.json",
            descriptor(json!({"title": "Whales", "language": "en", "keywords": "ocean", "content": {"generic": {}}})),
        ),
        ("b/info.json", descriptor(json!({"title": "Baleines", "language": "fr", "content": {"generic": {}}}))),
        ("c/info.json", descriptor(json!({"title": "Tool", "content": {"app": {"version": "1.0"}}}))),
        (
            "d/info.json",
            descriptor(json!({"title": "Ocean sounds", "content": {"audio": {"playlist": [{"file": "a.mp3"}]}}})),
        ),
    ])
    .await;
    assert_eq!(archive.add_to_archive(["a", "b", "c", "d"]).await.unwrap(), 4);

    // App-only items stay out of mixed listings.
    let all = archive.content(&ContentQuery::default(), 0, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|record| record.path != "c"));

    let apps = ContentQuery { content_type: Some(ContentType::APP), ..ContentQuery::default() };
    let found = archive.content(&apps, 0, None).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].content.app.as_ref().and_then(|app| app.version.as_deref()), Some("1.0"));

    let ocean = ContentQuery { terms: Some("OCEAN".to_string()), ..ContentQuery::default() };
    assert_eq!(archive.count(&ocean).await.unwrap(), 2);
    let french = ContentQuery { lang: Some("fr".to_string()), ..ContentQuery::default() };
    assert_eq!(archive.content(&french, 0, None).await.unwrap()[0].title, "Baleines");
    assert_eq!(archive.content(&ContentQuery::default(), 1, Some(1)).await.unwrap().len(), 1);

    let mut languages = archive.content_languages().await.unwrap();
    languages.sort();
    assert_eq!(languages, ["en", "fr"]);
}

#[tokio::test]
async fn test_terms_match_wildcards_literally() {
    let (archive, _) = archive(vec![
        ("a/info.json", generic("100% Cotton")),
        ("b/info.json", generic("1000 Places")),
        ("c/info.json", generic("snake_case")),
        ("d/info.json", generic("Snake Case")),
    ])
    .await;
    archive.add_to_archive(["a", "b", "c", "d"]).await.unwrap();
    for (terms, expected) in [("100%", "a"), ("e_c", "c")] {
        let query = ContentQuery { terms: Some(terms.to_string()), ..ContentQuery::default() };
        let found = archive.content(&query, 0, None).await.unwrap();
        assert_eq!(found.iter().map(|record| record.path.as_str()).collect::<Vec<_>>(), [expected], "{terms}");
    }
}

#[tokio::test]
async fn test_multiple_and_replacement_data() {
    let (archive, _) = archive(vec![
        ("old/info.json", generic("Edition 1")),
        ("new/info.json", descriptor(json!({"title": "Edition 2", "replaces": "old", "content": {"generic": {}}}))),
    ])
    .await;
    let old = ContentRecord::from_descriptor(
        "old",
        curator_metadata::load(archive.backend.as_ref(), Path::new("old"), &archive.meta_filenames).await.unwrap(),
        0,
        OffsetDateTime::now_utc(),
    );
    // Keep the replaced record around, as a caller listing both would.
    archive.add_to_archive(["new"]).await.unwrap();
    archive.upsert(&old).await.unwrap();

    let mut records = archive.multiple(&["new".to_string(), "gone".to_string()], Some(&["title", "replaces"])).await.unwrap();
    assert_eq!(records.len(), 1);
    archive.add_replacement_data(&mut records, &["title"]).await.unwrap();
    assert_eq!(
        serde_json::Value::Object(records.remove(0)),
        json!({"path": "new", "title": "Edition 2", "replaces": "old", "replaces_title": "Edition 1"})
    );
}

#[tokio::test]
async fn test_content_for_domain() {
    let (archive, _) = archive(vec![
        ("a/info.json", descriptor(json!({"title": "A", "url": "http://www.example.com/a", "content": {"generic": {}}}))),
        ("b/info.json", descriptor(json!({"title": "B", "url": "https://notexample.com/b", "content": {"generic": {}}}))),
    ])
    .await;
    archive.add_to_archive(["a", "b"]).await.unwrap();
    let found = archive.content_for_domain("example.com").await.unwrap();
    assert_eq!(found.iter().map(|r| r.path.as_str()).collect::<Vec<_>>(), ["a"]);
    assert_eq!(archive.content_for_domain("www.example.com").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reload() {
    let (archive, backend) = archive(vec![
        ("books/a/info.json", generic("A")),
        ("books/b/.contentinfo", generic("B")),
        ("books/c/readme.txt", b"text".to_vec()),
    ])
    .await;
    assert_eq!(archive.find_content_dirs().await.unwrap(), [PathBuf::from("books/a"), PathBuf::from("books/b")]);
    assert_eq!(archive.reload_content().await.unwrap(), 2);

    backend.remove(Path::new("books/a")).await.unwrap();
    assert_eq!(archive.clear_and_reload().await.unwrap(), 1);
    assert_eq!(archive.count(&ContentQuery::default()).await.unwrap(), 1);
}

#[test]
fn test_url_host() {
    assert_eq!(url_host("http://www.Example.com:8080/a?b").as_deref(), Some("example.com"));
    assert_eq!(url_host("example.com").as_deref(), Some("example.com"));
    assert_eq!(url_host("https://user@sub.example.com/").as_deref(), Some("sub.example.com"));
    assert_eq!(url_host(""), None);
}
