use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use lumen_core::{CatalogStore, InMemoryCatalog};
use lumen_model::{JobKind, Library, LibraryStats, MediaItem};
use lumen_server::{
    AppState, create_app,
    handlers::{
        browse::{PagedItems, SearchResults},
        libraries::RegenerateResponse,
        scan::ScanHistory,
    },
    infra::config::Config,
};
use serde_json::{Value, json};

struct Fixture {
    server: TestServer,
    state: AppState,
    catalog: InMemoryCatalog,
    media: PathBuf,
    tmp: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let media = tmp.path().join("media");
    std::fs::create_dir_all(&media).unwrap();

    let catalog = InMemoryCatalog::new();
    let mut config = Config::default();
    config.worker.thumb_dir = tmp.path().join("thumbs");
    let store: Arc<dyn CatalogStore> = Arc::new(catalog.clone());
    let state = AppState::from_config(store, Arc::new(config));

    Fixture {
        server: TestServer::new(create_app(state.clone())).unwrap(),
        state,
        catalog,
        media,
        tmp,
    }
}

impl Fixture {
    async fn library(&self) -> Library {
        let response = self
            .server
            .post("/api/libraries")
            .json(&json!({ "name": "home", "roots": [self.media] }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Library>()
    }

    /// Trigger a scan over HTTP and wait for its run to finish.
    async fn scan(&self, library: &Library) {
        let before = self.catalog.list_scan_runs(library.id).await.unwrap().len();
        self.server
            .post("/api/scan")
            .add_query_param("library_id", library.id)
            .await
            .assert_status(StatusCode::ACCEPTED);

        for _ in 0..200 {
            let runs = self.catalog.list_scan_runs(library.id).await.unwrap();
            if runs.len() > before
                && runs.iter().all(|run| run.is_finished())
                && !self.state.scans().is_running(library.id)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("scan did not finish");
    }

    async fn item(&self, path: &Path) -> MediaItem {
        self.catalog.get_item_by_path(path).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let f = fixture();
    let response = f.server.get("/healthz").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn library_crud() {
    let f = fixture();
    let library = f.library().await;
    assert_eq!(library.name, "home");
    assert_eq!(library.roots, vec![f.media.clone()]);

    let listed = f.server.get("/api/libraries").await.json::<Vec<Library>>();
    assert_eq!(listed.len(), 1);

    f.server
        .get(&format!("/api/libraries/{}", library.id))
        .await
        .assert_status_ok();

    f.server
        .delete(&format!("/api/libraries/{}", library.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let missing = f.server.get(&format!("/api/libraries/{}", library.id)).await;
    missing.assert_status_not_found();
    assert_eq!(missing.json::<Value>()["error"]["status"], 404);
}

#[tokio::test]
async fn library_validation() {
    let f = fixture();
    f.server
        .post("/api/libraries")
        .json(&json!({ "name": " ", "roots": ["/media"] }))
        .await
        .assert_status_bad_request();
    f.server
        .post("/api/libraries")
        .json(&json!({ "name": "x", "roots": [] }))
        .await
        .assert_status_bad_request();
    f.server
        .post("/api/libraries")
        .json(&json!({ "name": "x", "roots": ["relative/path"] }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn scan_trigger_indexes_and_reports_stats() {
    let f = fixture();
    std::fs::write(f.media.join("a.jpg"), b"jpeg").unwrap();
    std::fs::write(f.media.join("b.mp4"), b"video!").unwrap();
    std::fs::write(f.media.join("c.mp3"), b"mp3").unwrap();
    let library = f.library().await;

    f.scan(&library).await;

    let stats = f
        .server
        .get(&format!("/api/libraries/{}/stats", library.id))
        .await
        .json::<LibraryStats>();
    assert_eq!(stats.total_items, 3);
    assert_eq!(stats.photo_count, 1);
    assert_eq!(stats.video_count, 1);
    assert_eq!(stats.audio_count, 1);
    assert_eq!(stats.total_size, 13);
    assert_eq!(stats.missing_thumbs, 2);

    let history = f
        .server
        .get(&format!("/api/libraries/{}/scans", library.id))
        .await
        .json::<ScanHistory>();
    assert!(!history.running);
    assert_eq!(history.runs.len(), 1);
}

#[tokio::test]
async fn scan_of_unknown_library_is_404() {
    let f = fixture();
    f.server
        .post("/api/scan")
        .add_query_param("library_id", lumen_model::LibraryId::new())
        .await
        .assert_status_not_found();
    f.server
        .post("/api/scan")
        .add_query_param("library_id", "not-a-uuid")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn regenerate_thumbs_counts_queued_jobs() {
    let f = fixture();
    std::fs::write(f.media.join("a.jpg"), b"jpeg").unwrap();
    std::fs::write(f.media.join("b.mkv"), b"video").unwrap();
    let library = f.library().await;
    f.scan(&library).await;

    let response = f
        .server
        .post(&format!("/api/libraries/{}/regenerate-thumbs", library.id))
        .add_query_param("video_only", true)
        .await;
    response.assert_status_ok();
    let body = response.json::<RegenerateResponse>();
    assert!(body.success);
    assert!(body.video_only);
    assert_eq!(body.items_reset, 1);
    // The scan already queued both; regeneration does not duplicate.
    assert_eq!(body.jobs_queued, 2);
    assert_eq!(f.catalog.count_unlocked_jobs(JobKind::Thumb).await.unwrap(), 2);
}

#[tokio::test]
async fn stream_serves_full_and_ranged_bodies() {
    let f = fixture();
    let clip = f.media.join("clip.mp4");
    std::fs::write(&clip, b"0123456789").unwrap();
    let library = f.library().await;
    f.scan(&library).await;
    let item = f.item(&clip).await;
    let url = format!("/api/items/{}/stream", item.id);

    let full = f.server.get(&url).await;
    full.assert_status_ok();
    assert_eq!(full.as_bytes().as_ref(), b"0123456789");
    assert_eq!(full.header("accept-ranges"), "bytes");
    assert_eq!(full.header("content-type"), "video/mp4");
    assert!(full.headers().contains_key("last-modified"));

    let partial = f.server.get(&url).add_header("range", "bytes=2-5").await;
    partial.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(partial.as_bytes().as_ref(), b"2345");
    assert_eq!(partial.header("content-range"), "bytes 2-5/10");
    assert_eq!(partial.header("content-length"), "4");

    let suffix = f.server.get(&url).add_header("range", "bytes=-3").await;
    suffix.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(suffix.as_bytes().as_ref(), b"789");

    let open_ended = f.server.get(&url).add_header("range", "bytes=7-").await;
    assert_eq!(open_ended.as_bytes().as_ref(), b"789");
    assert_eq!(open_ended.header("content-range"), "bytes 7-9/10");

    let bad = f.server.get(&url).add_header("range", "bytes=20-30").await;
    bad.assert_status(StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(bad.header("content-range"), "bytes */10");

    let foreign = f.server.get(&url).add_header("range", "items=0-1").await;
    foreign.assert_status_ok();
    assert_eq!(foreign.as_bytes().len(), 10);
}

#[tokio::test]
async fn stream_of_vanished_file_is_404_and_marks_missing() {
    let f = fixture();
    let clip = f.media.join("clip.mp4");
    std::fs::write(&clip, b"0123456789").unwrap();
    let library = f.library().await;
    f.scan(&library).await;
    let item = f.item(&clip).await;

    std::fs::remove_file(&clip).unwrap();
    f.server
        .get(&format!("/api/items/{}/stream", item.id))
        .await
        .assert_status_not_found();

    let after = f
        .server
        .get(&format!("/api/items/{}", item.id))
        .await
        .json::<MediaItem>();
    assert!(!after.present);
    assert!(after.missing_since.is_some());
}

#[tokio::test]
async fn thumbnail_is_served_once_generated() {
    let f = fixture();
    let photo = f.media.join("a.jpg");
    std::fs::write(&photo, b"jpeg").unwrap();
    let library = f.library().await;
    f.scan(&library).await;
    let item = f.item(&photo).await;
    let url = format!("/api/items/{}/thumb", item.id);

    f.server.get(&url).await.assert_status_not_found();

    let thumb = f.tmp.path().join("thumbs").join(format!("{}.jpg", item.id));
    std::fs::create_dir_all(thumb.parent().unwrap()).unwrap();
    std::fs::write(&thumb, b"\xFF\xD8thumb").unwrap();
    let job = f.catalog.jobs_for_item(item.id).await.unwrap().remove(0);
    f.catalog
        .complete_thumb_job(job.id, item.id, &thumb)
        .await
        .unwrap();

    let response = f.server.get(&url).await;
    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "image/jpeg");
    assert_eq!(response.as_bytes().as_ref(), b"\xFF\xD8thumb");
}

#[tokio::test]
async fn malformed_ids_are_rejected() {
    let f = fixture();
    f.server
        .get("/api/items/not-a-uuid")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn running_scan_blocks_second_trigger_and_delete() {
    let f = fixture();
    let library = f.library().await;
    let guard = f.state.scans().try_begin(library.id).unwrap();

    let again = f
        .server
        .post("/api/scan")
        .add_query_param("library_id", library.id)
        .await;
    again.assert_status(StatusCode::CONFLICT);
    assert_eq!(again.json::<Value>()["error"]["status"], 409);

    f.server
        .delete(&format!("/api/libraries/{}", library.id))
        .await
        .assert_status(StatusCode::CONFLICT);
    assert!(f.catalog.get_library(library.id).await.unwrap().is_some());

    drop(guard);
    f.server
        .delete(&format!("/api/libraries/{}", library.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

/// A scanned library with nested folders and one file that has vanished.
async fn browsable(f: &Fixture) -> Library {
    std::fs::create_dir_all(f.media.join("2024/june")).unwrap();
    std::fs::create_dir_all(f.media.join("music")).unwrap();
    std::fs::write(f.media.join("b.jpg"), b"b").unwrap();
    std::fs::write(f.media.join("2024/beach.mp4"), b"clip").unwrap();
    std::fs::write(f.media.join("2024/june/Beach_01.jpg"), b"photo").unwrap();
    std::fs::write(f.media.join("2024/gone.jpg"), b"gone").unwrap();
    std::fs::write(f.media.join("music/song.mp3"), b"song").unwrap();
    let library = f.library().await;
    f.scan(&library).await;
    std::fs::remove_file(f.media.join("2024/gone.jpg")).unwrap();
    f.scan(&library).await;
    library
}

fn rels(items: &[MediaItem]) -> Vec<&str> {
    items.iter().map(|item| item.rel_path.as_str()).collect()
}

#[tokio::test]
async fn items_are_paged_filtered_and_sorted() {
    let f = fixture();
    let library = browsable(&f).await;

    let all = f
        .server
        .get("/api/items")
        .add_query_param("library_id", library.id)
        .add_query_param("sort", "name")
        .add_query_param("page_size", 3)
        .await
        .json::<PagedItems>();
    assert_eq!(all.total, 4);
    assert_eq!((all.page, all.page_size), (1, 3));
    assert_eq!(
        rels(&all.items),
        ["2024/beach.mp4", "2024/june/Beach_01.jpg", "b.jpg"]
    );

    let second = f
        .server
        .get("/api/items")
        .add_query_param("library_id", library.id)
        .add_query_param("sort", "name")
        .add_query_param("page", 2)
        .add_query_param("page_size", 3)
        .await
        .json::<PagedItems>();
    assert_eq!(second.page, 2);
    assert_eq!(rels(&second.items), ["music/song.mp3"]);

    let photos = f
        .server
        .get("/api/items")
        .add_query_param("library_id", library.id)
        .add_query_param("kind", "photo")
        .add_query_param("q", "beach")
        .await
        .json::<PagedItems>();
    assert_eq!(rels(&photos.items), ["2024/june/Beach_01.jpg"]);

    f.server
        .get("/api/items")
        .await
        .assert_status_bad_request();
    f.server
        .get("/api/items")
        .add_query_param("library_id", library.id)
        .add_query_param("sort", "size")
        .await
        .assert_status_bad_request();
    f.server
        .get("/api/items")
        .add_query_param("library_id", lumen_model::LibraryId::new())
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn folders_browse_present_children() {
    let f = fixture();
    let library = browsable(&f).await;

    let root = f
        .server
        .get("/api/folders")
        .add_query_param("library_id", library.id)
        .await
        .json::<Value>();
    assert_eq!(root["folders"], json!(["2024", "music"]));
    assert_eq!(root["items"].as_array().unwrap().len(), 1);
    assert_eq!(root["items"][0]["rel_path"], "b.jpg");

    let year = f
        .server
        .get("/api/folders")
        .add_query_param("library_id", library.id)
        .add_query_param("path", "/2024/")
        .await
        .json::<Value>();
    assert_eq!(year["folders"], json!(["june"]));
    let items: Vec<MediaItem> = serde_json::from_value(year["items"].clone()).unwrap();
    assert_eq!(rels(&items), ["2024/beach.mp4"]);
}

#[tokio::test]
async fn search_and_recent() {
    let f = fixture();
    let library = browsable(&f).await;

    let found = f
        .server
        .get("/api/search")
        .add_query_param("q", "*.JPG")
        .await
        .json::<SearchResults>();
    assert_eq!(rels(&found.by_filename), ["2024/june/Beach_01.jpg", "b.jpg"]);

    let blank = f
        .server
        .get("/api/search")
        .add_query_param("q", "  ")
        .await
        .json::<SearchResults>();
    assert!(blank.by_filename.is_empty());

    let recent = f
        .server
        .get("/api/recent")
        .add_query_param("library_id", library.id)
        .add_query_param("limit", 2)
        .await
        .json::<Vec<MediaItem>>();
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|item| item.present));
    assert!(recent[0].created_at >= recent[1].created_at);
}
