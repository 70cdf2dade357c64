//! Full syncs against mocked FurAffinity pages

use crate::common::{png_bytes, write_config};
use favsync::model::Provider;
use favsync::storage::{open_storage, RunStatus, Storage};
use favsync::sync::{rebuild_thumbnails, run_sync, StopReason};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOKIE: &str = "a=cookie-a; b=cookie-b";

fn furaffinity_section(server: &MockServer) -> String {
    format!(
        r#"
[furaffinity]
username = "someone"
cookie-a = "cookie-a"
cookie-b = "cookie-b"
base-url = "{}"
listing-retry = {{ attempts = 2, delay-ms = 0 }}
detail-retry = {{ attempts = 2, delay-ms = 0 }}
download-retry = {{ attempts = 2, delay-ms = 0 }}
"#,
        server.uri()
    )
}

fn favorites_page(ids: &[i64], next: &str) -> String {
    let figures: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<figure id="sid-{id}"><b><u><a href="/view/{id}/"><img src="/thumb/{id}.jpg"></a></u></b></figure>"#,
                id = id
            )
        })
        .collect();

    format!(
        r#"<html><body>
<section id="gallery-favorites" class="gallery">{}</section>
<div class="pagination"><a class="button standard right" href="{}">Next</a></div>
</body></html>"#,
        figures, next
    )
}

fn submission_page(id: i64, file_id: i64) -> String {
    format!(
        r#"<html><body>
<div class="submission-id-sub-container">
  <div class="submission-title"><h2><p>Piece {id}</p></h2></div>
  <a href="/user/painter/"><strong>Painter</strong></a>
  <strong><span class="popup_date" title="Mar 1, 2024 10:00 AM">a while ago</span></strong>
</div>
<div class="submission-area">
  <img id="submissionImg" data-fullview-src="/art/painter/{file_id}/{file_id}.painter_piece.png">
</div>
<div class="submission-description">
  <div class="submission-description-header">Painter</div>
  <div class="submission-description-posted">Posted a while ago</div>
  Oil on canvas
</div>
<section class="tags-row"><span class="tags"><a href="/search/@keywords oil">Oil</a></span></section>
</body></html>"#,
        id = id,
        file_id = file_id
    )
}

async fn mount_html(server: &MockServer, route: &str, body: String, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("Cookie", COOKIE))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(body),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_art(server: &MockServer, file_id: i64) {
    Mock::given(method("GET"))
        .and(path(
            format!("/art/painter/{id}/{id}.painter_piece.png", id = file_id).as_str(),
        ))
        .and(header("Cookie", COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(240, 480)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_furaffinity_sync_follows_pages() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, 10, &furaffinity_section(&mock_server));

    mount_html(
        &mock_server,
        "/favorites/someone/",
        favorites_page(&[300, 299], "/favorites/someone/1700000000/next"),
        1,
    )
    .await;
    // The last page links to itself
    mount_html(
        &mock_server,
        "/favorites/someone/1700000000/next",
        favorites_page(&[298], "/favorites/someone/1700000000/next"),
        1,
    )
    .await;

    mount_html(&mock_server, "/view/300/", submission_page(300, 1700000300), 1).await;
    mount_html(&mock_server, "/view/299/", submission_page(299, 1700000299), 1).await;
    mount_html(
        &mock_server,
        "/view/298/",
        "<html><body><p>The submission you are trying to find is not in our database.</p></body></html>"
            .to_string(),
        1,
    )
    .await;
    mount_art(&mock_server, 1700000300).await;
    mount_art(&mock_server, 1700000299).await;

    let summary = run_sync(&config, Provider::FurAffinity, &hash, Arc::new(AtomicBool::new(false)))
        .await
        .expect("Sync failed");

    assert_eq!(summary.new, 2);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.stop_reason, Some(StopReason::ListingExhausted));

    let storage = open_storage(&config.database.path).unwrap();
    let record = storage
        .find_file(Provider::FurAffinity, 1700000300)
        .unwrap()
        .unwrap();
    assert_eq!(record.submission_id, 300);
    assert_eq!(record.title, "Piece 300");
    assert_eq!(record.username, "Painter");
    assert_eq!((record.width, record.height), (240, 480));
    assert!(record.tags.contains("oil"));
    assert_eq!(record.create_datetime.as_deref(), Some("Mar 1, 2024 10:00 AM"));

    let hits = storage.search_files(Provider::FurAffinity, "canvas").unwrap();
    assert_eq!(hits.len(), 2);

    let run = storage.get_latest_run(Provider::FurAffinity).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.summary.not_found, 1);

    let thumbnail = image::open(
        config
            .files
            .dir
            .join("furaffinity-thumbnails/Painter/1700000300.painter_piece.png"),
    )
    .unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (60, 120));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_unreachable_listing_fails_the_run() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, 10, &furaffinity_section(&mock_server));

    // Two attempts per fetch, one retry of the page after the first failure
    Mock::given(method("GET"))
        .and(path("/favorites/someone/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&mock_server)
        .await;

    let summary = run_sync(&config, Provider::FurAffinity, &hash, Arc::default())
        .await
        .unwrap();
    assert_eq!(summary.processed(), 0);
    assert_eq!(summary.pages_fetched, 0);
    assert_eq!(summary.stop_reason, Some(StopReason::PageFailures));

    let storage = open_storage(&config.database.path).unwrap();
    let run = storage.get_latest_run(Provider::FurAffinity).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);

    mock_server.verify().await;
}

#[tokio::test]
async fn test_thumbnail_backfill_restores_deleted_thumbnails() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, 10, &furaffinity_section(&mock_server));

    mount_html(
        &mock_server,
        "/favorites/someone/",
        favorites_page(&[300], "/favorites/someone/"),
        1,
    )
    .await;
    mount_html(&mock_server, "/view/300/", submission_page(300, 1700000300), 1).await;
    mount_art(&mock_server, 1700000300).await;

    run_sync(&config, Provider::FurAffinity, &hash, Arc::default())
        .await
        .unwrap();

    let thumbnail = config
        .files
        .dir
        .join("furaffinity-thumbnails/Painter/1700000300.painter_piece.png");
    std::fs::remove_file(&thumbnail).unwrap();

    let results = rebuild_thumbnails(&config, &[Provider::FurAffinity])
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1.created, 1);
    assert!(thumbnail.exists());

    let again = rebuild_thumbnails(&config, &[Provider::FurAffinity])
        .await
        .unwrap();
    assert_eq!(again[0].1.created, 0);
    assert_eq!(again[0].1.skipped, 1);
}

#[tokio::test]
async fn test_stalled_download_fails_the_item() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let section = format!(
        "[http]\ndownload-stall-secs = 1\n{}",
        furaffinity_section(&mock_server)
    );
    let (config, hash) = write_config(&dir, 10, &section);

    mount_html(
        &mock_server,
        "/favorites/someone/",
        favorites_page(&[300], "/favorites/someone/"),
        1,
    )
    .await;
    mount_html(&mock_server, "/view/300/", submission_page(300, 1700000300), 1).await;

    // Accepts the connection and never answers in time
    Mock::given(method("GET"))
        .and(path("/art/painter/1700000300/1700000300.painter_piece.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png_bytes(240, 480))
                .set_delay(Duration::from_secs(600)),
        )
        .mount(&mock_server)
        .await;

    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        run_sync(&config, Provider::FurAffinity, &hash, Arc::default()),
    )
    .await
    .expect("sync hung on a stalled download")
    .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.new, 0);

    let media = config
        .files
        .dir
        .join("furaffinity/Painter/1700000300.painter_piece.png");
    assert!(!media.exists());
    assert!(!media.with_extension("png.part").exists());

    let storage = open_storage(&config.database.path).unwrap();
    assert!(storage
        .find_file(Provider::FurAffinity, 1700000300)
        .unwrap()
        .is_none());
}
