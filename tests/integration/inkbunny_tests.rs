//! Full syncs against a mocked Inkbunny API

use crate::common::{file_count, png_bytes, write_config};
use favsync::model::Provider;
use favsync::storage::{open_storage, RunStatus, Storage};
use favsync::sync::{run_sync, StopReason};
use favsync::SyncError;
use serde_json::{json, Value};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn inkbunny_section(server: &MockServer) -> String {
    format!(
        r#"
[inkbunny]
username = "someone"
password = "secret"
base-url = "{}"
listing-retry = {{ attempts = 2, delay-ms = 0 }}
detail-retry = {{ attempts = 2, delay-ms = 0 }}
download-retry = {{ attempts = 2, delay-ms = 0 }}
"#,
        server.uri()
    )
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api_login.php"))
        .and(query_param("username", "someone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sid": "session-1",
            "user_id": "77",
            "ratingsmask": "11111"
        })))
        .mount(server)
        .await;
}

/// Mounts a single-page favorites search returning `ids`
async fn mount_search(server: &MockServer, ids: &[i64]) {
    let submissions: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "submission_id": id.to_string() }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/api_search.php"))
        .and(query_param("favs_user_id", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sid": "session-1",
            "results_count_all": ids.len().to_string(),
            "rid": "r1",
            "page": 1,
            "pages_count": 1,
            "submissions": submissions
        })))
        .mount(server)
        .await;
}

fn api_file(server: &MockServer, file_id: i64) -> Value {
    json!({
        "file_id": file_id.to_string(),
        "file_name": format!("{}_artist.png", file_id),
        "mimetype": "image/png",
        "full_size_x": "800",
        "full_size_y": "600",
        "create_datetime": "2010-11-05 18:13:58.591436+00",
        "file_url_full": format!("{}/files/full/{}_artist.png", server.uri(), file_id)
    })
}

/// Mounts the details of one submission and the downloads of its files
///
/// `expected_calls` applies to the details call; every file is expected to be
/// downloaded at most once.
async fn mount_submission(
    server: &MockServer,
    submission_id: i64,
    file_ids: &[i64],
    pool_id: Option<i64>,
    expected_calls: u64,
) {
    let pools: Vec<Value> = pool_id
        .into_iter()
        .map(|id| json!({ "pool_id": id.to_string(), "name": "Series", "description": "A series" }))
        .collect();
    let files: Vec<Value> = file_ids.iter().map(|id| api_file(server, *id)).collect();

    Mock::given(method("GET"))
        .and(path("/api_submissions.php"))
        .and(query_param("submission_ids", submission_id.to_string().as_str()))
        .and(query_param("sid", "session-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sid": "session-1",
            "submissions": [{
                "submission_id": submission_id.to_string(),
                "user_id": "12",
                "username": "Artist",
                "title": format!("Submission {}", submission_id),
                "description": "Painted on a tablet",
                "keywords": [{ "keyword_id": "1", "keyword_name": "Landscape" }],
                "pools": pools,
                "files": files
            }]
        })))
        .expect(expected_calls)
        .mount(server)
        .await;

    for file_id in file_ids {
        Mock::given(method("GET"))
            .and(path(format!("/files/full/{}_artist.png", file_id).as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(png_bytes(320, 240)),
            )
            .expect(0..=1)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_inkbunny_sync_is_idempotent() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, 10, &inkbunny_section(&mock_server));

    mount_login(&mock_server).await;

    // Two result pages tied together by the result id
    Mock::given(method("GET"))
        .and(path("/api_search.php"))
        .and(query_param("get_rid", "yes"))
        .and(query_param("favs_user_id", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rid": "r1",
            "page": "1",
            "pages_count": "2",
            "submissions": [{ "submission_id": "1234" }]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api_search.php"))
        .and(query_param("rid", "r1"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": "2",
            "pages_count": "2",
            "submissions": [{ "submission_id": "1233" }]
        })))
        .mount(&mock_server)
        .await;

    mount_submission(&mock_server, 1234, &[5, 6], Some(9), 2).await;
    mount_submission(&mock_server, 1233, &[7], Some(9), 2).await;

    let first = run_sync(&config, Provider::Inkbunny, &hash, Arc::new(AtomicBool::new(false)))
        .await
        .expect("First sync failed");
    assert_eq!(first.new, 2);
    assert_eq!(first.duplicate, 0);
    assert_eq!(first.pages_fetched, 2);
    assert_eq!(first.stop_reason, Some(StopReason::ListingExhausted));

    let second = run_sync(&config, Provider::Inkbunny, &hash, Arc::new(AtomicBool::new(false)))
        .await
        .expect("Second sync failed");
    assert_eq!(second.new, 0);
    assert_eq!(second.duplicate, 2);

    let storage = open_storage(&config.database.path).unwrap();
    assert_eq!(storage.count_files(Provider::Inkbunny).unwrap(), 3);
    assert_eq!(storage.count_pools(Provider::Inkbunny).unwrap(), 1);

    let pool = storage.get_pool(Provider::Inkbunny, 9).unwrap().unwrap();
    assert_eq!(pool.files.into_iter().collect::<Vec<_>>(), vec![5, 6, 7]);

    // Dimensions and hash come from the downloaded bytes, not the API
    let record = storage.find_file(Provider::Inkbunny, 5).unwrap().unwrap();
    assert_eq!((record.width, record.height), (320, 240));
    assert_eq!(record.mime_type.as_deref(), Some("image/png"));
    assert_eq!(
        record.content_hash,
        Some(format!("{:x}", md5::compute(png_bytes(320, 240))))
    );
    assert!(record.tags.contains("landscape"));
    assert!(record.tags.contains("artist:artist"));

    let latest = storage.get_latest_run(Provider::Inkbunny).unwrap().unwrap();
    assert_eq!(latest.status, RunStatus::Completed);
    assert_eq!(latest.summary.duplicate, 2);
    assert_eq!(latest.config_hash, hash);

    let files_dir = config.files.dir.clone();
    assert_eq!(file_count(&files_dir.join("inkbunny")), 3);
    assert_eq!(file_count(&files_dir.join("inkbunny-thumbnails")), 3);

    let thumbnail = image::open(files_dir.join("inkbunny-thumbnails/Artist/5_artist.png")).unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (120, 90));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_known_streak_stops_the_run() {
    let dir = TempDir::new().unwrap();

    // Mirror the three oldest favorites first
    let earlier = MockServer::start().await;
    let (config, hash) = write_config(&dir, 2, &inkbunny_section(&earlier));
    mount_login(&earlier).await;
    mount_search(&earlier, &[103, 102, 101]).await;
    for id in [103, 102, 101] {
        mount_submission(&earlier, id, &[id * 10], None, 1).await;
    }
    let first = run_sync(&config, Provider::Inkbunny, &hash, Arc::default())
        .await
        .unwrap();
    assert_eq!(first.new, 3);
    earlier.verify().await;

    // Two new favorites on top: new, new, dup, dup and the fifth is never looked at
    let later = MockServer::start().await;
    let (config, hash) = write_config(&dir, 2, &inkbunny_section(&later));
    mount_login(&later).await;
    mount_search(&later, &[105, 104, 103, 102, 101]).await;
    for id in [105, 104, 103, 102] {
        mount_submission(&later, id, &[id * 10], None, 1).await;
    }
    mount_submission(&later, 101, &[1010], None, 0).await;

    let summary = run_sync(&config, Provider::Inkbunny, &hash, Arc::default())
        .await
        .unwrap();
    assert_eq!(summary.new, 2);
    assert_eq!(summary.duplicate, 2);
    assert_eq!(summary.processed(), 4);
    assert_eq!(summary.stop_reason, Some(StopReason::DuplicateBudget));

    let storage = open_storage(&config.database.path).unwrap();
    assert_eq!(storage.count_files(Provider::Inkbunny).unwrap(), 5);

    later.verify().await;
}

#[tokio::test]
async fn test_rejected_login_is_fatal() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, 10, &inkbunny_section(&mock_server));

    Mock::given(method("POST"))
        .and(path("/api_login.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error_code": 0,
            "error_message": "Invalid username or password"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api_search.php"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = run_sync(&config, Provider::Inkbunny, &hash, Arc::default()).await;
    match result {
        Err(SyncError::Login(message)) => assert!(message.contains("Invalid username")),
        other => panic!("expected a login error, got {:?}", other),
    }

    mock_server.verify().await;
}

#[tokio::test]
async fn test_deleted_submission_counts_as_not_found() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = write_config(&dir, 10, &inkbunny_section(&mock_server));

    mount_login(&mock_server).await;
    mount_search(&mock_server, &[501, 500]).await;
    mount_submission(&mock_server, 501, &[5010], None, 1).await;
    Mock::given(method("GET"))
        .and(path("/api_submissions.php"))
        .and(query_param("submission_ids", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "submissions": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let summary = run_sync(&config, Provider::Inkbunny, &hash, Arc::default())
        .await
        .unwrap();
    assert_eq!(summary.new, 1);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.failed, 0);

    mock_server.verify().await;
}
