//! Retry behavior against a live HTTP server

use favsync::media::{download_to, AcquisitionError, DownloadProgress, ProgressObserver};
use favsync::transport::{RequestSpec, RetryPolicy, RetryTransport, TransportError};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Remembers every progress update
#[derive(Default)]
struct Recorder(Mutex<Vec<DownloadProgress>>);

impl ProgressObserver for Recorder {
    fn on_progress(&self, _destination: &Path, progress: DownloadProgress) {
        self.0.lock().unwrap().push(progress);
    }
}

fn transport(attempts: u32) -> RetryTransport {
    RetryTransport::new(reqwest::Client::new(), RetryPolicy::new(attempts, Duration::ZERO))
}

#[tokio::test]
async fn test_retries_until_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let spec = RequestSpec::get(format!("{}/flaky", mock_server.uri()));
    let body = transport(3).send_text(&spec).await.unwrap();
    assert_eq!(body, "finally");

    mock_server.verify().await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let spec = RequestSpec::get(format!("{}/down", mock_server.uri()));
    match transport(3).send_text(&spec).await {
        Err(TransportError::Status { status, .. }) => assert_eq!(status, 502),
        other => panic!("expected a status error, got {:?}", other),
    }

    mock_server.verify().await;
}

#[tokio::test]
async fn test_undecodable_body_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("sid", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let spec = RequestSpec::get(format!("{}/api", mock_server.uri())).query("sid", "abc");
    let result: Result<serde_json::Value, _> = transport(5).send_json(&spec).await;
    assert!(matches!(result, Err(TransportError::Decode { .. })));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_failed_download_leaves_nothing_behind() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("artist/1.png");
    std::fs::create_dir_all(destination.parent().unwrap()).unwrap();

    Mock::given(method("GET"))
        .and(path("/files/1.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&mock_server)
        .await;

    let spec = RequestSpec::get(format!("{}/files/1.png", mock_server.uri()));
    let result = download_to(&transport(2), &spec, &destination, None).await;

    assert!(result.is_err());
    assert!(!destination.exists());
    assert!(!dir.path().join("artist/1.png.part").exists());

    mock_server.verify().await;
}

/// Serves one response that announces more bytes than it sends, then hangs up
async fn serve_truncated_body() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buffer = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = socket.read(&mut buffer).await.unwrap();
            if read == 0 {
                return;
            }
            request.extend_from_slice(&buffer[..read]);
        }

        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100000\r\n\r\n")
            .await
            .unwrap();
        socket.write_all(&[7u8; 1024]).await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{}/files/3.png", address)
}

#[tokio::test]
async fn test_interrupted_body_removes_partial_file() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("3.png");

    let spec = RequestSpec::get(serve_truncated_body().await);
    let result = download_to(&transport(1), &spec, &destination, None).await;

    match result {
        Err(AcquisitionError::Stream { url, .. }) => assert_eq!(url, spec.url),
        other => panic!("expected a stream error, got {:?}", other),
    }
    assert!(!destination.exists());
    assert!(!dir.path().join("3.png.part").exists());
}

#[tokio::test]
async fn test_stalled_download_gives_up() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("4.png");

    Mock::given(method("GET"))
        .and(path("/files/4.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![1u8; 64])
                .set_delay(Duration::from_secs(600)),
        )
        .mount(&mock_server)
        .await;

    let spec = RequestSpec::get(format!("{}/files/4.png", mock_server.uri()))
        .stall_timeout(Duration::from_millis(200));
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        download_to(&transport(2), &spec, &destination, None),
    )
    .await
    .expect("download did not give up");

    assert!(matches!(
        result,
        Err(AcquisitionError::Download(TransportError::Stalled { .. }))
    ));
    assert!(!destination.exists());
    assert!(!dir.path().join("4.png.part").exists());
}

#[tokio::test]
async fn test_download_writes_whole_body() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("2.bin");
    let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    Mock::given(method("GET"))
        .and(path("/files/2.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let spec = RequestSpec::get(format!("{}/files/2.bin", mock_server.uri()));
    let recorder = Recorder::default();
    let written = download_to(&transport(1), &spec, &destination, Some(&recorder))
        .await
        .unwrap();

    assert_eq!(written, body.len() as u64);
    assert_eq!(std::fs::read(&destination).unwrap(), body);

    let updates = recorder.0.lock().unwrap();
    let last = updates.last().unwrap();
    assert_eq!(last.received_bytes, body.len() as u64);
    assert_eq!(last.total_bytes, Some(body.len() as u64));
    assert!(updates.windows(2).all(|w| w[0].received_bytes < w[1].received_bytes));
}
