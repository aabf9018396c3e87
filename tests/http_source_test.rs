use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ma_image_loader::source::http_source::HttpSource;
use ma_image_loader::source::traits::{FetchEvent, ImageSource, ProgressReporter};
use ma_image_loader::{EngineConfig, FetchError, ImageLoader, ImageRequest};

const IMAGE_SIZE: usize = 512 * 1024;

/// PNG signature followed by a deterministic body.
fn image_bytes() -> Vec<u8> {
    let mut body = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    body.extend((0..IMAGE_SIZE - body.len()).map(|i| (i % 256) as u8));
    body
}

async fn serve_image() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        image_bytes(),
    )
}

async fn serve_missing() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "no such image")
}

async fn serve_slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(2)).await;
    (StatusCode::OK, image_bytes())
}

async fn start_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/img.png", get(serve_image))
        .route("/missing.png", get(serve_missing))
        .route("/slow.png", get(serve_slow));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

fn source() -> HttpSource {
    HttpSource::new(&EngineConfig::default()).unwrap()
}

fn drain_progress(rx: &mut mpsc::UnboundedReceiver<FetchEvent>) -> Vec<u8> {
    let mut progress = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let FetchEvent::Progress(p) = event {
            progress.push(p);
        }
    }
    progress
}

#[tokio::test]
async fn test_http_source_fetch_reports_progress() {
    let (addr, _handle) = start_server().await;
    let url = Url::parse(&format!("http://{}/img.png", addr)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let data = source()
        .fetch(&url, &ProgressReporter::new(tx))
        .await
        .unwrap();

    assert_eq!(data.len(), IMAGE_SIZE);
    assert_eq!(&data[..], &image_bytes()[..]);

    let progress = drain_progress(&mut rx);
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_http_source_non_success_status() {
    let (addr, _handle) = start_server().await;
    let url = Url::parse(&format!("http://{}/missing.png", addr)).unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = source()
        .fetch(&url, &ProgressReporter::new(tx))
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::Status(404));
}

#[tokio::test]
async fn test_http_source_timeout() {
    let (addr, _handle) = start_server().await;
    let url = Url::parse(&format!("http://{}/slow.png", addr)).unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let err = HttpSource::with_client(client)
        .fetch(&url, &ProgressReporter::new(tx))
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::Timeout);
}

#[tokio::test]
async fn test_http_source_connection_refused() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{}/img.png", addr)).unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let err = source()
        .fetch(&url, &ProgressReporter::new(tx))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Network(_)), "{:?}", err);
}

#[tokio::test]
async fn test_loader_over_http() {
    let (addr, _handle) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::with_cache_root(dir.path());
    config.dispose_grace_ms = 0;
    let loader = ImageLoader::new(config).unwrap();
    let url = format!("http://{}/img.png", addr);

    let first = loader
        .start(
            ImageRequest::load(url.as_str())
                .fade_time(Duration::ZERO)
                .build(),
        )
        .join()
        .await
        .unwrap();
    assert!(first.is_loaded(), "{:?}", first.outcome);

    let key = loader.key_for(&url).unwrap();
    assert_eq!(loader.cache().read(&key).unwrap(), image_bytes());

    // Second request is served from disk.
    let second = loader.run(ImageRequest::load(url.as_str()).build()).await;
    assert!(second.is_loaded());
    assert_eq!(loader.stats().fetches_started, 1);
    assert_eq!(loader.stats().cache_hits, 1);
}
