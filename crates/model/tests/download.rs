//! Artifact download tests against a minimal local HTTP server.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use model::{
    Catalog, CatalogEntry, CacheState, ChatMessage, ChunkStream, Error, InferenceEngine, Manager,
    artifact_file_name,
};

/// Engine stub; download tests never reach inference.
struct NullEngine;

#[async_trait]
impl InferenceEngine for NullEngine {
    async fn load(&self, _: &str, _: &Path) -> model::Result<()> {
        Ok(())
    }
    async fn unload(&self, _: &str) -> model::Result<()> {
        Ok(())
    }
    async fn start(&self, _: &str, _: Vec<ChatMessage>) -> model::Result<ChunkStream> {
        Err(Error::Engine("null engine".to_string()))
    }
}

/// Serve GET requests in sequence: for each entry in `deliveries`, send a
/// 200 with the full content length but only that many body bytes, then
/// drop the socket. `None` delivers the whole body.
async fn byte_server(listener: TcpListener, body: Vec<u8>, deliveries: Vec<Option<usize>>) {
    for deliver in deliveries {
        let (mut sock, _) = listener.accept().await.unwrap();

        let mut request = vec![0u8; 4096];
        let mut read = 0;
        loop {
            let n = sock.read(&mut request[read..]).await.unwrap();
            read += n;
            if n == 0 || request[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let header = format!(
            "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            body.len()
        );
        sock.write_all(header.as_bytes()).await.unwrap();

        let deliver = deliver.unwrap_or(body.len());
        for piece in body[..deliver].chunks(body.len().div_ceil(4).max(1)) {
            sock.write_all(piece).await.unwrap();
            sock.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Dropping the socket mid-body surfaces as a stream error
        // client-side.
    }
}

fn manager_for(uri: String, cache_dir: &Path) -> (Manager, model::ModelDescriptor) {
    let catalog = Catalog::new(vec![CatalogEntry {
        id: "dl-test-q4".to_string(),
        alias: "dl-test".to_string(),
        uri,
        size_bytes: None,
    }]);
    let manager = Manager::new(catalog, cache_dir, Arc::new(NullEngine));
    let descriptor = manager.resolve_alias("dl-test").unwrap();
    (manager, descriptor)
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = format!("http://{}/model.bin", listener.local_addr().unwrap());
    let body = vec![7u8; 64 * 1024];
    tokio::spawn(byte_server(listener, body.clone(), vec![None]));

    let dir = tempfile::tempdir().unwrap();
    let (manager, descriptor) = manager_for(uri, dir.path());

    let progress = std::sync::Mutex::new(Vec::new());
    manager
        .download(&descriptor, |pct| progress.lock().unwrap().push(pct))
        .await
        .unwrap();

    let progress = progress.into_inner().unwrap();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*progress.last().unwrap(), 100);
    assert!(progress.iter().all(|&p| p <= 100));

    assert!(manager.is_cached(&descriptor).unwrap());
    let artifact = dir.path().join(artifact_file_name("dl-test-q4"));
    assert_eq!(std::fs::read(artifact).unwrap(), body);
}

#[tokio::test]
async fn truncated_transfer_leaves_not_cached_and_is_retryable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = vec![3u8; 64 * 1024];
    // First transfer is cut short; the retry gets the whole body.
    tokio::spawn(byte_server(listener, body.clone(), vec![Some(16 * 1024), None]));

    let dir = tempfile::tempdir().unwrap();
    let (manager, descriptor) = manager_for(format!("http://{addr}/model.bin"), dir.path());

    let err = manager.download(&descriptor, |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::Download(_)));

    let refreshed = manager.resolve_alias("dl-test").unwrap();
    assert_eq!(refreshed.cache_state, CacheState::NotCached);
    assert!(!dir.path().join(artifact_file_name("dl-test-q4")).exists());
    assert!(!dir.path().join("dl-test-q4.part").exists());

    // Retry succeeds from the clean state.
    let calls = AtomicUsize::new(0);
    manager
        .download(&descriptor, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    assert!(calls.load(Ordering::SeqCst) > 0);
    assert!(manager.is_cached(&descriptor).unwrap());
}

#[tokio::test]
async fn http_error_status_is_download_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = format!("http://{}/missing.bin", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buffer = [0u8; 1024];
        let _ = sock.read(&mut buffer).await;
        let _ = sock
            .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n")
            .await;
    });

    let dir = tempfile::tempdir().unwrap();
    let (manager, descriptor) = manager_for(uri, dir.path());
    let err = manager.download(&descriptor, |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::Download(_)));
}
