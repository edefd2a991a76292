//! HTTP surface over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use edgecam::capture::{CameraSensor, CapturedFrame, FrameSource, SyntheticSensor};
use edgecam::pipeline::{create_router, ServerState};
use edgecam::{CaptureConfig, CaptureError, InitError, PixelFormat};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn capture_config(format: PixelFormat) -> CaptureConfig {
    CaptureConfig {
        width: 64,
        height: 48,
        format,
        frame_interval_ms: 5,
        capture_timeout_ms: 2_000,
        ..CaptureConfig::default()
    }
}

/// Claims to be a JPEG camera but hands back raw pixels.
struct RawPixelSensor;

impl CameraSensor for RawPixelSensor {
    fn name(&self) -> &str {
        "raw"
    }

    fn start(&mut self, _config: &CaptureConfig) -> Result<(), InitError> {
        Ok(())
    }

    fn capture_into(&mut self, buf: &mut [u8]) -> Result<CapturedFrame, CaptureError> {
        buf.fill(0xFF);
        Ok(CapturedFrame {
            len: buf.len(),
            width: 64,
            height: 48,
            format: PixelFormat::Rgb888,
        })
    }
}

async fn start_server() -> (SocketAddr, Arc<FrameSource>) {
    start_server_with(Box::new(SyntheticSensor::new())).await
}

async fn start_server_with(sensor: Box<dyn CameraSensor>) -> (SocketAddr, Arc<FrameSource>) {
    let config = capture_config(PixelFormat::Jpeg);
    let source = Arc::new(FrameSource::initialize(&config, sensor).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(ServerState::new(source.clone(), 1).unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, source)
}

async fn send_request(addr: SocketAddr, method: &str, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        method, path
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

/// Split a complete response into (lower-cased head, body).
async fn read_response(mut stream: TcpStream) -> (String, Vec<u8>) {
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let split = find(&raw, b"\r\n\r\n").expect("header terminator");
    let head = String::from_utf8_lossy(&raw[..split]).to_lowercase();
    (head, raw[split + 4..].to_vec())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

/// Read from a stream response until `parts` boundaries have arrived.
async fn read_parts(stream: &mut TcpStream, parts: usize) -> Vec<u8> {
    let mut received = Vec::new();
    let mut chunk = [0u8; 4096];
    while count(&received, b"--frame\r\n") < parts {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .expect("stream stalled")
            .unwrap();
        assert!(n > 0, "server closed the stream");
        received.extend_from_slice(&chunk[..n]);
    }
    received
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn index_embeds_the_stream() {
    let (addr, _source) = start_server().await;
    let (head, body) = read_response(send_request(addr, "GET", "/").await).await;

    assert!(head.starts_with("http/1.1 200"));
    assert!(head.contains("content-type: text/html"));
    assert!(String::from_utf8(body).unwrap().contains("<img src=\"/stream\">"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_path_is_not_found() {
    let (addr, _source) = start_server().await;
    let (head, body) = read_response(send_request(addr, "GET", "/settings").await).await;

    assert!(head.starts_with("http/1.1 404"));
    assert!(head.contains("content-type: text/plain"));
    assert_eq!(body, b"Not found");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn capture_returns_one_jpeg() {
    let (addr, source) = start_server().await;
    let (head, body) = read_response(send_request(addr, "GET", "/capture").await).await;

    assert!(head.starts_with("http/1.1 200"));
    assert!(head.contains("content-type: image/jpeg"));
    assert!(head.contains(&format!("content-length: {}", body.len())));
    assert_eq!(&body[..2], &[0xFF, 0xD8]);
    assert_eq!(source.pool_stats().issued, 1);
    assert_eq!(source.pool_stats().outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_serves_parts_and_frees_buffers_after_close() {
    let (addr, source) = start_server().await;

    let mut first = send_request(addr, "GET", "/stream").await;
    let received = read_parts(&mut first, 3).await;
    let head = String::from_utf8_lossy(&received).to_lowercase();
    assert!(head.starts_with("http/1.1 200"));
    assert!(head.contains("content-type: multipart/x-mixed-replace; boundary=frame"));
    assert!(head.contains("content-type: image/jpeg"));

    // With one stream permit, a second client waits until the first leaves.
    let mut second = send_request(addr, "GET", "/stream").await;
    let mut chunk = [0u8; 1024];
    let early = tokio::time::timeout(Duration::from_millis(300), second.read(&mut chunk)).await;
    assert!(early.is_err(), "second client was answered while the first streamed");

    drop(first);
    let received = read_parts(&mut second, 1).await;
    assert!(String::from_utf8_lossy(&received).starts_with("HTTP/1.1 200"));
    drop(second);

    let mut settled = false;
    for _ in 0..100 {
        if source.pool_stats().outstanding() == 0 {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(settled, "stream sessions kept buffers after disconnect");
}

#[test]
fn raw_pixel_source_is_refused_at_startup() {
    let source = FrameSource::initialize(
        &capture_config(PixelFormat::Rgb888),
        Box::new(SyntheticSensor::new()),
    )
    .unwrap();

    let result = ServerState::new(Arc::new(source), 1);
    assert!(matches!(result, Err(InitError::Config(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn capture_refuses_a_non_jpeg_frame() {
    let (addr, source) = start_server_with(Box::new(RawPixelSensor)).await;
    let (head, body) = read_response(send_request(addr, "GET", "/capture").await).await;

    assert!(head.starts_with("http/1.1 503"));
    assert!(!head.contains("image/jpeg"));
    assert_eq!(body, b"Camera capture failed");
    assert_eq!(source.pool_stats().outstanding(), 0);
}
