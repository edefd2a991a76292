//! HTTP surface: index page, MJPEG stream and single snapshot.
//!
//! axum owns parsing and sockets; every request lands in one fallback
//! handler that dispatches through the static route table. Capture calls
//! block, so they run on tokio's blocking pool.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::capture::{FrameSource, PixelFormat};
use crate::pipeline::router::{route, Route};
use crate::pipeline::stream::{run_stream_session, ChannelSink, STREAM_CONTENT_TYPE};
use crate::{CaptureError, InitError};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>edgecam</title>
  </head>
  <body>
    <img src="/stream">
  </body>
</html>
"#;

/// Shared state backing HTTP handlers.
pub struct ServerState {
    source: Arc<FrameSource>,
    /// One permit per concurrent stream; later clients wait their turn.
    stream_slots: Arc<Semaphore>,
}

impl ServerState {
    /// Browsers only decode JPEG parts, so the source must deliver JPEG.
    pub fn new(source: Arc<FrameSource>, max_stream_clients: usize) -> Result<Self, InitError> {
        if source.format() != PixelFormat::Jpeg {
            return Err(InitError::Config(format!(
                "HTTP streaming needs jpeg frames, capture format is {:?}",
                source.format()
            )));
        }
        Ok(Self {
            source,
            stream_slots: Arc::new(Semaphore::new(max_stream_clients.max(1))),
        })
    }
}

pub fn create_router(state: ServerState) -> Router {
    Router::new().fallback(dispatch).with_state(Arc::new(state))
}

async fn dispatch(State(state): State<Arc<ServerState>>, method: Method, uri: Uri) -> Response {
    match route(&method, uri.path()) {
        Route::Index => index_handler(),
        Route::Stream => stream_handler(state).await,
        Route::Capture => capture_handler(state).await,
        Route::NotFound => not_found(),
    }
}

fn index_handler() -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        INDEX_HTML,
    )
        .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        "Not found",
    )
        .into_response()
}

async fn stream_handler(state: Arc<ServerState>) -> Response {
    let permit = match state.stream_slots.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };

    let (tx, rx) = flume::bounded(1);
    let source = state.source.clone();
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let mut sink = ChannelSink::new(tx);
        let summary = run_stream_session(&source, &mut sink);
        info!(
            "Stream client done after {} parts ({:?})",
            summary.parts_written, summary.end
        );
    });

    let body = Body::from_stream(rx.into_stream().map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

async fn capture_handler(state: Arc<ServerState>) -> Response {
    let source = state.source.clone();
    let snapshot = tokio::task::spawn_blocking(move || {
        let frame = source.acquire()?;
        let format = frame.format();
        let jpeg = frame.to_bytes();
        source.release(frame);
        match format {
            PixelFormat::Jpeg => Ok(jpeg),
            other => Err(CaptureError::HardwareFault(format!(
                "sensor delivered {:?} instead of jpeg",
                other
            ))),
        }
    })
    .await;

    match snapshot {
        Ok(Ok(jpeg)) => (
            [
                (header::CONTENT_TYPE, "image/jpeg".to_string()),
                (header::CONTENT_LENGTH, jpeg.len().to_string()),
            ],
            jpeg,
        )
            .into_response(),
        Ok(Err(e)) => {
            warn!("Snapshot capture failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "text/plain")],
                "Camera capture failed",
            )
                .into_response()
        }
        Err(e) => {
            error!("Snapshot task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
