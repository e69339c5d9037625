use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use bytes::{BufMut, Bytes, BytesMut};
use motion_pipeline_common::frame::Frame;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::{encode_jpeg, RenderSink, JPEG_QUALITY};
use crate::RenderError;

pub const BOUNDARY: &str = "frame";

struct ViewerState {
    latest: watch::Receiver<Option<Bytes>>,
    stop: Arc<AtomicBool>,
}

/// Serves the latest frame over HTTP.
///
/// - `GET /frame.jpg` the most recent frame
/// - `GET /stream` an MJPEG `multipart/x-mixed-replace` stream
/// - `POST /stop` asks the presenter to stop, like closing a window
pub struct HttpViewerSink {
    addr: SocketAddr,
    latest: Option<watch::Sender<Option<Bytes>>>,
    stop: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl HttpViewerSink {
    /// Bind `addr` and start serving on the current tokio runtime.
    pub async fn bind(addr: &str) -> Result<Self, RenderError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| RenderError::Unavailable(format!("failed to bind {addr}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let (latest_tx, latest_rx) = watch::channel(None);
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(ViewerState {
            latest: latest_rx,
            stop: stop.clone(),
        });

        let app = Router::new()
            .route("/frame.jpg", get(latest_frame))
            .route("/stream", get(mjpeg_stream))
            .route("/stop", post(request_stop))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "viewer server failed");
            }
        });

        info!(%addr, "viewer listening");
        Ok(Self {
            addr,
            latest: Some(latest_tx),
            stop,
            shutdown: Some(shutdown_tx),
            server: Some(server),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl RenderSink for HttpViewerSink {
    fn present(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let Some(latest) = &self.latest else {
            return Err(RenderError::Unavailable("viewer already released".into()));
        };
        let jpeg = encode_jpeg(frame, JPEG_QUALITY)?;
        latest.send_replace(Some(Bytes::from(jpeg)));
        Ok(())
    }

    fn stop_requested(&mut self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn release(&mut self) {
        // Dropping the sender ends every open /stream response.
        self.latest.take();
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if self.server.take().is_some() {
            info!(addr = %self.addr, "viewer shutting down");
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

impl Drop for HttpViewerSink {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// GET /frame.jpg
async fn latest_frame(State(state): State<Arc<ViewerState>>) -> impl IntoResponse {
    let latest = state.latest.borrow().clone();
    match latest {
        Some(jpeg) => ([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no frame yet").into_response(),
    }
}

/// GET /stream
async fn mjpeg_stream(State(state): State<Arc<ViewerState>>) -> impl IntoResponse {
    let rx = state.latest.clone();
    let parts = futures_util::stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first || rx.borrow().is_none() {
            rx.changed().await.ok()?;
        }
        let jpeg = rx.borrow_and_update().clone()?;
        Some((Ok::<_, Infallible>(multipart_part(&jpeg)), (rx, false)))
    });
    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        )],
        Body::from_stream(parts),
    )
}

/// POST /stop
async fn request_stop(State(state): State<Arc<ViewerState>>) -> impl IntoResponse {
    warn!("stop requested from viewer");
    state.stop.store(true, Ordering::SeqCst);
    StatusCode::ACCEPTED
}

fn multipart_part(jpeg: &[u8]) -> Bytes {
    let mut part = BytesMut::with_capacity(jpeg.len() + 64);
    part.put_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    part.put_slice(b"Content-Type: image/jpeg\r\n");
    part.put_slice(format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}
