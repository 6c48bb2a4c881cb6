//! Preview server
//!
//! Camera frames, calibration markers and corrected frames are served as MJPEG streams,
//! the latest LED colors as JSON.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use futures::{Future, StreamExt};
use serde_derive::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use warp::{http::Response, hyper::Body, Filter};

use crate::models::{self, Rect};

const BOUNDARY: &str = "frame";

/// Sink for encoded preview images
pub trait Preview: Send + Sync {
    /// Replace the current preview image. Must not block.
    fn publish(&self, frame: Bytes);
}

/// Latest preview image, shared with the HTTP clients
#[derive(Debug, Clone)]
pub struct PreviewStream {
    tx: Arc<watch::Sender<Option<Bytes>>>,
}

impl PreviewStream {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::channel(None).0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Bytes>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Bytes> {
        self.tx.borrow().clone()
    }
}

impl Default for PreviewStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Preview for PreviewStream {
    fn publish(&self, frame: Bytes) {
        self.tx.send_replace(Some(frame));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedState {
    pub index: usize,
    /// Sampled area, in camera coordinates
    pub rect: Rect,
    pub color: [u8; 3],
}

/// State of the LEDs after the last sampling cycle
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LedSnapshot {
    pub cycle: u64,
    pub leds: Vec<LedState>,
}

#[derive(Debug, Clone)]
pub struct LedSnapshots {
    tx: Arc<watch::Sender<Arc<LedSnapshot>>>,
}

impl LedSnapshots {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::channel(Default::default()).0),
        }
    }

    pub fn publish(&self, snapshot: LedSnapshot) {
        self.tx.send_replace(Arc::new(snapshot));
    }

    pub fn latest(&self) -> Arc<LedSnapshot> {
        self.tx.borrow().clone()
    }
}

impl Default for LedSnapshots {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the preview server exposes
#[derive(Debug, Clone, Default)]
pub struct Streams {
    /// Raw camera frames
    pub camera: PreviewStream,
    /// Calibration markers, then the located zones
    pub calibration: PreviewStream,
    /// Frames after lens correction
    pub corrected: PreviewStream,
    pub leds: LedSnapshots,
}

fn mjpeg_part(frame: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.len()
    );

    let mut part = Vec::with_capacity(header.len() + frame.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(frame);
    part.extend_from_slice(b"\r\n");
    part.into()
}

fn mjpeg_reply(
    rx: watch::Receiver<Option<Bytes>>,
) -> Result<Response<Body>, warp::http::Error> {
    let parts = WatchStream::new(rx)
        .filter_map(|frame| async move { frame.map(|frame| Ok::<_, Infallible>(mjpeg_part(&frame))) });

    Response::builder()
        .header(
            "Content-Type",
            format!("multipart/x-mixed-replace;boundary={}", BOUNDARY),
        )
        .header("Cache-Control", "no-cache")
        .body(Body::wrap_stream(parts))
}

fn page(title: &str, stream: &str) -> warp::reply::Html<String> {
    warp::reply::html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>ambicam: {}</title></head>\n\
         <body style=\"margin: 0; background: black\">\n\
         <img src=\"/{}\" style=\"width: 100%\">\n</body>\n</html>\n",
        title, stream
    ))
}

pub fn routes(
    streams: Streams,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone + Send + Sync + 'static
{
    let stream = |name: &'static str, preview: PreviewStream| {
        warp::path(name)
            .and(warp::path::end())
            .map(move || mjpeg_reply(preview.subscribe()))
    };

    let camera_page = warp::path!("camera").map(|| page("camera", "camera-stream"));
    let calibration_page =
        warp::path!("calibration").map(|| page("calibration", "calibration-stream"));

    let leds = warp::path!("leds").map({
        let leds = streams.leds.clone();
        move || warp::reply::json(&*leds.latest())
    });

    warp::get().and(
        camera_page
            .or(calibration_page)
            .or(stream("camera-stream", streams.camera.clone()))
            .or(stream("calibration-stream", streams.calibration.clone()))
            .or(stream("stream", streams.corrected.clone()))
            .or(leds),
    )
}

/// Bind the preview server
pub async fn bind(
    config: &models::Preview,
    streams: Streams,
) -> Result<impl Future<Output = ()>, std::io::Error> {
    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(address).await?;

    info!(address = %address, "preview server listening");

    Ok(warp::serve(routes(streams).with(warp::log("ambicam::web")))
        .run_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener)))
}
