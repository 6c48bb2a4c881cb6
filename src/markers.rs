//! Calibration marker images
//!
//! A marker is a black image of the size of the screen with a single LED zone filled in
//! white. Markers are rendered in parallel, one task per zone, and delivered through a
//! channel that closes once every task is done.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use image::{Rgb, RgbImage};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    image::{encode_jpeg, FrameError},
    models::{CalibrationSettings, LedZone, PerimeterLayout, Rect, ScreenSpec, ToZones},
    paths::Paths,
};

#[derive(Debug, Error)]
pub enum MarkerError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("marker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Encoded marker image for one zone
#[derive(Debug, Clone)]
pub struct Marker {
    pub index: usize,
    pub data: Bytes,
}

/// Render the marker for `rect` as a JPEG image of the size of the screen
pub fn render_marker(screen: &ScreenSpec, rect: Rect, quality: u8) -> Result<Bytes, MarkerError> {
    let mut image = RgbImage::new(screen.width, screen.height);
    let rect = rect.intersect(&screen.bounds());

    for y in rect.min.y..rect.max.y {
        for x in rect.min.x..rect.max.x {
            image.put_pixel(x as u32, y as u32, Rgb([255, 255, 255]));
        }
    }

    Ok(encode_jpeg(&image, quality)?)
}

/// Render the markers of all zones concurrently
///
/// Markers arrive in completion order. The receiver yields `None` once every zone has been
/// rendered or has failed. Failures are logged and the zone is skipped. Must be called from
/// within a Tokio runtime.
pub fn generate_markers(
    screen: ScreenSpec,
    zones: Vec<LedZone>,
    quality: u8,
) -> mpsc::Receiver<Marker> {
    generate_markers_with(zones, move |rect| render_marker(&screen, rect, quality))
}

/// [generate_markers] with a custom renderer
pub fn generate_markers_with<F>(zones: Vec<LedZone>, render: F) -> mpsc::Receiver<Marker>
where
    F: Fn(Rect) -> Result<Bytes, MarkerError> + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(zones.len().max(1));
    let permits = Arc::new(Semaphore::new(num_cpus::get()));
    let render = Arc::new(render);

    for zone in zones {
        let tx = tx.clone();
        let permits = permits.clone();
        let render = render.clone();

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let result = tokio::task::spawn_blocking(move || (*render)(zone.rect))
                .await
                .map_err(MarkerError::from)
                .and_then(|result| result);

            match result {
                Ok(data) => {
                    if tx.send(Marker { index: zone.index, data }).await.is_err() {
                        debug!(zone = zone.index, "marker receiver dropped");
                    }
                }
                Err(error) => {
                    warn!(zone = zone.index, error = %error, "failed to render marker");
                }
            }
        });
    }

    rx
}

/// Write markers to the marker directory as they arrive
///
/// Returns the indices of the markers that were written, in arrival order.
pub async fn write_markers(paths: &Paths, markers: mpsc::Receiver<Marker>) -> Vec<usize> {
    let written = std::sync::Mutex::new(Vec::new());

    ReceiverStream::new(markers)
        .for_each_concurrent(None, |marker| {
            let written = &written;

            async move {
                let path = paths.marker_path(marker.index);

                match tokio::fs::write(&path, &marker.data).await {
                    Ok(()) => {
                        trace!(zone = marker.index, path = %path.display(), "wrote marker");
                        if let Ok(mut written) = written.lock() {
                            written.push(marker.index);
                        }
                    }
                    Err(error) => {
                        warn!(zone = marker.index, path = %path.display(), error = %error, "failed to write marker");
                    }
                }
            }
        })
        .await;

    written.into_inner().unwrap_or_default()
}

/// Markers of every zone, indexed by zone
#[derive(Debug, Default, Clone)]
pub struct MarkerSet {
    markers: Vec<Option<Bytes>>,
}

impl MarkerSet {
    fn zones(screen: ScreenSpec, settings: &CalibrationSettings) -> Vec<LedZone> {
        PerimeterLayout {
            screen,
            depth: settings.zone_depth,
        }
        .to_zones()
    }

    /// Render the markers of every zone of the screen
    pub async fn generate(screen: ScreenSpec, settings: &CalibrationSettings) -> Self {
        let zones = Self::zones(screen, settings);
        let mut set = Self {
            markers: vec![None; zones.len()],
        };

        set.fill(generate_markers(screen, zones, settings.marker_quality))
            .await;
        set
    }

    /// Store markers as they arrive, until the channel closes
    async fn fill(&mut self, mut rx: mpsc::Receiver<Marker>) {
        while let Some(marker) = rx.recv().await {
            if let Some(slot) = self.markers.get_mut(marker.index) {
                *slot = Some(marker.data);
            }
        }
    }

    /// Load the markers written by a previous run, rendering the ones that are missing
    pub async fn load(paths: &Paths, screen: ScreenSpec, settings: &CalibrationSettings) -> Self {
        let zones = Self::zones(screen, settings);
        let mut markers = Vec::with_capacity(zones.len());
        let mut missing = Vec::new();

        for zone in &zones {
            match tokio::fs::read(paths.marker_path(zone.index)).await {
                Ok(data) => markers.push(Some(Bytes::from(data))),
                Err(error) => {
                    debug!(zone = zone.index, error = %error, "marker not found on disk");
                    markers.push(None);
                    missing.push(*zone);
                }
            }
        }

        let mut set = Self { markers };

        if !missing.is_empty() {
            info!(count = missing.len(), "rendering missing markers");
            set.fill(generate_markers(screen, missing, settings.marker_quality))
                .await;
        }

        set
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.markers.get(index).and_then(Option::as_ref)
    }

    /// Indices of the zones without a marker
    pub fn missing(&self) -> Vec<usize> {
        self.markers
            .iter()
            .enumerate()
            .filter_map(|(i, m)| if m.is_none() { Some(i) } else { None })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{locator::locate_zone, Frame, Image};

    fn screen() -> ScreenSpec {
        ScreenSpec::new(64, 48, 2, 1)
    }

    #[test]
    fn marker_shows_zone_in_white() {
        let rect = Rect::new(0, 0, 32, 8);
        let data = render_marker(&screen(), rect, 95).unwrap();
        let frame = Frame::decode(&data).unwrap();

        assert_eq!((frame.width(), frame.height()), (64, 48));

        let located = locate_zone(&frame, 150).unwrap();
        assert!((located.min.x - rect.min.x).abs() <= 1);
        assert!((located.max.x - rect.max.x).abs() <= 1);
        assert!((located.max.y - rect.max.y).abs() <= 1);
    }

    #[test]
    fn marker_outside_screen_is_black() {
        let data = render_marker(&screen(), Rect::new(100, 100, 120, 120), 90).unwrap();
        let frame = Frame::decode(&data).unwrap();
        assert!(locate_zone(&frame, 150).is_err());
    }

    #[tokio::test]
    async fn every_zone_gets_one_marker() {
        let zones = PerimeterLayout {
            screen: screen(),
            depth: 8,
        }
        .to_zones();

        let mut rx = generate_markers(screen(), zones, 80);
        let mut indices = Vec::new();
        while let Some(marker) = rx.recv().await {
            assert!(!marker.data.is_empty());
            indices.push(marker.index);
        }

        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    fn failing_zone(failing: usize) -> impl Fn(Rect) -> Result<Bytes, MarkerError> {
        let zones = PerimeterLayout {
            screen: screen(),
            depth: 8,
        }
        .to_zones();
        let failing = zones[failing].rect;

        move |rect| {
            if rect == failing {
                Err(MarkerError::Frame(FrameError::Empty))
            } else {
                render_marker(&screen(), rect, 80)
            }
        }
    }

    #[tokio::test]
    async fn failed_zone_is_skipped() {
        let zones = MarkerSet::zones(
            screen(),
            &CalibrationSettings {
                zone_depth: 8,
                ..Default::default()
            },
        );

        let mut rx = generate_markers_with(zones, failing_zone(3));
        let mut indices = Vec::new();
        while let Some(marker) = rx.recv().await {
            indices.push(marker.index);
        }

        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 4, 5]);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn marker_set_reports_failed_zone() {
        let settings = CalibrationSettings {
            zone_depth: 8,
            ..Default::default()
        };
        let zones = MarkerSet::zones(screen(), &settings);

        let mut set = MarkerSet {
            markers: vec![None; zones.len()],
        };
        set.fill(generate_markers_with(zones, failing_zone(1))).await;

        assert_eq!(set.missing(), vec![1]);
        assert!(set.get(1).is_none());
        assert!(set.get(0).is_some());
    }

    #[tokio::test]
    async fn marker_set_is_complete() {
        let settings = CalibrationSettings {
            zone_depth: 8,
            ..Default::default()
        };

        let set = MarkerSet::generate(screen(), &settings).await;
        assert_eq!(set.len(), 6);
        assert!(set.missing().is_empty());
        assert!(set.get(5).is_some());
        assert!(set.get(6).is_none());
    }

    #[tokio::test]
    async fn write_then_load_markers() {
        let root = std::env::temp_dir().join(format!("ambicam-markers-{}", std::process::id()));
        let paths = Paths::new(Some(root.clone()));
        let settings = CalibrationSettings {
            zone_depth: 8,
            ..Default::default()
        };

        paths.reset_markers_dir().await.unwrap();
        let zones = MarkerSet::zones(screen(), &settings);
        let mut written = write_markers(&paths, generate_markers(screen(), zones, 80)).await;
        written.sort_unstable();
        assert_eq!(written, vec![0, 1, 2, 3, 4, 5]);

        // A missing file is rendered again
        tokio::fs::remove_file(paths.marker_path(2)).await.unwrap();
        let set = MarkerSet::load(&paths, screen(), &settings).await;
        assert!(set.missing().is_empty());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
