//! Mapping of LED zones to camera-space rectangles
//!
//! The [Calibrator] shows the marker of each zone through the preview, waits for the camera
//! to settle, captures a frame and locates the marker in it. The protocol itself lives in
//! [CalibrationMachine].

use std::{future::Future, sync::Arc};

use thiserror::Error;

use crate::{
    camera::{Camera, CameraError},
    image::{
        defish::Defisher,
        locator::{highlight, locate_bright_pixels, overlay_zones, LocateError},
        Frame, FrameError,
    },
    markers::{render_marker, MarkerSet},
    models::{CalibrationMapping, CalibrationSettings, ConfigError, MappingError, Rect, ScreenSpec},
    web::Preview,
};

mod machine;
pub use machine::*;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid calibration event {event} in state {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },
    #[error("zone {index} could not be located after {attempts} attempts")]
    ZoneNotFound { index: usize, attempts: u32 },
    #[error("no marker for zone {0}")]
    MissingMarker(usize),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Locate(#[from] LocateError),
}

/// Drives a calibration run against a camera and a preview
pub struct Calibrator<C, P> {
    camera: C,
    preview: P,
    defisher: Option<Defisher>,
    settings: CalibrationSettings,
    markers: Option<MarkerSet>,
    captures: Option<Arc<dyn Preview>>,
    preview_quality: u8,
}

impl<C: Camera, P: Preview> Calibrator<C, P> {
    pub fn new(camera: C, preview: P, settings: CalibrationSettings) -> Self {
        Self {
            camera,
            preview,
            defisher: None,
            settings,
            markers: None,
            captures: None,
            preview_quality: 80,
        }
    }

    /// Correct captured frames before locating markers
    pub fn with_defisher(mut self, defisher: Option<Defisher>) -> Self {
        self.defisher = defisher;
        self
    }

    /// Use pre-rendered markers instead of rendering them
    pub fn with_markers(mut self, markers: MarkerSet) -> Self {
        self.markers = Some(markers);
        self
    }

    /// Publish every captured frame with the located pixels painted green
    pub fn with_capture_preview(mut self, captures: Arc<dyn Preview>) -> Self {
        self.captures = Some(captures);
        self
    }

    pub fn with_preview_quality(mut self, quality: u8) -> Self {
        self.preview_quality = quality;
        self
    }

    /// Capture a frame and correct it
    ///
    /// Decoding and correction block the current worker.
    async fn capture(&mut self) -> Result<Frame, CalibrationError> {
        let data = self.camera.get_frame().await?;
        let defisher = &mut self.defisher;

        tokio::task::block_in_place(|| -> Result<Frame, CalibrationError> {
            let frame = Frame::decode(&data)?;

            Ok(match defisher {
                Some(defisher) => defisher.apply(&frame),
                None => frame,
            })
        })
    }

    async fn capture_zone(&mut self) -> Result<Rect, CalibrationError> {
        let frame = self.capture().await?;
        let threshold = self.settings.threshold;
        let quality = self.preview_quality;
        let captures = self.captures.as_ref();

        let points = tokio::task::block_in_place(|| {
            let points = locate_bright_pixels(&frame, threshold);

            if let Some(captures) = captures {
                match highlight(&frame, &points).encode_jpeg(quality) {
                    Ok(data) => captures.publish(data),
                    Err(error) => warn!(error = %error, "failed to encode capture preview"),
                }
            }

            points
        });

        Rect::bounding(points).ok_or_else(|| LocateError::NoBrightPixels { threshold }.into())
    }

    /// Show the located zones on a fresh frame
    async fn publish_overlay(&mut self, mapping: &CalibrationMapping) -> Result<(), CalibrationError> {
        let frame = self.capture().await?;
        let quality = self.preview_quality;

        let overlay = tokio::task::block_in_place(|| {
            overlay_zones(&frame, &mapping.zones).encode_jpeg(quality)
        })?;
        self.preview.publish(overlay);
        Ok(())
    }

    /// Run a full calibration
    ///
    /// `ready` resolves when the user has pointed the camera at the screen showing the
    /// preview. Nothing is returned unless every zone was located. Requires the
    /// multi-threaded runtime.
    pub async fn run(
        mut self,
        screen: ScreenSpec,
        ready: impl Future<Output = ()>,
    ) -> Result<CalibrationMapping, CalibrationError> {
        let mut machine = CalibrationMachine::new(self.settings.retries);
        machine.begin()?;
        machine.submit_settings(screen)?;

        let markers = match self.markers.take() {
            Some(markers) if markers.len() == screen.zone_count() => markers,
            _ => MarkerSet::generate(screen, &self.settings).await,
        };

        if let Some(index) = markers.missing().first() {
            return Err(CalibrationError::MissingMarker(*index));
        }

        machine.markers_ready()?;

        // Start on a black screen so the camera exposure can adapt
        match render_marker(&screen, Rect::default(), self.settings.marker_quality) {
            Ok(black) => self.preview.publish(black),
            Err(error) => warn!(error = %error, "failed to render black screen"),
        }
        machine.preview_started()?;

        ready.await;
        machine.user_ready()?;

        let settle_delay = self.settings.settle_delay();
        while let Some(index) = machine.current_zone() {
            let marker = markers
                .get(index)
                .ok_or(CalibrationError::MissingMarker(index))?;

            self.preview.publish(marker.clone());
            tokio::time::sleep(settle_delay).await;

            match self.capture_zone().await {
                Ok(rect) => {
                    info!(zone = index, rect = %rect, "located zone");
                    machine.zone_located(rect)?;
                }
                Err(error) => {
                    warn!(zone = index, error = %error, "failed to locate zone");
                    machine.zone_failed()?;
                }
            }
        }

        let mapping = machine.into_mapping()?;

        if let Err(error) = self.publish_overlay(&mapping).await {
            warn!(error = %error, "failed to publish calibration overlay");
        }

        Ok(mapping)
    }
}
