//! Live sampling: capture, correct, sample every zone and commit to the strip

use std::future::Future;

use thiserror::Error;

use crate::{
    camera::{Camera, CameraError},
    color::to_led,
    device::Device,
    image::{defish::Defisher, sampler::sample_zones, Frame, FrameError},
    models::{
        CalibrationMapping, Color, ConfigError, MappingError, SampledColor, ScreenSpec,
        StripLayout,
    },
    web::{LedSnapshot, LedState, Preview, Streams},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// State of the sampling loop
///
/// Owns the screen settings, the calibration mapping and the colors of the last cycle.
#[derive(Debug)]
pub struct SamplingSession {
    screen: ScreenSpec,
    mapping: CalibrationMapping,
    defisher: Option<Defisher>,
    strip_order: Vec<usize>,
    colors: Vec<SampledColor>,
    led_data: Vec<Color>,
    cycle: u64,
    notified_device_error: bool,
}

impl SamplingSession {
    pub fn new(
        screen: ScreenSpec,
        mapping: CalibrationMapping,
        defisher: Option<Defisher>,
        layout: &StripLayout,
    ) -> Result<Self, SessionError> {
        screen.check()?;
        mapping.check_screen(&screen)?;

        let strip_order = layout.strip_order(screen.leds_x, screen.leds_y);

        Ok(Self {
            screen,
            colors: Vec::with_capacity(mapping.zones.len()),
            led_data: Vec::with_capacity(strip_order.len()),
            mapping,
            defisher,
            strip_order,
            cycle: 0,
            notified_device_error: false,
        })
    }

    pub fn screen(&self) -> &ScreenSpec {
        &self.screen
    }

    /// Colors of the last cycle, in zone order
    pub fn colors(&self) -> &[SampledColor] {
        &self.colors
    }

    /// Colors of the last cycle, in strip order
    pub fn led_data(&self) -> &[Color] {
        &self.led_data
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Sample a frame, returning the corrected frame
    pub fn process(&mut self, frame: Frame) -> Frame {
        let frame = match &mut self.defisher {
            Some(defisher) => defisher.apply(&frame),
            None => frame,
        };

        sample_zones(&frame, &self.mapping.zones, &mut self.colors);

        let colors = &self.colors;
        self.led_data.clear();
        self.led_data
            .extend(self.strip_order.iter().map(|&zone| to_led(colors[zone])));

        self.cycle += 1;
        frame
    }

    pub fn snapshot(&self) -> LedSnapshot {
        LedSnapshot {
            cycle: self.cycle,
            leds: self
                .mapping
                .zones
                .iter()
                .zip(self.colors.iter())
                .map(|(zone, color)| {
                    let (r, g, b) = to_led(*color).into_components();
                    LedState {
                        index: zone.index,
                        rect: zone.rect,
                        color: [r, g, b],
                    }
                })
                .collect(),
        }
    }

    async fn run_cycle<C: Camera>(
        &mut self,
        camera: &mut C,
        device: &mut Device,
        streams: Option<&Streams>,
        preview_quality: u8,
    ) -> Result<(), SessionError> {
        let data = camera.get_frame().await?;
        let corrected = tokio::task::block_in_place(|| -> Result<Frame, SessionError> {
            Ok(self.process(Frame::decode(&data)?))
        })?;

        match device.set_led_data(&self.led_data).await {
            Ok(()) => self.notified_device_error = false,
            Err(error) => {
                if !self.notified_device_error {
                    self.notified_device_error = true;
                    error!(error = %error, "failed to write LED data");
                }
            }
        }

        if let Some(streams) = streams {
            streams.leds.publish(self.snapshot());

            let preview = tokio::task::block_in_place(|| corrected.encode_jpeg(preview_quality))?;
            streams.corrected.publish(preview);
        }

        Ok(())
    }

    /// Run the sampling loop until `shutdown` resolves
    ///
    /// A cycle that fails to capture or decode a frame is skipped. Frame processing blocks
    /// the current worker, so this requires the multi-threaded runtime.
    pub async fn run<C: Camera>(
        mut self,
        mut camera: C,
        mut device: Device,
        streams: Option<Streams>,
        preview_quality: u8,
        shutdown: impl Future<Output = ()>,
    ) -> Self {
        tokio::pin!(shutdown);

        info!(zones = self.mapping.zones.len(), leds = device.led_count(), "sampling started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.run_cycle(&mut camera, &mut device, streams.as_ref(), preview_quality) => {
                    if let Err(error) = result {
                        warn!(cycle = self.cycle, error = %error, "skipped sampling cycle");
                    }
                }
            }
        }

        info!(cycles = self.cycle, "sampling stopped");
        self
    }
}
