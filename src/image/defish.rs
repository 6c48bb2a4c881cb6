//! Fisheye lens correction
//!
//! Every destination pixel is mapped to a source position with a radial inverse-tangent
//! warp around the frame center. Source positions only depend on the frame size, so they
//! are computed once per size and kept in a lookup table.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use super::{Frame, Image};
use crate::{color::interpolate_squared, models::LensCorrection};

/// Color of corrected pixels whose source lies outside of the frame
pub const FALLBACK: Rgba<u8> = Rgba([50, 150, 100, 255]);

/// Strength used instead of 0, which would make the correction radius infinite
const MIN_STRENGTH: f64 = 1e-5;

/// Position in the source frame of the destination pixel `(x, y)`
pub fn source_position(x: u32, y: u32, width: u32, height: u32, strength: f64, zoom: f64) -> (f64, f64) {
    let (half_w, half_h) = (width as f64 / 2., height as f64 / 2.);
    let correction_radius = (width as f64).hypot(height as f64) / strength;

    let (dx, dy) = (x as f64 - half_w, y as f64 - half_h);
    let r = dx.hypot(dy) / correction_radius;
    let theta = if r == 0. { 1. } else { r.atan() / r };

    (half_w + theta * dx * zoom, half_h + theta * dy * zoom)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Sample {
    Outside,
    /// Bilinear footprint, weights are for (x0, y0), (x1, y0), (x0, y1), (x1, y1)
    Inside {
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
        weights: [f32; 4],
    },
}

impl Sample {
    fn new(sx: f64, sy: f64, width: u32, height: u32) -> Self {
        if !(sx >= 0. && sy >= 0. && sx < width as f64 && sy < height as f64) {
            return Sample::Outside;
        }

        let x0 = sx.floor() as u32;
        let y0 = sy.floor() as u32;
        let fx = (sx - x0 as f64) as f32;
        let fy = (sy - y0 as f64) as f32;

        Sample::Inside {
            x0,
            y0,
            x1: (x0 + 1).min(width - 1),
            y1: (y0 + 1).min(height - 1),
            weights: [
                (1. - fx) * (1. - fy),
                fx * (1. - fy),
                (1. - fx) * fy,
                fx * fy,
            ],
        }
    }

    fn color(&self, source: &RgbaImage) -> Rgba<u8> {
        match *self {
            Sample::Outside => FALLBACK,
            Sample::Inside {
                x0,
                y0,
                x1,
                y1,
                weights,
            } => interpolate_squared(
                &[
                    *source.get_pixel(x0, y0),
                    *source.get_pixel(x1, y0),
                    *source.get_pixel(x0, y1),
                    *source.get_pixel(x1, y1),
                ],
                &weights,
            ),
        }
    }
}

#[derive(Debug)]
struct Lut {
    width: u32,
    height: u32,
    samples: Vec<Sample>,
}

impl Lut {
    fn new(width: u32, height: u32, strength: f64, zoom: f64) -> Self {
        let mut samples = vec![Sample::Outside; width as usize * height as usize];

        samples
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, sample) in row.iter_mut().enumerate() {
                    let (sx, sy) = source_position(x as _, y as _, width, height, strength, zoom);
                    *sample = Sample::new(sx, sy, width, height);
                }
            });

        Self {
            width,
            height,
            samples,
        }
    }
}

/// Lens correction with a lookup table cached for the last frame size
#[derive(Debug)]
pub struct Defisher {
    strength: f64,
    zoom: f64,
    lut: Option<Lut>,
}

impl Defisher {
    pub fn new(strength: f64, zoom: f64) -> Self {
        Self {
            strength: if strength == 0. { MIN_STRENGTH } else { strength },
            zoom,
            lut: None,
        }
    }

    /// Build the corrector described by the configuration, `None` if it is disabled
    pub fn from_config(config: &LensCorrection) -> Option<Self> {
        if config.enable {
            Some(Self::new(config.strength, config.zoom))
        } else {
            None
        }
    }

    pub fn apply(&mut self, frame: &Frame) -> Frame {
        let (width, height) = (frame.width(), frame.height());

        if let Some(lut) = &self.lut {
            if lut.width != width || lut.height != height {
                self.lut = None;
            }
        }

        let (strength, zoom) = (self.strength, self.zoom);
        let lut = self.lut.get_or_insert_with(|| {
            debug!(width, height, strength, zoom, "building lens correction table");
            Lut::new(width, height, strength, zoom)
        });

        let source = frame.buffer();
        let mut buffer = RgbaImage::new(width, height);

        buffer
            .par_chunks_mut(width as usize * 4)
            .zip(lut.samples.par_chunks(width as usize))
            .for_each(|(row, samples)| {
                for (pixel, sample) in row.chunks_exact_mut(4).zip(samples) {
                    pixel.copy_from_slice(&sample.color(source).0);
                }
            });

        Frame { buffer }
    }
}

/// Correct a single frame
pub fn defish(frame: &Frame, strength: f64, zoom: f64) -> Frame {
    Defisher::new(strength, zoom).apply(frame)
}
