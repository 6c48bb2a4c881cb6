//! Color arithmetic on frame pixels
//!
//! Many pixels are summarized with a quadratic mean (square root of the mean of squared
//! values), which weights bright pixels more than an arithmetic mean would. Exactly two
//! known colors are blended with [blend_pair] instead.

use image::Rgba;

use crate::models::{Color, SampledColor};

/// Color of a zone that covers no pixel
pub fn neutral() -> SampledColor {
    SampledColor::new(0, 0, 0, 0)
}

pub fn from_pixel(pixel: Rgba<u8>) -> SampledColor {
    let [r, g, b, a] = pixel.0;
    SampledColor::new(r, g, b, a)
}

pub fn to_pixel(color: SampledColor) -> Rgba<u8> {
    let (r, g, b, a) = color.into_components();
    Rgba([r, g, b, a])
}

/// Color sent to the LED strip, alpha is dropped
pub fn to_led(color: SampledColor) -> Color {
    color.color
}

/// Mean of the four channels of a pixel
pub fn brightness(pixel: &Rgba<u8>) -> f32 {
    pixel.0.iter().map(|c| *c as u16).sum::<u16>() as f32 / 4.
}

fn channel_from_square(mean_square: f64) -> u8 {
    mean_square.sqrt().round().min(255.) as u8
}

/// Running quadratic mean of pixels
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuadraticMean {
    sums: [u64; 4],
    count: u64,
}

impl QuadraticMean {
    pub fn push(&mut self, pixel: Rgba<u8>) {
        for (sum, c) in self.sums.iter_mut().zip(pixel.0.iter()) {
            *sum += *c as u64 * *c as u64;
        }

        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean color of the pushed pixels, or the neutral color if there were none
    pub fn finish(&self) -> SampledColor {
        if self.count == 0 {
            return neutral();
        }

        let count = self.count as f64;
        let [r, g, b, a] = self.sums;
        SampledColor::new(
            channel_from_square(r as f64 / count),
            channel_from_square(g as f64 / count),
            channel_from_square(b as f64 / count),
            channel_from_square(a as f64 / count),
        )
    }
}

impl Extend<Rgba<u8>> for QuadraticMean {
    fn extend<T: IntoIterator<Item = Rgba<u8>>>(&mut self, iter: T) {
        for pixel in iter {
            self.push(pixel);
        }
    }
}

/// Weighted quadratic interpolation of pixels, with weights summing to 1
pub fn interpolate_squared(pixels: &[Rgba<u8>; 4], weights: &[f32; 4]) -> Rgba<u8> {
    let mut out = [0u8; 4];

    for (channel, value) in out.iter_mut().enumerate() {
        let square: f32 = pixels
            .iter()
            .zip(weights.iter())
            .map(|(p, w)| {
                let c = p.0[channel] as f32;
                c * c * w
            })
            .sum();

        *value = channel_from_square(square as f64);
    }

    Rgba(out)
}

/// Geometric blend of two colors, `sqrt(c1 * c2 / 2)` per channel
pub fn blend_pair(a: SampledColor, b: SampledColor) -> SampledColor {
    let blend = |x: u8, y: u8| channel_from_square(x as f64 * y as f64 / 2.);

    SampledColor::new(
        blend(a.red, b.red),
        blend(a.green, b.green),
        blend(a.blue, b.blue),
        blend(a.alpha, b.alpha),
    )
}
