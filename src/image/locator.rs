//! Detection of calibration markers in camera frames

use image::Rgba;
use thiserror::Error;

use super::Frame;
use crate::{
    color::{blend_pair, brightness, from_pixel, to_pixel},
    models::{LedZone, Point, Rect, SampledColor},
};

const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("no pixel brighter than {threshold} in the frame")]
    NoBrightPixels { threshold: u8 },
}

/// Coordinates of the pixels whose brightness exceeds `threshold`
pub fn locate_bright_pixels(frame: &Frame, threshold: u8) -> Vec<Point> {
    frame
        .buffer()
        .enumerate_pixels()
        .filter(|(_, _, pixel)| brightness(pixel) > threshold as f32)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect()
}

/// Bounding rectangle of the bright pixels of a frame showing one marker
pub fn locate_zone(frame: &Frame, threshold: u8) -> Result<Rect, LocateError> {
    Rect::bounding(locate_bright_pixels(frame, threshold))
        .ok_or(LocateError::NoBrightPixels { threshold })
}

/// Copy of `frame` with the given pixels painted green
pub fn highlight(frame: &Frame, points: &[Point]) -> Frame {
    let mut buffer = frame.buffer().clone();

    for p in points {
        if let Some(pixel) = buffer.get_pixel_mut_checked(p.x as u32, p.y as u32) {
            *pixel = GREEN;
        }
    }

    Frame { buffer }
}

/// Copy of `frame` with the area of every zone tinted green
pub fn overlay_zones(frame: &Frame, zones: &[LedZone]) -> Frame {
    let mut buffer = frame.buffer().clone();
    let green: SampledColor = from_pixel(GREEN);

    for zone in zones {
        let rect = frame.view(zone.rect).rect();

        for y in rect.min.y..rect.max.y {
            for x in rect.min.x..rect.max.x {
                let pixel = buffer.get_pixel_mut(x as u32, y as u32);
                *pixel = to_pixel(blend_pair(from_pixel(*pixel), green));
            }
        }
    }

    Frame { buffer }
}
