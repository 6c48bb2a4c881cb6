//! Frames captured by the camera

use std::fmt;

use bytes::Bytes;
use image::{buffer::ConvertBuffer, codecs::jpeg::JpegEncoder, Rgba, RgbImage, RgbaImage};
use thiserror::Error;

use crate::models::Rect;

pub mod defish;
pub mod locator;
pub mod sampler;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("cannot decode frame: {0}")]
    Decode(#[source] image::ImageError),
    #[error("cannot encode frame: {0}")]
    Encode(#[source] image::ImageError),
    #[error("empty frame")]
    Empty,
}

/// Read access to the pixels of an image
pub trait Image {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Pixel at the given coordinates, relative to the image origin
    fn color_at(&self, x: u32, y: u32) -> Option<Rgba<u8>>;

    fn bounds(&self) -> Rect {
        Rect::from_size(self.width(), self.height())
    }
}

/// Encode an RGB image as a JPEG still
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Bytes, FrameError> {
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, quality)
        .encode_image(image)
        .map_err(FrameError::Encode)?;

    Ok(data.into())
}

/// Decoded camera frame
///
/// Frames are never modified once built: every processing step returns a new frame.
#[derive(Clone)]
pub struct Frame {
    buffer: RgbaImage,
}

impl Frame {
    pub fn new(buffer: RgbaImage) -> Result<Self, FrameError> {
        if buffer.width() == 0 || buffer.height() == 0 {
            return Err(FrameError::Empty);
        }

        Ok(Self { buffer })
    }

    /// Decode a still image (JPEG or PNG)
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let image = image::load_from_memory(data).map_err(FrameError::Decode)?;
        Self::new(image.to_rgba8())
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Bytes, FrameError> {
        let rgb: RgbImage = self.buffer.convert();
        encode_jpeg(&rgb, quality)
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    pub fn into_buffer(self) -> RgbaImage {
        self.buffer
    }

    /// Read-only view of the part of `rect` that lies within this frame
    pub fn view(&self, rect: Rect) -> FrameView<'_> {
        FrameView {
            buffer: &self.buffer,
            rect: rect.intersect(&self.bounds()),
        }
    }
}

impl Image for Frame {
    fn width(&self) -> u32 {
        self.buffer.width()
    }

    fn height(&self) -> u32 {
        self.buffer.height()
    }

    fn color_at(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.buffer.get_pixel_checked(x, y).copied()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.buffer.width())
            .field("height", &self.buffer.height())
            .finish()
    }
}

/// Rectangle-bounded view over a frame
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    buffer: &'a RgbaImage,
    rect: Rect,
}

impl<'a> FrameView<'a> {
    /// Area of the frame covered by this view
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Pixels of the view, row by row
    pub fn pixels(&self) -> impl Iterator<Item = Rgba<u8>> + 'a {
        let buffer = self.buffer;
        let rect = self.rect;

        (rect.min.y..rect.max.y).flat_map(move |y| {
            (rect.min.x..rect.max.x).map(move |x| *buffer.get_pixel(x as u32, y as u32))
        })
    }
}

impl Image for FrameView<'_> {
    fn width(&self) -> u32 {
        self.rect.width()
    }

    fn height(&self) -> u32 {
        self.rect.height()
    }

    fn color_at(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.buffer.get_pixel(
                self.rect.min.x as u32 + x,
                self.rect.min.y as u32 + y,
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Frame where every pixel encodes its own coordinates
    pub fn gradient(width: u32, height: u32) -> Frame {
        Frame::new(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255])
        }))
        .unwrap()
    }

    #[test]
    fn empty_frames_are_rejected() {
        assert!(matches!(
            Frame::new(RgbaImage::new(0, 10)),
            Err(FrameError::Empty)
        ));
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(matches!(
            Frame::decode(b"definitely not a jpeg"),
            Err(FrameError::Decode(_))
        ));
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions() {
        let frame = gradient(64, 48);
        let data = frame.encode_jpeg(90).unwrap();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);

        let decoded = Frame::decode(&data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn view_is_clipped_to_frame() {
        let frame = gradient(64, 48);
        let view = frame.view(Rect::new(60, 40, 80, 60));

        assert_eq!(view.rect(), Rect::new(60, 40, 64, 48));
        assert_eq!((view.width(), view.height()), (4, 8));
        assert_eq!(view.pixels().count(), 32);
        assert_eq!(view.color_at(0, 0), frame.color_at(60, 40));
        assert_eq!(view.color_at(4, 0), None);
    }

    #[test]
    fn view_outside_frame_is_empty() {
        let frame = gradient(64, 48);
        let view = frame.view(Rect::new(100, 100, 120, 120));
        assert_eq!(view.pixels().count(), 0);
        assert_eq!(view.color_at(0, 0), None);
    }
}
