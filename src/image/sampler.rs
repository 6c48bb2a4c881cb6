use rayon::prelude::*;

use super::{Frame, FrameView};
use crate::{
    color::QuadraticMean,
    models::{LedZone, Rect, SampledColor},
};

/// Quadratic mean of the pixels of a view, neutral if the view is empty
pub fn quadratic_mean(view: &FrameView<'_>) -> SampledColor {
    let mut mean = QuadraticMean::default();
    mean.extend(view.pixels());
    mean.finish()
}

pub fn sample_zone(frame: &Frame, rect: Rect) -> SampledColor {
    quadratic_mean(&frame.view(rect))
}

/// Sample every zone of a frame, in zone order
///
/// Zones are only read, so they are sampled in parallel.
pub fn sample_zones(frame: &Frame, zones: &[LedZone], colors: &mut Vec<SampledColor>) {
    zones
        .par_iter()
        .map(|zone| sample_zone(frame, zone.rect))
        .collect_into_vec(colors);
}
