use super::{Corners, LedZone, Point, Rect, ScreenSpec, StripLayout};

/// Trait for converting a zone layout to LED zones
///
/// Zones are always produced in the same order: the top edge (left to right), the bottom
/// edge (left to right), the left edge (top to bottom) and the right edge (top to bottom).
pub trait ToZones {
    fn to_zones(&self) -> Vec<LedZone>;
}

/// Split an edge of `length` pixels into `count` spans
///
/// The spans sum to `length`. The remainder of the division is given one pixel at a time to
/// the first zones, so the largest spans come first. Spans may be 0 when `count > length`.
pub fn compute_edge_zones(length: u32, count: u32) -> Vec<u32> {
    if count == 0 {
        return Vec::new();
    }

    let base = length / count;
    let remainder = (length % count) as usize;

    (0..count as usize)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Signed version of [compute_edge_zones], used to walk between arbitrary corners
fn divide_signed(delta: i32, count: u32) -> Vec<i32> {
    let count = count as i32;
    let base = delta / count;
    let remainder = delta % count;
    let extra = remainder.signum();

    (0..count)
        .map(|i| if i < remainder.abs() { base + extra } else { base })
        .collect()
}

/// Compute the screen-space zones along the border of a `width` x `height` screen
///
/// Each zone is `depth` pixels thick, measured inward from the screen boundary. Zones of
/// adjacent edges overlap in the corners.
pub fn compute_perimeter_zones(
    width: u32,
    height: u32,
    leds_x: u32,
    leds_y: u32,
    depth: u32,
) -> Vec<Rect> {
    let mut zones = Vec::with_capacity(2 * (leds_x + leds_y) as usize);

    let (w, h) = (width as i32, height as i32);
    let depth_x = (depth as i32).min(w);
    let depth_y = (depth as i32).min(h);

    // Horizontal edges
    let spans = compute_edge_zones(width, leds_x);
    for &y in &[0, h - depth_y] {
        let mut x = 0;
        for &span in &spans {
            let span = span as i32;
            zones.push(Rect::new(x, y, x + span, y + depth_y));
            x += span;
        }
    }

    // Vertical edges
    let spans = compute_edge_zones(height, leds_y);
    for &x in &[0, w - depth_x] {
        let mut y = 0;
        for &span in &spans {
            let span = span as i32;
            zones.push(Rect::new(x, y, x + depth_x, y + span));
            y += span;
        }
    }

    zones
}

/// Axis-aligned layout flush with the screen bounds, used to render calibration markers
#[derive(Debug, Clone, Copy)]
pub struct PerimeterLayout {
    pub screen: ScreenSpec,
    pub depth: u32,
}

impl ToZones for PerimeterLayout {
    fn to_zones(&self) -> Vec<LedZone> {
        compute_perimeter_zones(
            self.screen.width,
            self.screen.height,
            self.screen.leds_x,
            self.screen.leds_y,
            self.depth,
        )
        .into_iter()
        .enumerate()
        .map(|(index, rect)| LedZone { index, rect })
        .collect()
    }
}

/// Layout interpolated between the four screen corners as seen by the camera
#[derive(Debug, Clone, Copy)]
pub struct CornerLayout {
    pub corners: Corners,
    pub leds_x: u32,
    pub leds_y: u32,
    /// Thickness of each zone, towards the inside of the screen
    pub inset: u32,
}

#[derive(Debug, Clone, Copy)]
enum Inset {
    Down,
    Up,
    Right,
    Left,
}

impl CornerLayout {
    fn create_edge(&self, from: Point, to: Point, count: u32, inset: Inset, zones: &mut Vec<Rect>) {
        if count == 0 {
            return;
        }

        let steps_x = divide_signed(to.x - from.x, count);
        let steps_y = divide_signed(to.y - from.y, count);
        let d = self.inset as i32;

        let mut start = from;
        for (&sx, &sy) in steps_x.iter().zip(steps_y.iter()) {
            let end = start + Point::new(sx, sy);

            zones.push(match inset {
                Inset::Down => Rect::new(start.x, start.y, end.x, start.y + d),
                Inset::Up => Rect::new(start.x, start.y - d, end.x, start.y),
                Inset::Right => Rect::new(start.x, start.y, start.x + d, end.y),
                Inset::Left => Rect::new(start.x - d, start.y, start.x, end.y),
            });

            start = end;
        }
    }
}

impl ToZones for CornerLayout {
    fn to_zones(&self) -> Vec<LedZone> {
        let c = &self.corners;
        let mut zones = Vec::with_capacity(2 * (self.leds_x + self.leds_y) as usize);

        self.create_edge(c.top_left, c.top_right, self.leds_x, Inset::Down, &mut zones);
        self.create_edge(c.bottom_left, c.bottom_right, self.leds_x, Inset::Up, &mut zones);
        self.create_edge(c.top_left, c.bottom_left, self.leds_y, Inset::Right, &mut zones);
        self.create_edge(c.top_right, c.bottom_right, self.leds_y, Inset::Left, &mut zones);

        zones
            .into_iter()
            .enumerate()
            .map(|(index, rect)| LedZone { index, rect })
            .collect()
    }
}

impl StripLayout {
    /// For each LED of the physical strip, the index of the zone it displays
    pub fn strip_order(&self, leds_x: u32, leds_y: u32) -> Vec<usize> {
        let (lx, ly) = (leds_x as usize, leds_y as usize);
        let mut order: Vec<usize> = if self.clockwise {
            // top, right, bottom (right to left), left (bottom to top)
            (0..lx)
                .chain(2 * lx + ly..2 * lx + 2 * ly)
                .chain((lx..2 * lx).rev())
                .chain((2 * lx..2 * lx + ly).rev())
                .collect()
        } else {
            (0..2 * (lx + ly)).collect()
        };

        if !order.is_empty() {
            let shift = self.position.unsigned_abs() as usize % order.len();
            if self.position < 0 {
                order.rotate_left(shift);
            } else {
                order.rotate_right(shift);
            }
        }

        if self.reverse {
            order.reverse();
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_zones_distribute_remainder_first() {
        assert_eq!(compute_edge_zones(10, 3), vec![4, 3, 3]);
        assert_eq!(compute_edge_zones(640, 2), vec![320, 320]);
        assert_eq!(compute_edge_zones(2, 4), vec![1, 1, 0, 0]);
        assert!(compute_edge_zones(10, 0).is_empty());
    }

    #[test]
    fn edge_zones_cover_the_edge() {
        for length in 1..200 {
            for count in 1..40 {
                let spans = compute_edge_zones(length, count);
                assert_eq!(spans.len(), count as usize);
                assert_eq!(spans.iter().sum::<u32>(), length);

                let max = *spans.iter().max().unwrap();
                let min = *spans.iter().min().unwrap();
                assert!(max - min <= 1, "{} / {}: {:?}", length, count, spans);
                assert!(spans.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }

    #[test]
    fn perimeter_zone_count_and_order() {
        let zones = compute_perimeter_zones(640, 480, 2, 1, 50);
        assert_eq!(zones.len(), 6);

        // top
        assert_eq!(zones[0], Rect::new(0, 0, 320, 50));
        assert_eq!(zones[1], Rect::new(320, 0, 640, 50));
        assert_eq!(zones[0].width(), 320);
        assert_eq!(zones[1].width(), 320);
        // bottom
        assert_eq!(zones[2], Rect::new(0, 430, 320, 480));
        assert_eq!(zones[3], Rect::new(320, 430, 640, 480));
        // left, right
        assert_eq!(zones[4], Rect::new(0, 0, 50, 480));
        assert_eq!(zones[5], Rect::new(590, 0, 640, 480));
    }

    #[test]
    fn perimeter_edges_reconstruct_lengths() {
        let (w, h, lx, ly) = (3840, 2160, 31, 17);
        let zones = compute_perimeter_zones(w, h, lx, ly, 300);
        assert_eq!(zones.len(), (2 * lx + 2 * ly) as usize);

        let (lx, ly) = (lx as usize, ly as usize);
        for edge in zones[..2 * lx].chunks(lx) {
            assert_eq!(edge.iter().map(Rect::width).sum::<u32>(), w);
            assert_eq!(edge[0].min.x, 0);
            assert_eq!(edge[lx - 1].max.x, w as i32);
            assert!(edge.windows(2).all(|p| p[0].max.x == p[1].min.x));
        }

        for edge in zones[2 * lx..].chunks(ly) {
            assert_eq!(edge.iter().map(Rect::height).sum::<u32>(), h);
            assert!(edge.windows(2).all(|p| p[0].max.y == p[1].min.y));
        }
    }

    #[test]
    fn perimeter_depth_is_clamped() {
        let zones = compute_perimeter_zones(100, 40, 1, 1, 300);
        assert_eq!(zones[0], Rect::new(0, 0, 100, 40));
        assert_eq!(zones[1], Rect::new(0, 0, 100, 40));
        assert_eq!(zones[3], Rect::new(0, 0, 100, 40));
    }

    #[test]
    fn perimeter_layout_indexes_zones() {
        let layout = PerimeterLayout {
            screen: ScreenSpec::new(640, 480, 2, 1),
            depth: 300,
        };

        let zones = layout.to_zones();
        assert_eq!(zones.len(), 6);
        assert!(zones.iter().enumerate().all(|(i, z)| z.index == i));
    }

    #[test]
    fn divide_signed_keeps_sign() {
        assert_eq!(divide_signed(10, 3), vec![4, 3, 3]);
        assert_eq!(divide_signed(-10, 3), vec![-4, -3, -3]);
        assert_eq!(divide_signed(-9, 31).iter().sum::<i32>(), -9);
        assert_eq!(divide_signed(0, 2), vec![0, 0]);
    }

    #[test]
    fn corner_layout_follows_edges() {
        let corners = Corners {
            top_left: Point::new(58, 70),
            top_right: Point::new(537, 61),
            bottom_right: Point::new(560, 334),
            bottom_left: Point::new(27, 343),
        };

        let layout = CornerLayout {
            corners,
            leds_x: 31,
            leds_y: 17,
            inset: 50,
        };

        let zones = layout.to_zones();
        assert_eq!(zones.len(), 96);

        // Top edge walks from the top-left to the top-right corner
        let top = &zones[..31];
        assert_eq!(top[0].rect.min, Point::new(58, 70));
        assert_eq!(top[30].rect.max.x, 537);
        assert!(top.iter().all(|z| z.rect.height() == 50));
        assert!(top.windows(2).all(|p| p[0].rect.max.x == p[1].rect.min.x));

        // Bottom edge zones extend upwards from the bottom corners
        let bottom = &zones[31..62];
        assert_eq!(bottom[0].rect.min.x, 27);
        assert_eq!(bottom[0].rect.max.y, 343);
        assert_eq!(bottom[30].rect.max.x, 560);

        // Right edge zones extend to the left of the right corners
        let right = &zones[79..];
        assert_eq!(right[0].rect.max, Point::new(537, right[0].rect.max.y));
        assert_eq!(right[0].rect.min.x, 487);
        assert_eq!(right[16].rect.max.y, 334);
    }

    #[test]
    fn strip_order_clockwise() {
        let layout = StripLayout::default();
        assert_eq!(layout.strip_order(2, 1), vec![0, 1, 5, 3, 2, 4]);

        let layout = StripLayout {
            clockwise: false,
            ..Default::default()
        };
        assert_eq!(layout.strip_order(2, 1), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn strip_order_rotate_and_reverse() {
        let layout = StripLayout {
            clockwise: true,
            position: 1,
            reverse: false,
        };
        assert_eq!(layout.strip_order(2, 1), vec![4, 0, 1, 5, 3, 2]);

        let layout = StripLayout {
            clockwise: true,
            position: -1,
            reverse: true,
        };
        assert_eq!(layout.strip_order(2, 1), vec![0, 4, 2, 3, 5, 1]);
    }
}
