use std::{
    fmt,
    ops::{Add, Sub},
    str::FromStr,
};

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

/// Integer pixel coordinates, in screen or camera space
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsePointError {
    #[error("expected X,Y coordinates, got '{0}'")]
    Format(String),
    #[error("invalid coordinate in '{0}'")]
    Coordinate(String),
}

impl FromStr for Point {
    type Err = ParsePointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| ParsePointError::Format(s.to_owned()))?;

        let parse = |v: &str| {
            v.trim()
                .parse::<i32>()
                .map_err(|_| ParsePointError::Coordinate(s.to_owned()))
        };

        Ok(Point::new(parse(x)?, parse(y)?))
    }
}

/// Axis-aligned rectangle
///
/// `min` is inclusive and `max` is exclusive, so a rectangle with `min == max` along an axis
/// is a valid zone that covers no pixel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Build a rectangle from two opposite corners, in any order
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: Point::new(x0.min(x1), y0.min(y1)),
            max: Point::new(x0.max(x1), y0.max(y1)),
        }
    }

    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    /// Rectangle of the given size anchored at the origin
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> u32 {
        (self.max.x - self.min.x).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max.y - self.min.y).max(0) as u32
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Intersection of two rectangles, or the empty rectangle if they are disjoint
    pub fn intersect(&self, other: &Rect) -> Rect {
        let r = Rect {
            min: Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        };

        if r.is_empty() {
            Rect::default()
        } else {
            r
        }
    }

    /// Smallest rectangle containing every given pixel, `None` if there is none
    pub fn bounding(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Rect::new(p.x, p.y, p.x + 1, p.y + 1),
                Some(r) => Rect {
                    min: Point::new(r.min.x.min(p.x), r.min.y.min(p.y)),
                    max: Point::new(r.max.x.max(p.x + 1), r.max.y.max(p.y + 1)),
                },
            })
        })
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-({})", self.min, self.max)
    }
}

/// One LED's sampling rectangle, with its stable zone index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedZone {
    pub index: usize,
    pub rect: Rect,
}

/// Screen corners as seen by the camera
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Corners {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_is_canonical() {
        let r = Rect::new(10, 8, 2, 4);
        assert_eq!(r.min, Point::new(2, 4));
        assert_eq!(r.max, Point::new(10, 8));
        assert_eq!((r.width(), r.height(), r.area()), (8, 4, 32));
    }

    #[test]
    fn zero_span_rect_is_empty() {
        let r = Rect::new(5, 0, 5, 300);
        assert!(r.is_empty());
        assert_eq!(r.area(), 0);
        assert!(!r.contains(Point::new(5, 10)));
    }

    #[test]
    fn intersect_clips_to_bounds() {
        let bounds = Rect::from_size(100, 50);
        assert_eq!(
            Rect::new(-10, 40, 20, 80).intersect(&bounds),
            Rect::new(0, 40, 20, 50)
        );
        assert!(Rect::new(200, 0, 300, 10).intersect(&bounds).is_empty());
    }

    #[test]
    fn bounding_single_pixel_has_area() {
        let r = Rect::bounding(vec![Point::new(3, 4)]).unwrap();
        assert_eq!(r, Rect::new(3, 4, 4, 5));
        assert_eq!(r.area(), 1);
        assert_eq!(Rect::bounding(Vec::new()), None);
    }

    #[test]
    fn parse_point() {
        assert_eq!("58, 70".parse::<Point>(), Ok(Point::new(58, 70)));
        assert_eq!("-3,4".parse::<Point>(), Ok(Point::new(-3, 4)));
        assert!(matches!(
            "58".parse::<Point>(),
            Err(ParsePointError::Format(_))
        ));
        assert!(matches!(
            "a,b".parse::<Point>(),
            Err(ParsePointError::Coordinate(_))
        ));
    }
}
