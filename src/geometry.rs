//! Scene-space geometry: points, bounding boxes and image placements
//!
//! Scene coordinates are the content coordinates of the canvas: the base
//! image's pixels map 1:1 onto scene units until something transforms it.
//! Screen coordinates stay in `egui::Pos2` and only meet scene coordinates
//! through the viewport.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl std::ops::Add for Point {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Smallest box containing every point, `None` for an empty slice
    pub fn from_points(points: &[Point]) -> Option<Bounds> {
        let first = points.first()?;
        let mut bounds = Bounds::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.max_y = bounds.max_y.max(p.y);
        }
        Some(bounds)
    }

    pub fn expand(&mut self, other: &Bounds) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn inflate(&self, amount: f32) -> Bounds {
        Bounds::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn min(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Overlap test; boxes that only touch along an edge count as overlapping
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }
}

/// Where an image sits in the scene: centered on `center`, scaled, then
/// rotated by `angle` degrees around its center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub center: Point,
    pub scale_x: f32,
    pub scale_y: f32,
    pub angle: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            center: Point::ORIGIN,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }
}

impl Placement {
    /// Unscaled, unrotated placement whose top-left corner is the scene origin
    pub fn at_origin(width: u32, height: u32) -> Self {
        Self {
            center: Point::new(width as f32 / 2.0, height as f32 / 2.0),
            ..Self::default()
        }
    }

    /// Corners in scene space, clockwise from top-left
    pub fn corners(&self, width: u32, height: u32) -> [Point; 4] {
        let hw = width as f32 * self.scale_x / 2.0;
        let hh = height as f32 * self.scale_y / 2.0;
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let rotate = |x: f32, y: f32| {
            Point::new(
                self.center.x + x * cos - y * sin,
                self.center.y + x * sin + y * cos,
            )
        };
        [
            rotate(-hw, -hh),
            rotate(hw, -hh),
            rotate(hw, hh),
            rotate(-hw, hh),
        ]
    }

    pub fn bounds(&self, width: u32, height: u32) -> Bounds {
        let corners = self.corners(width, height);
        let mut bounds = Bounds::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
        for c in &corners[1..] {
            bounds.expand(&Bounds::new(c.x, c.y, c.x, c.y));
        }
        bounds
    }

    pub fn translate(&mut self, delta: Point) {
        self.center = self.center + delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_points() {
        let b = Bounds::from_points(&[Point::new(3.0, 4.0), Point::new(-1.0, 10.0)]).unwrap();
        assert_eq!(b, Bounds::new(-1.0, 4.0, 3.0, 10.0));
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_touching_bounds_intersect() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::new(10.0, 0.0, 20.0, 10.0);
        let c = Bounds::new(10.5, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_placement_at_origin_bounds() {
        let p = Placement::at_origin(800, 600);
        assert_eq!(p.bounds(800, 600), Bounds::new(0.0, 0.0, 800.0, 600.0));
    }

    #[test]
    fn test_rotated_placement_bounds() {
        let p = Placement {
            center: Point::new(0.0, 0.0),
            angle: 90.0,
            ..Placement::default()
        };
        let b = p.bounds(200, 100);
        assert!((b.width() - 100.0).abs() < 1e-3);
        assert!((b.height() - 200.0).abs() < 1e-3);
    }
}
