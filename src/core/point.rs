//! Point types for tread geometry.
//!
//! Coordinates are image pixels. Angles are radians, counter-clockwise
//! positive from +X.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// A 2D position or displacement (pixels).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate in pixels
    pub x: f32,
    /// Y coordinate in pixels
    pub y: f32,
}

impl Point2D {
    /// Create a new point
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Zero point (origin)
    pub const ZERO: Point2D = Point2D { x: 0.0, y: 0.0 };

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Squared distance (avoids sqrt)
    #[inline]
    pub fn distance_squared(&self, other: &Point2D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Bearing from this point to another (radians, CCW from +X)
    #[inline]
    pub fn angle_to(&self, other: &Point2D) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Rotate this point around the origin by angle (radians)
    #[inline]
    pub fn rotate(&self, angle: f32) -> Point2D {
        let (sin_a, cos_a) = angle.sin_cos();
        Point2D::new(
            self.x * cos_a - self.y * sin_a,
            self.x * sin_a + self.y * cos_a,
        )
    }

    /// Rotate this point around `pivot` by angle (radians)
    #[inline]
    pub fn rotate_about(&self, pivot: Point2D, angle: f32) -> Point2D {
        (*self - pivot).rotate(angle) + pivot
    }

    /// Length of this point as a vector from origin
    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction (unchanged if zero-length)
    #[inline]
    pub fn normalized(&self) -> Point2D {
        let len = self.length();
        if len > f32::EPSILON {
            Point2D::new(self.x / len, self.y / len)
        } else {
            *self
        }
    }

    /// Counter-clockwise perpendicular vector
    #[inline]
    pub fn perpendicular(&self) -> Point2D {
        Point2D::new(-self.y, self.x)
    }

    /// Dot product
    #[inline]
    pub fn dot(&self, other: &Point2D) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Cross product (z-component of 3D cross product)
    #[inline]
    pub fn cross(&self, other: &Point2D) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Both coordinates are finite numbers
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point2D {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Point2D::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point2D {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Point2D::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f32> for Point2D {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Point2D::new(self.x * scalar, self.y * scalar)
    }
}

impl Neg for Point2D {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Point2D::new(-self.x, -self.y)
    }
}

/// A digitized protector (tread contact) point.
///
/// Produced upstream by the detection step. `confidence` is the detector's
/// belief that the point is a real contact point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreadPoint {
    /// X coordinate in pixels
    pub x: f32,
    /// Y coordinate in pixels
    pub y: f32,
    /// Detection confidence in [0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl TreadPoint {
    /// Create a new tread point
    #[inline]
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Position without confidence
    #[inline]
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Coordinates are defined (finite)
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.position().is_finite()
    }
}

impl From<Point2D> for TreadPoint {
    fn from(p: Point2D) -> Self {
        TreadPoint::new(p.x, p.y, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_angle_to() {
        let origin = Point2D::ZERO;
        assert!((origin.angle_to(&Point2D::new(1.0, 0.0))).abs() < 1e-6);
        assert!(
            (origin.angle_to(&Point2D::new(0.0, 1.0)) - std::f32::consts::FRAC_PI_2).abs() < 1e-6
        );
    }

    #[test]
    fn test_rotate_about() {
        let p = Point2D::new(2.0, 1.0);
        let rotated = p.rotate_about(Point2D::new(1.0, 1.0), std::f32::consts::FRAC_PI_2);
        assert!((rotated.x - 1.0).abs() < 1e-6);
        assert!((rotated.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_tread_point() {
        assert!(TreadPoint::new(1.0, 2.0, 0.5).is_valid());
        assert!(!TreadPoint::new(f32::NAN, 2.0, 0.5).is_valid());
        assert!(!TreadPoint::new(1.0, f32::INFINITY, 0.5).is_valid());
    }

    #[test]
    fn test_confidence_defaults_when_missing() {
        let p: TreadPoint = serde_json::from_str(r#"{"x": 1.0, "y": 2.0}"#).unwrap();
        assert_eq!(p.confidence, 1.0);
    }
}
