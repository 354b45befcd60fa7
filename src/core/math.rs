//! Mathematical utilities for angles and summary statistics.
//!
//! All angles are in radians, counter-clockwise positive.

use std::f32::consts::PI;

use super::point::Point2D;

/// Two times PI (full circle in radians).
pub const TWO_PI: f32 = 2.0 * PI;

/// Normalize angle to [-π, π).
///
/// # Example
/// ```
/// use pada_match::core::math::normalize_angle;
/// use std::f32::consts::PI;
///
/// assert!((normalize_angle(PI / 2.0) - PI / 2.0).abs() < 1e-6);
/// assert!(normalize_angle(3.0 * PI).abs() - PI < 1e-5);
/// ```
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % TWO_PI;
    if a >= PI {
        a -= TWO_PI;
    } else if a < -PI {
        a += TWO_PI;
    }
    a
}

/// Normalize angle to [0, 2π).
#[inline]
pub fn normalize_angle_positive(angle: f32) -> f32 {
    let a = angle.rem_euclid(TWO_PI);
    // rem_euclid can return exactly TWO_PI for tiny negative inputs
    if a >= TWO_PI { 0.0 } else { a }
}

/// Signed shortest angular difference from `from` to `to`, in [-π, π).
///
/// # Example
/// ```
/// use pada_match::core::math::angle_diff;
/// use std::f32::consts::PI;
///
/// let diff = angle_diff(-0.9 * PI, 0.9 * PI);
/// assert!((diff - (-0.2 * PI)).abs() < 1e-5);
/// ```
#[inline]
pub fn angle_diff(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

/// Convert degrees to radians.
#[inline]
pub fn deg_to_rad(deg: f32) -> f32 {
    deg * PI / 180.0
}

/// Convert radians to degrees.
#[inline]
pub fn rad_to_deg(rad: f32) -> f32 {
    rad * 180.0 / PI
}

/// Circular mean of a set of angles. Returns 0.0 for empty input.
pub fn circular_mean(angles: &[f32]) -> f32 {
    if angles.is_empty() {
        return 0.0;
    }
    let (sum_sin, sum_cos) = angles
        .iter()
        .fold((0.0f32, 0.0f32), |(s, c), a| (s + a.sin(), c + a.cos()));
    sum_sin.atan2(sum_cos)
}

/// Centroid of a set of points. Returns origin for empty input.
pub fn compute_centroid(points: &[Point2D]) -> Point2D {
    if points.is_empty() {
        return Point2D::ZERO;
    }
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point2D::new(sx / n, sy / n)
}

/// Arithmetic mean. Returns 0.0 for empty input.
#[inline]
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population variance. Returns 0.0 for fewer than two values.
pub fn variance(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32
}

/// Population standard deviation.
#[inline]
pub fn std_dev(values: &[f32]) -> f32 {
    variance(values).sqrt()
}

/// Ratio of the smaller to the larger magnitude, in [0, 1].
///
/// Two zeros compare as identical (1.0).
#[inline]
pub fn min_max_ratio(a: f32, b: f32) -> f32 {
    let (a, b) = (a.abs(), b.abs());
    let hi = a.max(b);
    if hi <= f32::EPSILON {
        1.0
    } else {
        a.min(b) / hi
    }
}

/// Closeness of two magnitudes: `1 - |a - b| / max(a, b)`, clamped to [0, 1].
#[inline]
pub fn relative_closeness(a: f32, b: f32) -> f32 {
    let hi = a.abs().max(b.abs());
    if hi <= f32::EPSILON {
        return 1.0;
    }
    (1.0 - (a - b).abs() / hi).clamp(0.0, 1.0)
}

/// Score for an absolute difference against a tolerance: 1 at zero
/// difference, falling linearly to 0 at `tolerance`.
#[inline]
pub fn tolerance_score(a: f32, b: f32, tolerance: f32) -> f32 {
    if tolerance <= 0.0 {
        return if (a - b).abs() <= f32::EPSILON { 1.0 } else { 0.0 };
    }
    (1.0 - (a - b).abs() / tolerance).clamp(0.0, 1.0)
}

/// Divide, returning `fallback` when the denominator is ~0.
#[inline]
pub fn safe_div(num: f32, den: f32, fallback: f32) -> f32 {
    if den.abs() <= f32::EPSILON {
        fallback
    } else {
        num / den
    }
}

/// Inner angle at `vertex` between rays to `a` and `b`, in [0, π].
#[inline]
pub fn inner_angle(vertex: Point2D, a: Point2D, b: Point2D) -> f32 {
    angle_diff(vertex.angle_to(&a), vertex.angle_to(&b)).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_angle_positive() {
        assert_relative_eq!(normalize_angle_positive(-PI / 2.0), 1.5 * PI, epsilon = 1e-5);
        assert_relative_eq!(normalize_angle_positive(5.0 * PI), PI, epsilon = 1e-4);
        assert!(normalize_angle_positive(-1e-9) < TWO_PI);
    }

    #[test]
    fn test_circular_mean_wraps() {
        let m = circular_mean(&[PI - 0.1, -PI + 0.1]);
        assert_relative_eq!(m.abs(), PI, epsilon = 1e-4);
        assert_eq!(circular_mean(&[]), 0.0);
    }

    #[test]
    fn test_centroid() {
        let pts = [
            Point2D::new(0.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(2.0, 2.0),
            Point2D::new(0.0, 2.0),
        ];
        let c = compute_centroid(&pts);
        assert_relative_eq!(c.x, 1.0);
        assert_relative_eq!(c.y, 1.0);
    }

    #[test]
    fn test_statistics() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(mean(&v), 2.5);
        assert_relative_eq!(variance(&v), 1.25);
        assert_eq!(variance(&[5.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_ratios() {
        assert_relative_eq!(min_max_ratio(50.0, 100.0), 0.5);
        assert_eq!(min_max_ratio(0.0, 0.0), 1.0);
        assert_relative_eq!(relative_closeness(8.0, 10.0), 0.8);
        assert_relative_eq!(tolerance_score(0.3, 0.4, 0.2), 0.5, epsilon = 1e-5);
        assert_eq!(tolerance_score(0.0, 1.0, 0.2), 0.0);
        assert_eq!(safe_div(1.0, 0.0, 7.0), 7.0);
    }

    #[test]
    fn test_inner_angle() {
        let a = inner_angle(
            Point2D::ZERO,
            Point2D::new(1.0, 0.0),
            Point2D::new(0.0, 1.0),
        );
        assert_relative_eq!(a, PI / 2.0, epsilon = 1e-6);
    }
}
