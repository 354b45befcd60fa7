//! Rigid transform estimation from correspondences.
//!
//! A [`Transformation`] maps the frame of graph A onto graph B:
//!
//! ```text
//! p' = pivot + s * R(θ) * (p - pivot) + translation
//! ```
//!
//! Rotation and scale come from chords between the best correspondences
//! (approximate Procrustes): θ is the circular mean of chord-angle
//! differences and s the mean chord-length ratio. The pivot is the centroid
//! of the matched A nodes, so the translation is the centroid delta.

use serde::{Deserialize, Serialize};

use super::correspondence::Correspondence;
use crate::core::Point2D;
use crate::core::math::{angle_diff, circular_mean, compute_centroid, deg_to_rad, rad_to_deg};
use crate::error::{Error, Result};
use crate::graph::Graph;

/// Shape of an estimated transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// No motion
    Identity,
    /// Offset only
    TranslationOnly,
    /// Rotation, uniform scale and offset
    Rigid,
}

/// Mapping from A's frame onto B's frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// Transform shape
    pub kind: TransformKind,
    /// Offset applied after rotation/scale (pixels)
    pub translation: Point2D,
    /// Rotation about the pivot (degrees, CCW)
    pub rotation: f32,
    /// Uniform scale about the pivot
    pub scale: f32,
    /// Rotation/scale centre in A's frame
    pub pivot: Point2D,
    /// Estimate confidence in [0, 1]
    pub confidence: f32,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transformation {
    /// The identity transform
    pub fn identity() -> Self {
        Self {
            kind: TransformKind::Identity,
            translation: Point2D::ZERO,
            rotation: 0.0,
            scale: 1.0,
            pivot: Point2D::ZERO,
            confidence: 0.0,
        }
    }

    /// Pure translation
    pub fn translation_only(translation: Point2D, confidence: f32) -> Self {
        Self {
            kind: TransformKind::TranslationOnly,
            translation,
            confidence,
            ..Self::identity()
        }
    }

    /// Rotation (degrees) and scale about `pivot`, then translation
    pub fn rigid(
        rotation_deg: f32,
        scale: f32,
        pivot: Point2D,
        translation: Point2D,
        confidence: f32,
    ) -> Self {
        Self {
            kind: TransformKind::Rigid,
            translation,
            rotation: rotation_deg,
            scale,
            pivot,
            confidence,
        }
    }

    /// Rotation in radians
    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        deg_to_rad(self.rotation)
    }

    /// Map a point from A's frame into B's frame
    pub fn apply(&self, p: Point2D) -> Point2D {
        let offset = (p - self.pivot).rotate(self.rotation_radians()) * self.scale;
        self.pivot + offset + self.translation
    }

    /// Map a point from B's frame back into A's frame
    pub fn inverse_apply(&self, p: Point2D) -> Point2D {
        let scale = if self.scale.abs() > f32::EPSILON {
            self.scale
        } else {
            1.0
        };
        let offset = (p - self.translation - self.pivot).rotate(-self.rotation_radians());
        self.pivot + offset * (1.0 / scale)
    }

    /// All parameters are finite and the scale is positive
    pub fn is_finite(&self) -> bool {
        self.translation.is_finite()
            && self.pivot.is_finite()
            && self.rotation.is_finite()
            && self.scale.is_finite()
            && self.scale > 0.0
            && self.confidence.is_finite()
    }
}

/// Estimates a [`Transformation`] from correspondences.
#[derive(Clone, Debug)]
pub struct TransformEstimator {
    /// Correspondences (best by score) used for rotation and scale
    pub top_k: usize,
}

impl Default for TransformEstimator {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

impl TransformEstimator {
    /// Create an estimator using the best `top_k` correspondences
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Estimate the A→B transform.
    ///
    /// Fewer than 3 usable pairs among the best correspondences yields a
    /// translation-only estimate; none yields identity.
    pub fn estimate(
        &self,
        correspondences: &[Correspondence],
        a: &Graph,
        b: &Graph,
    ) -> Result<Transformation> {
        let pairs: Vec<(Point2D, Point2D, f32)> = correspondences
            .iter()
            .filter_map(|c| Some((a.position(c.node_a)?, b.position(c.node_b)?, c.score)))
            .collect();
        if pairs.is_empty() {
            return Ok(Transformation::identity());
        }

        let mut ranked = pairs.clone();
        // Stable: equal scores keep correspondence order
        ranked.sort_by(|x, y| y.2.total_cmp(&x.2));
        ranked.truncate(self.top_k);

        let confidence = (0.5 + 0.05 * pairs.len() as f32).min(0.95);
        let pts_a: Vec<Point2D> = pairs.iter().map(|p| p.0).collect();
        let pts_b: Vec<Point2D> = pairs.iter().map(|p| p.1).collect();
        let centroid_a = compute_centroid(&pts_a);
        let centroid_b = compute_centroid(&pts_b);

        let transform = if ranked.len() < 3 {
            let n = ranked.len() as f32;
            let offset = ranked
                .iter()
                .fold(Point2D::ZERO, |acc, (pa, pb, _)| acc + (*pb - *pa))
                * (1.0 / n);
            Transformation::translation_only(offset, confidence)
        } else {
            let mut angle_deltas = Vec::new();
            let mut ratios = Vec::new();
            for i in 0..ranked.len() {
                for j in i + 1..ranked.len() {
                    let chord_a = ranked[j].0 - ranked[i].0;
                    let chord_b = ranked[j].1 - ranked[i].1;
                    let (len_a, len_b) = (chord_a.length(), chord_b.length());
                    if len_a <= f32::EPSILON || len_b <= f32::EPSILON {
                        continue;
                    }
                    angle_deltas.push(angle_diff(
                        chord_a.y.atan2(chord_a.x),
                        chord_b.y.atan2(chord_b.x),
                    ));
                    ratios.push(len_b / len_a);
                }
            }
            if angle_deltas.is_empty() {
                Transformation::translation_only(centroid_b - centroid_a, confidence)
            } else {
                let rotation = rad_to_deg(circular_mean(&angle_deltas));
                let scale = ratios.iter().sum::<f32>() / ratios.len() as f32;
                Transformation::rigid(
                    rotation,
                    scale,
                    centroid_a,
                    centroid_b - centroid_a,
                    confidence,
                )
            }
        };

        if !transform.is_finite() {
            return Err(Error::non_finite("transform estimate"));
        }
        log::debug!(
            "[TransformEstimator] {:?}: rotation {:.2}°, scale {:.3}, t=({:.1}, {:.1}), conf {:.2}",
            transform.kind,
            transform.rotation,
            transform.scale,
            transform.translation.x,
            transform.translation.y,
            transform.confidence
        );
        Ok(transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn graph_of(points: &[Point2D]) -> Graph {
        let mut g = Graph::new("t");
        for p in points {
            g.add_node(*p, 1.0);
        }
        g
    }

    fn identity_matches(n: usize) -> Vec<Correspondence> {
        (0..n)
            .map(|i| Correspondence {
                index_a: i,
                index_b: i,
                node_a: i as u32,
                node_b: i as u32,
                score: 0.9 - i as f32 * 0.01,
            })
            .collect()
    }

    fn sample_points() -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(40.0, 5.0),
            Point2D::new(12.0, 50.0),
            Point2D::new(60.0, 45.0),
            Point2D::new(30.0, 90.0),
            Point2D::new(75.0, 100.0),
        ]
    }

    #[test]
    fn test_apply_inverse_roundtrip() {
        let pivot = Point2D::new(5.0, 5.0);
        let t = Transformation::rigid(37.0, 1.2, pivot, Point2D::new(10.0, -3.0), 0.9);
        let p = Point2D::new(17.0, 42.0);
        let back = t.inverse_apply(t.apply(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-3);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-3);
    }

    #[test]
    fn test_recovers_rigid_motion() {
        let a_pts = sample_points();
        let pivot = compute_centroid(&a_pts);
        let truth = Transformation::rigid(90.0, 1.0, pivot, Point2D::new(300.0, 100.0), 1.0);
        let b_pts: Vec<Point2D> = a_pts.iter().map(|p| truth.apply(*p)).collect();

        let est = TransformEstimator::default()
            .estimate(&identity_matches(6), &graph_of(&a_pts), &graph_of(&b_pts))
            .unwrap();
        assert_eq!(est.kind, TransformKind::Rigid);
        assert_relative_eq!(est.rotation, 90.0, epsilon = 0.1);
        assert_relative_eq!(est.scale, 1.0, epsilon = 1e-3);
        assert_relative_eq!(est.translation.x, 300.0, epsilon = 0.1);
        assert_relative_eq!(est.translation.y, 100.0, epsilon = 0.1);
        assert_relative_eq!(est.confidence, 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_few_pairs_translation_only() {
        let a_pts = sample_points();
        let b_pts: Vec<Point2D> = a_pts.iter().map(|p| *p + Point2D::new(3.0, 4.0)).collect();
        let est = TransformEstimator::default()
            .estimate(&identity_matches(2), &graph_of(&a_pts), &graph_of(&b_pts))
            .unwrap();
        assert_eq!(est.kind, TransformKind::TranslationOnly);
        assert_relative_eq!(est.translation.x, 3.0, epsilon = 1e-4);
        assert_relative_eq!(est.translation.y, 4.0, epsilon = 1e-4);
    }

    #[test]
    fn test_no_pairs_identity() {
        let g = graph_of(&sample_points());
        let est = TransformEstimator::default().estimate(&[], &g, &g).unwrap();
        assert_eq!(est.kind, TransformKind::Identity);
    }

    #[test]
    fn test_confidence_caps() {
        let pts: Vec<Point2D> = (0..20)
            .map(|i| Point2D::new(i as f32 * 7.0, (i * i) as f32))
            .collect();
        let g = graph_of(&pts);
        let est = TransformEstimator::default().estimate(&identity_matches(20), &g, &g).unwrap();
        assert_relative_eq!(est.confidence, 0.95);
    }
}
