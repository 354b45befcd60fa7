//! Distance-based greedy point fusion.
//!
//! Used standalone and as the fallback when structural correspondence is
//! too weak. Each A point, in input order, claims the nearest unclaimed B
//! point within `merge_distance`; equidistant B points go to the lower index.

use serde::{Deserialize, Serialize};

use crate::core::{Point2D, PointIndex, TreadPoint};

/// Configuration for [`PointMerger`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PointMergerConfig {
    /// Maximum pairing distance in pixels.
    /// Default: 40.0
    pub merge_distance: f32,

    /// Pair similarity (1 - d / merge_distance) below which a pair is rejected.
    /// Default: 0.1
    pub min_similarity: f32,

    /// Multiplier applied to fused confidence (result clamped to [0, 1]).
    /// Default: 1.3
    pub confidence_boost: f32,
}

impl Default for PointMergerConfig {
    fn default() -> Self {
        Self {
            merge_distance: 40.0,
            min_similarity: 0.1,
            confidence_boost: 1.3,
        }
    }
}

impl PointMergerConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set merge distance
    pub fn with_merge_distance(mut self, distance: f32) -> Self {
        self.merge_distance = distance;
        self
    }

    /// Builder: set confidence boost
    pub fn with_confidence_boost(mut self, boost: f32) -> Self {
        self.confidence_boost = boost;
        self
    }
}

/// Where an output point came from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum PointOrigin {
    /// Fused from one A point and one B point
    Merged {
        /// Index in A
        index_a: usize,
        /// Index in B
        index_b: usize,
        /// Pair similarity
        similarity: f32,
    },
    /// Unclaimed A point
    FromA {
        /// Index in A
        index: usize,
    },
    /// Unclaimed B point
    FromB {
        /// Index in B
        index: usize,
    },
}

/// An output point with its provenance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergedPoint {
    /// Fused or passed-through point
    pub point: TreadPoint,
    /// Provenance
    pub origin: PointOrigin,
}

/// One accepted A/B pairing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointMatch {
    /// Index in A
    pub index_a: usize,
    /// Index in B
    pub index_b: usize,
    /// Pair distance (pixels)
    pub distance: f32,
    /// 1 - distance / merge_distance
    pub similarity: f32,
}

/// Output of [`PointMerger::merge`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointMergeResult {
    /// Fused points, then unclaimed A points, then unclaimed B points
    pub points: Vec<MergedPoint>,
    /// Accepted pairings in A order
    pub matches: Vec<PointMatch>,
    /// (points before - points after) / points before
    pub efficiency: f32,
}

impl PointMergeResult {
    /// Output points without provenance
    pub fn tread_points(&self) -> Vec<TreadPoint> {
        self.points.iter().map(|m| m.point).collect()
    }
}

/// Greedy nearest-neighbour point merger.
#[derive(Clone, Debug, Default)]
pub struct PointMerger {
    config: PointMergerConfig,
}

impl PointMerger {
    /// Create a merger
    pub fn new(config: PointMergerConfig) -> Self {
        Self { config }
    }

    /// Current config
    pub fn config(&self) -> &PointMergerConfig {
        &self.config
    }

    /// Merge two point sets. Points with undefined coordinates are dropped.
    pub fn merge(&self, a: &[TreadPoint], b: &[TreadPoint]) -> PointMergeResult {
        let valid_a: Vec<usize> = (0..a.len()).filter(|&i| a[i].is_valid()).collect();
        let valid_b: Vec<usize> = (0..b.len()).filter(|&i| b[i].is_valid()).collect();
        let dropped = a.len() + b.len() - valid_a.len() - valid_b.len();
        if dropped > 0 {
            log::warn!("[PointMerger] Dropped {} undefined point(s)", dropped);
        }

        let merge_distance = self.config.merge_distance.max(f32::EPSILON);
        let positions_b: Vec<Point2D> = valid_b.iter().map(|&ib| b[ib].position()).collect();
        let index_b = PointIndex::new(&positions_b);
        let mut claimed_b = vec![false; b.len()];
        let mut used_a = vec![false; a.len()];
        let mut points = Vec::new();
        let mut matches = Vec::new();

        for &ia in &valid_a {
            let pa = a[ia].position();
            let nearest = index_b.nearest(pa, merge_distance, |k| !claimed_b[valid_b[k]]);

            let Some((k, distance)) = nearest else {
                continue;
            };
            let ib = valid_b[k];
            let similarity = 1.0 - distance / merge_distance;
            if similarity < self.config.min_similarity {
                continue;
            }

            claimed_b[ib] = true;
            used_a[ia] = true;
            matches.push(PointMatch {
                index_a: ia,
                index_b: ib,
                distance,
                similarity,
            });
            points.push(MergedPoint {
                point: self.fuse(&a[ia], &b[ib], similarity),
                origin: PointOrigin::Merged {
                    index_a: ia,
                    index_b: ib,
                    similarity,
                },
            });
        }

        for &ia in valid_a.iter().filter(|&&i| !used_a[i]) {
            points.push(MergedPoint {
                point: a[ia],
                origin: PointOrigin::FromA { index: ia },
            });
        }
        for &ib in valid_b.iter().filter(|&&i| !claimed_b[i]) {
            points.push(MergedPoint {
                point: b[ib],
                origin: PointOrigin::FromB { index: ib },
            });
        }

        let before = valid_a.len() + valid_b.len();
        let efficiency = if before == 0 {
            0.0
        } else {
            (before - points.len()) as f32 / before as f32
        };

        log::debug!(
            "[PointMerger] {} pairs within {:.1}px, {} -> {} points",
            matches.len(),
            merge_distance,
            before,
            points.len()
        );

        PointMergeResult {
            points,
            matches,
            efficiency,
        }
    }

    fn fuse(&self, a: &TreadPoint, b: &TreadPoint, similarity: f32) -> TreadPoint {
        let wa = a.confidence.max(0.0);
        let wb = b.confidence.max(0.0) * similarity;
        let total = wa + wb;
        let pos = if total > f32::EPSILON {
            (a.position() * wa + b.position() * wb) * (1.0 / total)
        } else {
            (a.position() + b.position()) * 0.5
        };
        let confidence =
            ((a.confidence + b.confidence) / 2.0 * self.config.confidence_boost).clamp(0.0, 1.0);
        TreadPoint::new(pos.x, pos.y, confidence)
    }
}
