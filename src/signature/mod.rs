//! Star-vector signatures: per-node local topology fingerprints.
//!
//! Each node is described by vectors to its nearest (up to 10) other nodes,
//! summarized into two normalized histograms:
//!
//! ```text
//!    Relative angle (8 bins, 45° each, bin 0 starts at the nearest neighbour)
//!
//!    Relative distance (4 bins, distance / mean distance, soft votes)
//!    ┌──────┬──────┬──────┬──────┐
//!    │ 0.5  │ 0.8  │ 1.1  │ 1.4  │   bin centres
//!    └──────┴──────┴──────┴──────┘
//! ```
//!
//! Angles are measured from the bearing of the nearest neighbour and
//! distances are divided by the mean kept distance, so a signature does not
//! change under rotation, translation or uniform scaling of the point set.
//! Both histograms split each vote linearly between the two closest bin
//! centres, which keeps small noise from flipping a whole vote across a bin
//! edge.
//!
//! When several neighbours are tied for nearest, rounding decides which one
//! a rotated copy picks. Every tied neighbour therefore contributes its own
//! angle histogram, and comparisons take the best pairing.
//!
//! Two comparators are provided and kept separate:
//! - [`StarSignature::local_similarity`]: angle .6 / distance .4, used by the
//!   coarse matcher's detailed stage.
//! - [`StarSignature::correspondence_similarity`]: angle .4 / distance .3 /
//!   degree closeness .3, used by the correspondence finder.

use serde::{Deserialize, Serialize};

use crate::core::math::{TWO_PI, normalize_angle_positive};
use crate::core::{Point2D, PointIndex};
use crate::graph::{Graph, NodeId};

/// Number of bins in the relative-angle histogram.
pub const ANGLE_BINS: usize = 8;

/// Number of bins in the relative-distance histogram.
pub const DISTANCE_BINS: usize = 4;

/// Centre of the first relative-distance bin.
const DISTANCE_BIN_START: f32 = 0.5;

/// Spacing between relative-distance bin centres.
const DISTANCE_BIN_SPACING: f32 = 0.3;

/// Neighbours within this relative margin of the nearest are tied with it.
const REFERENCE_TIE_TOLERANCE: f32 = 1e-3;

/// Configuration for signature construction and comparison.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Nearest nodes kept per signature.
    /// Default: 10
    pub max_vectors: usize,

    /// Sharpness `k` of the histogram kernel `exp(-k * L1)` used by the
    /// coarse matcher's local-structure comparison.
    /// Default: 2.0
    pub histogram_sharpness: f32,

    /// Kernel sharpness used by the correspondence finder.
    /// Must keep unrelated neighbourhoods below the correspondence
    /// threshold, so it is much stricter than `histogram_sharpness`.
    /// Default: 6.0
    pub correspondence_sharpness: f32,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            max_vectors: 10,
            histogram_sharpness: 2.0,
            correspondence_sharpness: 6.0,
        }
    }
}

impl SignatureConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set max vectors
    pub fn with_max_vectors(mut self, n: usize) -> Self {
        self.max_vectors = n;
        self
    }

    /// Builder: set histogram sharpness
    pub fn with_histogram_sharpness(mut self, k: f32) -> Self {
        self.histogram_sharpness = k;
        self
    }

    /// Builder: set correspondence sharpness
    pub fn with_correspondence_sharpness(mut self, k: f32) -> Self {
        self.correspondence_sharpness = k;
        self
    }
}

/// Vector from a signature's centre node to one nearby node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StarVector {
    /// Target node id
    pub target: NodeId,
    /// X offset (pixels)
    pub dx: f32,
    /// Y offset (pixels)
    pub dy: f32,
    /// Euclidean distance (pixels)
    pub distance: f32,
    /// Absolute bearing (radians)
    pub angle: f32,
}

impl StarVector {
    /// Vector from `center` to `target` at `position`.
    pub fn between(center: Point2D, target: NodeId, position: Point2D) -> Self {
        let d = position - center;
        Self {
            target,
            dx: d.x,
            dy: d.y,
            distance: d.length(),
            angle: d.y.atan2(d.x),
        }
    }
}

/// Local topology fingerprint of one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StarSignature {
    /// Centre node id
    pub node_id: NodeId,
    /// Graph degree of the centre node
    pub degree: usize,
    /// Vectors to nearest nodes, ascending by distance
    pub vectors: Vec<StarVector>,
    /// Relative-angle histogram (sums to 1 when vectors exist)
    pub angle_histogram: [f32; ANGLE_BINS],
    /// Angle histograms measured from neighbours tied with the nearest
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_angle_histograms: Vec<[f32; ANGLE_BINS]>,
    /// Relative-distance histogram (sums to 1 when vectors exist)
    pub distance_histogram: [f32; DISTANCE_BINS],
}

impl StarSignature {
    /// Build the signature of `center` from all candidate positions.
    ///
    /// `others` may include the centre node itself; it is skipped by id.
    pub fn compute(
        node_id: NodeId,
        center: Point2D,
        degree: usize,
        others: &[(NodeId, Point2D)],
        max_vectors: usize,
    ) -> Self {
        let positions: Vec<Point2D> = others.iter().map(|(_, p)| *p).collect();
        let index = PointIndex::new(&positions);
        Self::from_index(node_id, center, degree, others, &index, max_vectors)
    }

    /// `compute` against a prebuilt index over `others`.
    fn from_index(
        node_id: NodeId,
        center: Point2D,
        degree: usize,
        others: &[(NodeId, Point2D)],
        index: &PointIndex,
        max_vectors: usize,
    ) -> Self {
        let vectors: Vec<StarVector> = index
            .k_nearest(center, max_vectors, f32::INFINITY, |i| others[i].0 != node_id)
            .into_iter()
            .map(|(i, _)| StarVector::between(center, others[i].0, others[i].1))
            .collect();

        let mut angle_histogram = [0.0f32; ANGLE_BINS];
        let mut alternate_angle_histograms = Vec::new();
        let mut distance_histogram = [0.0f32; DISTANCE_BINS];

        if let Some(nearest) = vectors.first() {
            let tie_limit = nearest.distance * (1.0 + REFERENCE_TIE_TOLERANCE);
            angle_histogram = relative_angle_histogram(&vectors, nearest.angle);
            alternate_angle_histograms = vectors[1..]
                .iter()
                .take_while(|v| v.distance <= tie_limit)
                .map(|v| relative_angle_histogram(&vectors, v.angle))
                .collect();
            distance_histogram = relative_distance_histogram(&vectors);
        }

        Self {
            node_id,
            degree,
            vectors,
            angle_histogram,
            alternate_angle_histograms,
            distance_histogram,
        }
    }

    /// Primary angle histogram followed by the tied alternates
    pub fn angle_histograms(&self) -> impl Iterator<Item = &[f32; ANGLE_BINS]> {
        std::iter::once(&self.angle_histogram).chain(&self.alternate_angle_histograms)
    }

    /// Best angle-histogram similarity over every pairing of references.
    pub fn angle_similarity(&self, other: &StarSignature, sharpness: f32) -> f32 {
        self.angle_histograms()
            .flat_map(|a| {
                other
                    .angle_histograms()
                    .map(move |b| histogram_similarity(a, b, sharpness))
            })
            .fold(0.0f32, f32::max)
    }

    /// Comparator for the coarse matcher: angle .6 / distance .4.
    pub fn local_similarity(&self, other: &StarSignature, sharpness: f32) -> f32 {
        0.6 * self.angle_similarity(other, sharpness)
            + 0.4
                * histogram_similarity(
                    &self.distance_histogram,
                    &other.distance_histogram,
                    sharpness,
                )
    }

    /// Comparator for correspondence search: angle .4 / distance .3 /
    /// degree closeness .3.
    pub fn correspondence_similarity(&self, other: &StarSignature, sharpness: f32) -> f32 {
        let da = self.degree as f32;
        let db = other.degree as f32;
        let degree_closeness = 1.0 - (da - db).abs() / da.max(db).max(1.0);

        0.4 * self.angle_similarity(other, sharpness)
            + 0.3
                * histogram_similarity(
                    &self.distance_histogram,
                    &other.distance_histogram,
                    sharpness,
                )
            + 0.3 * degree_closeness
    }
}

/// Angles relative to `reference`, split between the two nearest bin centres.
fn relative_angle_histogram(vectors: &[StarVector], reference: f32) -> [f32; ANGLE_BINS] {
    let mut hist = [0.0f32; ANGLE_BINS];
    let bin_width = TWO_PI / ANGLE_BINS as f32;
    for v in vectors {
        let relative = normalize_angle_positive(v.angle - reference);
        let pos = relative / bin_width - 0.5;
        let lo = pos.floor();
        let frac = pos - lo;
        let lo_bin = (lo as i32).rem_euclid(ANGLE_BINS as i32) as usize;
        let hi_bin = (lo_bin + 1) % ANGLE_BINS;
        hist[lo_bin] += 1.0 - frac;
        hist[hi_bin] += frac;
    }
    normalize(&mut hist);
    hist
}

/// Distance / mean distance, split between the two nearest bin centres and
/// clamped to the outer bins.
fn relative_distance_histogram(vectors: &[StarVector]) -> [f32; DISTANCE_BINS] {
    let mut hist = [0.0f32; DISTANCE_BINS];
    let mean_distance = vectors.iter().map(|v| v.distance).sum::<f32>() / vectors.len() as f32;
    let last = DISTANCE_BINS - 1;
    for v in vectors {
        let ratio = if mean_distance > f32::EPSILON {
            v.distance / mean_distance
        } else {
            0.0
        };
        let pos = ((ratio - DISTANCE_BIN_START) / DISTANCE_BIN_SPACING).clamp(0.0, last as f32);
        let lo = (pos.floor() as usize).min(last - 1);
        let frac = pos - lo as f32;
        hist[lo] += 1.0 - frac;
        hist[lo + 1] += frac;
    }
    normalize(&mut hist);
    hist
}

fn normalize(hist: &mut [f32]) {
    let sum: f32 = hist.iter().sum();
    if sum > f32::EPSILON {
        hist.iter_mut().for_each(|v| *v /= sum);
    }
}

/// Histogram similarity kernel `exp(-sharpness * L1)`, in (0, 1].
pub fn histogram_similarity(a: &[f32], b: &[f32], sharpness: f32) -> f32 {
    let l1: f32 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
    (-sharpness * l1).exp()
}

/// Builds star-vector signatures for every node of a graph.
#[derive(Clone, Debug, Default)]
pub struct SignatureBuilder {
    config: SignatureConfig,
}

impl SignatureBuilder {
    /// Create a builder with the given config
    pub fn new(config: SignatureConfig) -> Self {
        Self { config }
    }

    /// Current config
    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Signatures in node-id order.
    pub fn build_signatures(&self, graph: &Graph) -> Vec<StarSignature> {
        let others: Vec<(NodeId, Point2D)> = graph.nodes().map(|n| (n.id, n.position)).collect();
        let index = PointIndex::new(&graph.position_list());
        graph
            .nodes()
            .map(|n| {
                StarSignature::from_index(
                    n.id,
                    n.position,
                    n.degree(),
                    &others,
                    &index,
                    self.config.max_vectors,
                )
            })
            .collect()
    }

    /// Mean best-match local similarity, averaged over both directions.
    ///
    /// Returns 0.0 when either side is empty.
    pub fn local_structure_similarity(&self, a: &[StarSignature], b: &[StarSignature]) -> f32 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let k = self.config.histogram_sharpness;
        let directed = |from: &[StarSignature], to: &[StarSignature]| {
            from.iter()
                .map(|s| {
                    to.iter()
                        .map(|t| s.local_similarity(t, k))
                        .fold(0.0f32, f32::max)
                })
                .sum::<f32>()
                / from.len() as f32
        };
        (directed(a, b) + directed(b, a)) / 2.0
    }
}
