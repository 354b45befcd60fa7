//! The five geometric checks.
//!
//! Each check compares `before` and `after` positions over the edges and
//! neighbourhoods of one graph and yields a [`CheckResult`]. A check with
//! nothing to measure passes with score 1 and zero samples.

use std::collections::BTreeMap;
use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use super::validator::ValidatorConfig;
use crate::core::Point2D;
use crate::core::math::{inner_angle, mean, relative_closeness, variance};
use crate::graph::{Graph, NodeId};

/// Below this a before-length or axis component is degenerate.
const MIN_LENGTH: f32 = 1e-3;

/// Which check produced a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Edge lengths change by one common ratio
    DistanceRelations,
    /// Neighbour-pair angles are kept
    AnglePreservation,
    /// No edge is torn apart
    Connectivity,
    /// X and Y scale alike
    ScaleUniformity,
    /// Each neighbourhood keeps its shape
    LocalStructure,
}

impl CheckKind {
    /// All checks in evaluation order
    pub const ALL: [CheckKind; 5] = [
        CheckKind::DistanceRelations,
        CheckKind::AnglePreservation,
        CheckKind::Connectivity,
        CheckKind::ScaleUniformity,
        CheckKind::LocalStructure,
    ];

    /// Weight in the overall score
    pub fn weight(&self) -> f32 {
        match self {
            CheckKind::DistanceRelations => 0.35,
            CheckKind::AnglePreservation => 0.25,
            CheckKind::Connectivity => 0.20,
            CheckKind::ScaleUniformity => 0.10,
            CheckKind::LocalStructure => 0.10,
        }
    }

    /// Check name for reports
    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::DistanceRelations => "distance_relations",
            CheckKind::AnglePreservation => "angle_preservation",
            CheckKind::Connectivity => "connectivity",
            CheckKind::ScaleUniformity => "scale_uniformity",
            CheckKind::LocalStructure => "local_structure",
        }
    }
}

/// Per-check measurements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckMetrics {
    /// Nothing to measure
    Empty,
    /// See [`CheckKind::DistanceRelations`]
    DistanceRelations {
        /// Mean after/before length ratio
        mean_ratio: f32,
        /// Variance of the ratios
        ratio_variance: f32,
        /// Mean |ratio - mean| / mean
        mean_relative_error: f32,
    },
    /// See [`CheckKind::AnglePreservation`]
    AnglePreservation {
        /// Mean absolute change (radians)
        mean_change: f32,
        /// Largest absolute change (radians)
        max_change: f32,
        /// Fraction of angles within tolerance
        within_tolerance: f32,
    },
    /// See [`CheckKind::Connectivity`]
    Connectivity {
        /// Edges judged broken
        broken_edges: usize,
        /// Fraction of edges preserved
        preserved_fraction: f32,
    },
    /// See [`CheckKind::ScaleUniformity`]
    ScaleUniformity {
        /// Mean X-axis scale ratio
        mean_scale_x: f32,
        /// Mean Y-axis scale ratio
        mean_scale_y: f32,
        /// Variance of X ratios
        variance_x: f32,
        /// Variance of Y ratios
        variance_y: f32,
        /// |mean_x - mean_y| / max(mean_x, mean_y)
        discrepancy: f32,
        /// Edges whose X/Y ratios diverge beyond the threshold
        anisotropic_edges: usize,
    },
    /// See [`CheckKind::LocalStructure`]
    LocalStructure {
        /// Mean per-node preservation
        mean_preservation: f32,
        /// Fraction of nodes at or above the threshold
        preserved_nodes: f32,
    },
}

/// Outcome of one check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Which check ran
    pub kind: CheckKind,
    /// Whether the check met its tolerance
    pub passed: bool,
    /// Score in [0, 1]
    pub score: f32,
    /// Number of measurements the check is based on
    pub samples: usize,
    /// Raw measurements behind the score
    pub metrics: CheckMetrics,
}

impl CheckResult {
    fn empty(kind: CheckKind) -> Self {
        Self {
            kind,
            passed: true,
            score: 1.0,
            samples: 0,
            metrics: CheckMetrics::Empty,
        }
    }
}

/// Positions and topology shared by all checks.
pub(super) struct CheckInput<'a> {
    before: &'a BTreeMap<NodeId, Point2D>,
    after: &'a BTreeMap<NodeId, Point2D>,
    edges: Vec<(NodeId, NodeId)>,
    neighbors: BTreeMap<NodeId, Vec<NodeId>>,
}

impl<'a> CheckInput<'a> {
    /// Restrict `graph`'s topology to nodes present in both position maps.
    pub(super) fn new(
        before: &'a BTreeMap<NodeId, Point2D>,
        after: &'a BTreeMap<NodeId, Point2D>,
        graph: &Graph,
    ) -> Self {
        let known = |id: &NodeId| before.contains_key(id) && after.contains_key(id);
        let edges: Vec<(NodeId, NodeId)> = graph
            .edges()
            .filter(|e| known(&e.source) && known(&e.target))
            .map(|e| (e.source, e.target))
            .collect();
        let neighbors: BTreeMap<NodeId, Vec<NodeId>> = graph
            .nodes()
            .filter(|n| known(&n.id))
            .map(|n| (n.id, n.neighbors.iter().copied().filter(known).collect::<Vec<_>>()))
            .collect();
        Self {
            before,
            after,
            edges,
            neighbors,
        }
    }

    /// Number of edges the checks run over
    pub(super) fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn pair(&self, a: NodeId, b: NodeId) -> Option<((Point2D, Point2D), (Point2D, Point2D))> {
        Some((
            (*self.before.get(&a)?, *self.before.get(&b)?),
            (*self.after.get(&a)?, *self.after.get(&b)?),
        ))
    }

    /// (before, after) length per non-degenerate edge
    fn edge_lengths(&self) -> Vec<(f32, f32)> {
        self.edges
            .iter()
            .filter_map(|&(a, b)| self.pair(a, b))
            .map(|((b0, b1), (a0, a1))| (b0.distance(&b1), a0.distance(&a1)))
            .filter(|(before, _)| *before > MIN_LENGTH)
            .collect()
    }

    /// (before, after) inner angle for every neighbour pair at `center`
    fn angle_pairs(&self, center: NodeId) -> Vec<(f32, f32)> {
        let (Some(&bc), Some(&ac)) = (self.before.get(&center), self.after.get(&center)) else {
            return Vec::new();
        };
        let Some(nbrs) = self.neighbors.get(&center) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (i, &p) in nbrs.iter().enumerate() {
            for &q in &nbrs[i + 1..] {
                let Some(((bp, bq), (ap, aq))) = self.pair(p, q) else {
                    continue;
                };
                let degenerate = bc.distance(&bp) < MIN_LENGTH
                    || bc.distance(&bq) < MIN_LENGTH
                    || ac.distance(&ap) < MIN_LENGTH
                    || ac.distance(&aq) < MIN_LENGTH;
                if !degenerate {
                    out.push((inner_angle(bc, bp, bq), inner_angle(ac, ap, aq)));
                }
            }
        }
        out
    }

    /// Mean after/before length ratio, 1 when there are no edges
    fn mean_ratio(&self) -> f32 {
        let ratios: Vec<f32> = self.edge_lengths().iter().map(|(b, a)| a / b).collect();
        if ratios.is_empty() { 1.0 } else { mean(&ratios) }
    }
}

// ─────────────────────────────────────────────────────────────────────────────

pub(super) fn distance_relations(input: &CheckInput, config: &ValidatorConfig) -> CheckResult {
    let kind = CheckKind::DistanceRelations;
    let ratios: Vec<f32> = input.edge_lengths().iter().map(|(b, a)| a / b).collect();
    if ratios.is_empty() {
        return CheckResult::empty(kind);
    }

    let mean_ratio = mean(&ratios);
    let ratio_variance = variance(&ratios);
    let mean_relative_error = if mean_ratio > f32::EPSILON {
        ratios
            .iter()
            .map(|r| (r - mean_ratio).abs() / mean_ratio)
            .sum::<f32>()
            / ratios.len() as f32
    } else {
        1.0
    };

    CheckResult {
        kind,
        passed: ratio_variance <= config.ratio_variance_tolerance
            && mean_relative_error <= config.distance_tolerance,
        score: (1.0 - mean_relative_error).clamp(0.0, 1.0),
        samples: ratios.len(),
        metrics: CheckMetrics::DistanceRelations {
            mean_ratio,
            ratio_variance,
            mean_relative_error,
        },
    }
}

pub(super) fn angle_preservation(input: &CheckInput, config: &ValidatorConfig) -> CheckResult {
    let kind = CheckKind::AnglePreservation;
    let changes: Vec<f32> = input
        .neighbors
        .keys()
        .flat_map(|&id| input.angle_pairs(id))
        .map(|(b, a)| (a - b).abs())
        .collect();
    if changes.is_empty() {
        return CheckResult::empty(kind);
    }

    let mean_change = mean(&changes);
    let max_change = changes.iter().copied().fold(0.0, f32::max);
    let within = changes.iter().filter(|&&c| c <= config.angle_tolerance).count();
    let within_tolerance = within as f32 / changes.len() as f32;

    CheckResult {
        kind,
        passed: mean_change <= config.angle_tolerance
            && within_tolerance >= config.angle_within_fraction,
        score: (within_tolerance * (1.0 - mean_change / PI)).clamp(0.0, 1.0),
        samples: changes.len(),
        metrics: CheckMetrics::AnglePreservation {
            mean_change,
            max_change,
            within_tolerance,
        },
    }
}

pub(super) fn connectivity(input: &CheckInput, config: &ValidatorConfig) -> CheckResult {
    let kind = CheckKind::Connectivity;
    let lengths = input.edge_lengths();
    if lengths.is_empty() {
        return CheckResult::empty(kind);
    }

    let broken_edges = lengths
        .iter()
        .filter(|&&(before, after)| {
            after > config.broken_ratio * before || after > config.broken_distance
        })
        .count();
    let preserved_fraction = 1.0 - broken_edges as f32 / lengths.len() as f32;

    CheckResult {
        kind,
        passed: preserved_fraction >= config.connectivity_threshold,
        score: preserved_fraction,
        samples: lengths.len(),
        metrics: CheckMetrics::Connectivity {
            broken_edges,
            preserved_fraction,
        },
    }
}

pub(super) fn scale_uniformity(input: &CheckInput, config: &ValidatorConfig) -> CheckResult {
    let kind = CheckKind::ScaleUniformity;
    let mut scale_x = Vec::new();
    let mut scale_y = Vec::new();
    let mut paired = 0usize;
    let mut anisotropic_edges = 0usize;

    for &(a, b) in &input.edges {
        let Some(((b0, b1), (a0, a1))) = input.pair(a, b) else {
            continue;
        };
        let before = b1 - b0;
        let after = a1 - a0;
        let sx = (before.x.abs() > config.min_axis_component)
            .then(|| after.x.abs() / before.x.abs());
        let sy = (before.y.abs() > config.min_axis_component)
            .then(|| after.y.abs() / before.y.abs());
        if let Some(sx) = sx {
            scale_x.push(sx);
        }
        if let Some(sy) = sy {
            scale_y.push(sy);
        }
        if let (Some(sx), Some(sy)) = (sx, sy) {
            paired += 1;
            let hi = sx.max(sy);
            if hi > f32::EPSILON && (sx - sy).abs() / hi > config.anisotropy_threshold {
                anisotropic_edges += 1;
            }
        }
    }

    let samples = scale_x.len() + scale_y.len();
    if samples == 0 {
        return CheckResult::empty(kind);
    }

    let mean_or_one = |v: &[f32]| if v.is_empty() { 1.0 } else { mean(v) };
    let mean_scale_x = mean_or_one(&scale_x);
    let mean_scale_y = mean_or_one(&scale_y);
    let variance_x = variance(&scale_x);
    let variance_y = variance(&scale_y);
    let discrepancy = if scale_x.is_empty() || scale_y.is_empty() {
        0.0
    } else {
        1.0 - relative_closeness(mean_scale_x, mean_scale_y)
    };
    let aniso_fraction = if paired == 0 {
        0.0
    } else {
        anisotropic_edges as f32 / paired as f32
    };

    CheckResult {
        kind,
        passed: variance_x <= config.scale_variance_tolerance
            && variance_y <= config.scale_variance_tolerance
            && discrepancy <= config.scale_discrepancy_tolerance
            && anisotropic_edges == 0,
        score: ((1.0 - aniso_fraction) * (1.0 - discrepancy)).clamp(0.0, 1.0),
        samples,
        metrics: CheckMetrics::ScaleUniformity {
            mean_scale_x,
            mean_scale_y,
            variance_x,
            variance_y,
            discrepancy,
            anisotropic_edges,
        },
    }
}

pub(super) fn local_structure(input: &CheckInput, config: &ValidatorConfig) -> CheckResult {
    let kind = CheckKind::LocalStructure;
    // Lengths are compared after removing the global scale
    let scale = input.mean_ratio();

    let mut node_scores = Vec::new();
    for (&id, nbrs) in &input.neighbors {
        let (Some(&bc), Some(&ac)) = (input.before.get(&id), input.after.get(&id)) else {
            continue;
        };
        let closeness: Vec<f32> = nbrs
            .iter()
            .filter_map(|n| {
                let before = bc.distance(input.before.get(n)?);
                let after = ac.distance(input.after.get(n)?);
                Some((before, after))
            })
            .filter(|(before, _)| *before > MIN_LENGTH)
            .map(|(before, after)| relative_closeness(after, before * scale))
            .collect();
        if closeness.is_empty() {
            continue;
        }
        let angles: Vec<f32> = input
            .angle_pairs(id)
            .iter()
            .map(|(b, a)| 1.0 - (a - b).abs() / PI)
            .collect();
        let angle_score = if angles.is_empty() { 1.0 } else { mean(&angles) };
        node_scores.push((mean(&closeness) + angle_score) / 2.0);
    }
    if node_scores.is_empty() {
        return CheckResult::empty(kind);
    }

    let mean_preservation = mean(&node_scores);
    let good = node_scores
        .iter()
        .filter(|&&s| s >= config.local_structure_threshold)
        .count();
    let preserved_nodes = good as f32 / node_scores.len() as f32;

    CheckResult {
        kind,
        passed: mean_preservation >= config.local_structure_threshold
            && preserved_nodes >= config.local_node_fraction,
        score: mean_preservation.clamp(0.0, 1.0),
        samples: node_scores.len(),
        metrics: CheckMetrics::LocalStructure {
            mean_preservation,
            preserved_nodes,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn path(xs: &[f32]) -> Graph {
        let mut g = Graph::new("path");
        for &x in xs {
            g.add_node(Point2D::new(x, 0.0), 1.0);
        }
        for i in 1..xs.len() as u32 {
            g.add_edge(i - 1, i);
        }
        g
    }

    fn triangle() -> Graph {
        let mut g = Graph::new("tri");
        g.add_node(Point2D::new(0.0, 0.0), 1.0);
        g.add_node(Point2D::new(40.0, 0.0), 1.0);
        g.add_node(Point2D::new(0.0, 30.0), 1.0);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g.add_edge(0, 2);
        g
    }

    fn scaled(
        positions: &BTreeMap<NodeId, Point2D>,
        sx: f32,
        sy: f32,
    ) -> BTreeMap<NodeId, Point2D> {
        positions
            .iter()
            .map(|(id, p)| (*id, Point2D::new(p.x * sx, p.y * sy)))
            .collect()
    }

    #[test]
    fn test_uniform_scale_passes_distance() {
        let g = triangle();
        let before = g.positions();
        let after = scaled(&before, 2.0, 2.0);
        let input = CheckInput::new(&before, &after, &g);
        let r = distance_relations(&input, &ValidatorConfig::default());
        assert!(r.passed);
        assert_relative_eq!(r.score, 1.0, epsilon = 1e-5);
        assert!(matches!(
            r.metrics,
            CheckMetrics::DistanceRelations { mean_ratio, .. } if (mean_ratio - 2.0).abs() < 1e-4
        ));
    }

    #[test]
    fn test_anisotropic_scale_detected() {
        let g = triangle();
        let before = g.positions();
        let after = scaled(&before, 1.0, 1.6);
        let input = CheckInput::new(&before, &after, &g);
        let r = scale_uniformity(&input, &ValidatorConfig::default());
        assert!(!r.passed);
        let CheckMetrics::ScaleUniformity { anisotropic_edges, discrepancy, .. } = r.metrics else {
            panic!("wrong metrics variant");
        };
        // Only the hypotenuse has both components
        assert_eq!(anisotropic_edges, 1);
        assert!(discrepancy > 0.1);
    }

    #[test]
    fn test_angles_under_uniform_scale() {
        let g = triangle();
        let before = g.positions();
        let after = scaled(&before, 3.0, 3.0);
        let input = CheckInput::new(&before, &after, &g);
        let r = angle_preservation(&input, &ValidatorConfig::default());
        assert!(r.passed);
        assert_eq!(r.samples, 3);
        assert_relative_eq!(r.score, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_broken_edge_by_distance() {
        let g = path(&[0.0, 50.0, 100.0]);
        let before = g.positions();
        let mut after = before.clone();
        after.insert(2, Point2D::new(310.0, 0.0));
        let input = CheckInput::new(&before, &after, &g);
        let r = connectivity(&input, &ValidatorConfig::default());
        assert!(!r.passed);
        assert_relative_eq!(r.score, 0.5);
    }

    #[test]
    fn test_no_edges_is_empty_pass() {
        let mut g = Graph::new("lonely");
        g.add_node(Point2D::new(0.0, 0.0), 1.0);
        let before = g.positions();
        let input = CheckInput::new(&before, &before, &g);
        let config = ValidatorConfig::default();
        for r in [
            distance_relations(&input, &config),
            angle_preservation(&input, &config),
            connectivity(&input, &config),
            scale_uniformity(&input, &config),
            local_structure(&input, &config),
        ] {
            assert!(r.passed);
            assert_eq!(r.samples, 0);
            assert_eq!(r.metrics, CheckMetrics::Empty);
        }
    }

    #[test]
    fn test_missing_nodes_ignored() {
        let g = path(&[0.0, 50.0, 100.0]);
        let before = g.positions();
        let mut after = before.clone();
        after.remove(&2);
        let input = CheckInput::new(&before, &after, &g);
        assert_eq!(input.edge_count(), 1);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f32 = CheckKind::ALL.iter().map(|k| k.weight()).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
    }
}
