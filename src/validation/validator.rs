//! Aggregation of the geometric checks into a [`ValidationReport`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::checks::{self, CheckInput, CheckKind, CheckResult};
use crate::core::Point2D;
use crate::graph::{Graph, NodeId};
use crate::merge::Transformation;

/// Configuration for [`TopologyValidator`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Max mean relative deviation of edge ratios from their mean.
    /// Default: 0.15
    pub distance_tolerance: f32,

    /// Max variance of edge after/before ratios.
    /// Default: 0.01
    pub ratio_variance_tolerance: f32,

    /// Max mean neighbour-angle change (radians).
    /// Default: 0.2
    pub angle_tolerance: f32,

    /// Min fraction of angles within `angle_tolerance`.
    /// Default: 0.7
    pub angle_within_fraction: f32,

    /// Min fraction of preserved edges.
    /// Default: 0.8
    pub connectivity_threshold: f32,

    /// An edge longer than this multiple of its original length is broken.
    /// Default: 3.0
    pub broken_ratio: f32,

    /// An edge longer than this (pixels) is broken.
    /// Default: 200.0
    pub broken_distance: f32,

    /// Max variance of per-axis scale ratios.
    /// Default: 0.05
    pub scale_variance_tolerance: f32,

    /// Max relative X/Y mean scale discrepancy.
    /// Default: 0.1
    pub scale_discrepancy_tolerance: f32,

    /// Relative X/Y divergence that makes an edge anisotropic.
    /// Default: 0.3
    pub anisotropy_threshold: f32,

    /// Axis components at or below this (pixels) give no scale ratio.
    /// Default: 5.0
    pub min_axis_component: f32,

    /// Per-node and mean local preservation threshold.
    /// Default: 0.7
    pub local_structure_threshold: f32,

    /// Min fraction of nodes at or above `local_structure_threshold`.
    /// Default: 0.7
    pub local_node_fraction: f32,

    /// Overall score must exceed this to pass.
    /// Default: 0.7
    pub pass_score: f32,

    /// Checks at or above this weight must pass individually.
    /// Default: 0.2
    pub critical_weight: f32,

    /// Edge count at which confidence is no longer discounted.
    /// Default: 10
    pub full_confidence_edges: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            distance_tolerance: 0.15,
            ratio_variance_tolerance: 0.01,
            angle_tolerance: 0.2,
            angle_within_fraction: 0.7,
            connectivity_threshold: 0.8,
            broken_ratio: 3.0,
            broken_distance: 200.0,
            scale_variance_tolerance: 0.05,
            scale_discrepancy_tolerance: 0.1,
            anisotropy_threshold: 0.3,
            min_axis_component: 5.0,
            local_structure_threshold: 0.7,
            local_node_fraction: 0.7,
            pass_score: 0.7,
            critical_weight: 0.2,
            full_confidence_edges: 10,
        }
    }
}

impl ValidatorConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set distance and ratio-variance tolerances
    pub fn with_distance_tolerance(mut self, tolerance: f32, ratio_variance: f32) -> Self {
        self.distance_tolerance = tolerance;
        self.ratio_variance_tolerance = ratio_variance;
        self
    }

    /// Builder: set angle tolerance (radians)
    pub fn with_angle_tolerance(mut self, tolerance: f32) -> Self {
        self.angle_tolerance = tolerance;
        self
    }
}

/// Aggregated validation outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationReport {
    /// One result per check, in [`CheckKind::ALL`] order
    pub checks: Vec<CheckResult>,
    /// Weighted mean of check scores
    pub overall_score: f32,
    /// Overall score above `pass_score` and no gating check failed
    pub passed: bool,
    /// Overall score discounted for small samples
    pub confidence: f32,
    /// One-line human-readable verdict
    pub summary: String,
    /// Advice for each failed check
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    /// Result of one check
    pub fn check(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.kind == kind)
    }

    /// Scores by check name
    pub fn scores(&self) -> BTreeMap<String, f32> {
        self.checks
            .iter()
            .map(|c| (c.kind.name().to_string(), c.score))
            .collect()
    }

    /// Number of checks that passed
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }
}

/// Checks that a layout change preserved the geometry of a graph.
#[derive(Clone, Debug, Default)]
pub struct TopologyValidator {
    config: ValidatorConfig,
}

impl TopologyValidator {
    /// Create a validator
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Current config
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Compare `before` and `after` positions over `graph`'s topology.
    ///
    /// With a `transform`, `before` is mapped through it first. Nodes absent
    /// from either map are ignored.
    pub fn validate_transformation(
        &self,
        before: &BTreeMap<NodeId, Point2D>,
        after: &BTreeMap<NodeId, Point2D>,
        graph: &Graph,
        transform: Option<&Transformation>,
    ) -> ValidationReport {
        let mapped: BTreeMap<NodeId, Point2D>;
        let before = match transform {
            Some(t) => {
                mapped = before.iter().map(|(id, p)| (*id, t.apply(*p))).collect();
                &mapped
            }
            None => before,
        };

        let input = CheckInput::new(before, after, graph);
        let cfg = &self.config;
        let checks: Vec<CheckResult> = CheckKind::ALL
            .iter()
            .map(|kind| match kind {
                CheckKind::DistanceRelations => checks::distance_relations(&input, cfg),
                CheckKind::AnglePreservation => checks::angle_preservation(&input, cfg),
                CheckKind::Connectivity => checks::connectivity(&input, cfg),
                CheckKind::ScaleUniformity => checks::scale_uniformity(&input, cfg),
                CheckKind::LocalStructure => checks::local_structure(&input, cfg),
            })
            .collect();

        let total_weight: f32 = checks.iter().map(|c| c.kind.weight()).sum();
        let overall_score = checks.iter().map(|c| c.kind.weight() * c.score).sum::<f32>()
            / total_weight;
        let critical_passed = checks
            .iter()
            .filter(|c| c.kind.weight() >= cfg.critical_weight)
            .all(|c| c.passed);
        let passed = critical_passed && overall_score > cfg.pass_score;

        let coverage = if cfg.full_confidence_edges == 0 {
            1.0
        } else {
            (input.edge_count() as f32 / cfg.full_confidence_edges as f32).min(1.0)
        };
        let confidence = overall_score * coverage;

        let passed_count = checks.iter().filter(|c| c.passed).count();
        let summary = format!(
            "{}/{} checks passed, overall {:.2} ({})",
            passed_count,
            checks.len(),
            overall_score,
            if passed { "valid" } else { "invalid" }
        );
        let recommendations = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| recommendation(c.kind).to_string())
            .collect();

        log::debug!(
            "[TopologyValidator] {} over {} edges, confidence {:.2}",
            summary,
            input.edge_count(),
            confidence
        );

        ValidationReport {
            checks,
            overall_score,
            passed,
            confidence,
            summary,
            recommendations,
        }
    }
}

fn recommendation(kind: CheckKind) -> &'static str {
    match kind {
        CheckKind::DistanceRelations => {
            "Edge lengths changed non-uniformly; \
             reduce refinement strength or re-check correspondences"
        }
        CheckKind::AnglePreservation => {
            "Neighbour angles drifted; enable angle constraints or raise their strength"
        }
        CheckKind::Connectivity => {
            "Some edges were stretched apart; inspect wrong correspondences near the broken edges"
        }
        CheckKind::ScaleUniformity => {
            "Scale differs between axes; \
             the inputs may be distorted or captured at different angles"
        }
        CheckKind::LocalStructure => {
            "Local neighbourhoods were deformed; consider the point-based fallback for this pair"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TreadPoint;
    use crate::graph::GraphBuilder;
    use approx::assert_relative_eq;

    fn grid(n: usize, spacing: f32) -> Graph {
        let points: Vec<TreadPoint> = (0..n * n)
            .map(|i| {
                let (r, c) = (i / n, i % n);
                // Slight shear keeps neighbour distances distinct
                TreadPoint::new(c as f32 * spacing + r as f32 * 3.0, r as f32 * spacing, 0.9)
            })
            .collect();
        GraphBuilder::default().build(&points)
    }

    #[test]
    fn test_identity_is_valid() {
        let g = grid(4, 40.0);
        let pos = g.positions();
        let report = TopologyValidator::default().validate_transformation(&pos, &pos, &g, None);
        assert!(report.passed);
        assert!(report.overall_score >= 0.99);
        assert_relative_eq!(report.confidence, report.overall_score, epsilon = 1e-6);
        assert!(report.recommendations.is_empty());
        assert_eq!(report.passed_count(), 5);
    }

    #[test]
    fn test_transform_maps_before() {
        let g = grid(3, 40.0);
        let before = g.positions();
        let t = Transformation::rigid(90.0, 1.0, Point2D::ZERO, Point2D::new(300.0, 100.0), 0.9);
        let after: BTreeMap<NodeId, Point2D> =
            before.iter().map(|(id, p)| (*id, t.apply(*p))).collect();

        let validator = TopologyValidator::default();
        let mapped = validator.validate_transformation(&before, &after, &g, Some(&t));
        assert!(mapped.passed);
        assert!(mapped.overall_score >= 0.99);

        // Without the transform, rotation swaps axes
        let raw = validator.validate_transformation(&before, &after, &g, None);
        assert!(raw.check(CheckKind::ScaleUniformity).is_some_and(|c| !c.passed));
    }

    #[test]
    fn test_stretched_node_fails_connectivity() {
        let mut g = Graph::new("path");
        for x in [0.0, 50.0, 100.0, 150.0] {
            g.add_node(Point2D::new(x, 0.0), 1.0);
        }
        for i in 1..4 {
            g.add_edge(i - 1, i);
        }
        let before = g.positions();
        let mut after = before.clone();
        after.insert(3, Point2D::new(350.0, 0.0));

        let report =
            TopologyValidator::default().validate_transformation(&before, &after, &g, None);
        let conn = report.check(CheckKind::Connectivity).unwrap();
        assert!(!conn.passed);
        assert!(!report.passed);
        assert!(report.recommendations.iter().any(|r| r.contains("stretched")));
        // 3 edges: discounted confidence
        assert!(report.confidence < report.overall_score);
    }

    #[test]
    fn test_scores_keyed_by_name() {
        let g = grid(3, 40.0);
        let pos = g.positions();
        let report = TopologyValidator::default().validate_transformation(&pos, &pos, &g, None);
        let scores = report.scores();
        assert_eq!(scores.len(), 5);
        assert!(scores.contains_key("connectivity"));
    }
}
