//! Structural graph merge with graceful fallback.
//!
//! ```text
//! signatures(A), signatures(B)
//!        │
//!        ▼
//! greedy correspondences ──(< min_matches)──────────────┐
//!        │                                              │
//!        ▼                                              │
//! structural similarity ──(< threshold)─────────────────┤
//!        │                                              ▼
//!        ▼                                     PointMerger (15px)
//! transform (given or estimated) ──(fault)─────────────►│
//!        │                                              │
//!        ▼                                              ▼
//! MergeOutcome::Structural                MergeOutcome::Fallback
//! ```

use serde::{Deserialize, Serialize};

use super::correspondence::{Correspondence, find_correspondences};
use super::fusion::{FusedGraph, NodeFuser};
use super::point_merger::{PointMergeResult, PointMerger, PointMergerConfig};
use super::transform::{TransformEstimator, Transformation};
use crate::core::TreadPoint;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::signature::{SignatureBuilder, SignatureConfig};

/// Configuration for [`TopologyMerger`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MergerConfig {
    /// Signature similarity a correspondence must exceed.
    /// Default: 0.6
    pub correspondence_threshold: f32,

    /// Correspondences required for a structural merge.
    /// Default: 5
    pub min_matches_for_merge: usize,

    /// Structural similarity required for a structural merge.
    /// Default: 0.7
    pub structural_similarity_threshold: f32,

    /// Multiplier on fused confidence (clamped to [0, 1]).
    /// Default: 1.3
    pub confidence_boost: f32,

    /// Nearest neighbours each fused node is connected to.
    /// Default: 3
    pub fused_neighbors: usize,

    /// Best correspondences used for rotation/scale estimation.
    /// Default: 5
    pub transform_top_k: usize,

    /// Point-merger radius used when falling back.
    /// Default: 15.0
    pub fallback_merge_distance: f32,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            correspondence_threshold: 0.6,
            min_matches_for_merge: 5,
            structural_similarity_threshold: 0.7,
            confidence_boost: 1.3,
            fused_neighbors: 3,
            transform_top_k: 5,
            fallback_merge_distance: 15.0,
        }
    }
}

impl MergerConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set structural similarity threshold
    pub fn with_structural_similarity_threshold(mut self, threshold: f32) -> Self {
        self.structural_similarity_threshold = threshold;
        self
    }

    /// Builder: set minimum correspondences
    pub fn with_min_matches(mut self, n: usize) -> Self {
        self.min_matches_for_merge = n;
        self
    }
}

/// Components of the structural similarity score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuralSimilarity {
    /// Mean correspondence score
    pub mean_score: f32,
    /// matches / min(|A|, |B|)
    pub coverage: f32,
    /// Fraction of matched-pair adjacencies present in both graphs
    pub topology_preservation: f32,
    /// 0.5 * mean + 0.3 * coverage + 0.2 * preservation
    pub score: f32,
}

/// Why a merge fell back to point merging.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    /// Too few correspondences
    InsufficientCorrespondences {
        /// Correspondences found
        found: usize,
        /// Correspondences required
        needed: usize,
    },
    /// Structural similarity under threshold
    LowStructuralSimilarity {
        /// Computed similarity
        similarity: f32,
        /// Required similarity
        threshold: f32,
    },
    /// Numeric fault during transform estimation or fusion
    InternalFault {
        /// Fault description
        message: String,
    },
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::InsufficientCorrespondences { found, needed } => {
                write!(f, "insufficient correspondences ({} < {})", found, needed)
            }
            FallbackReason::LowStructuralSimilarity {
                similarity,
                threshold,
            } => write!(
                f,
                "structural similarity {:.3} below {:.3}",
                similarity, threshold
            ),
            FallbackReason::InternalFault { message } => write!(f, "internal fault: {}", message),
        }
    }
}

/// Successful structural merge.
#[derive(Clone, Debug)]
pub struct StructuralMerge {
    /// Fused graph
    pub fused: FusedGraph,
    /// Accepted correspondences
    pub correspondences: Vec<Correspondence>,
    /// A→B transform used for fusion
    pub transform: Transformation,
    /// Similarity breakdown
    pub similarity: StructuralSimilarity,
}

/// Distance-based fallback merge.
#[derive(Clone, Debug)]
pub struct FallbackMerge {
    /// Why the structural path was abandoned
    pub reason: FallbackReason,
    /// Correspondences found before falling back
    pub correspondences: Vec<Correspondence>,
    /// Similarity, when computed before falling back
    pub similarity: Option<StructuralSimilarity>,
    /// Point-merger output
    pub points: PointMergeResult,
    /// Fused graph built from the merged points
    pub fused: FusedGraph,
}

/// Result of [`TopologyMerger::merge_graphs`].
#[derive(Clone, Debug)]
pub enum MergeOutcome {
    /// Structural merge succeeded
    Structural(StructuralMerge),
    /// Fell back to point merging
    Fallback(FallbackMerge),
}

impl MergeOutcome {
    /// Fused graph of either variant
    pub fn fused(&self) -> &FusedGraph {
        match self {
            MergeOutcome::Structural(s) => &s.fused,
            MergeOutcome::Fallback(f) => &f.fused,
        }
    }

    /// Correspondences of either variant
    pub fn correspondences(&self) -> &[Correspondence] {
        match self {
            MergeOutcome::Structural(s) => &s.correspondences,
            MergeOutcome::Fallback(f) => &f.correspondences,
        }
    }

    /// Structural similarity score; 0 when it was never computed
    pub fn structural_similarity(&self) -> f32 {
        match self {
            MergeOutcome::Structural(s) => s.similarity.score,
            MergeOutcome::Fallback(f) => f.similarity.map(|s| s.score).unwrap_or(0.0),
        }
    }

    /// Transform used, if structural
    pub fn transform(&self) -> Option<&Transformation> {
        match self {
            MergeOutcome::Structural(s) => Some(&s.transform),
            MergeOutcome::Fallback(_) => None,
        }
    }

    /// True for the fallback variant
    pub fn is_fallback(&self) -> bool {
        matches!(self, MergeOutcome::Fallback(_))
    }

    /// "structural" or "fallback"
    pub fn method(&self) -> &'static str {
        match self {
            MergeOutcome::Structural(_) => "structural",
            MergeOutcome::Fallback(_) => "fallback",
        }
    }
}

/// Merges two graphs through local-topology correspondence.
#[derive(Clone, Debug, Default)]
pub struct TopologyMerger {
    config: MergerConfig,
    signatures: SignatureBuilder,
    point_config: PointMergerConfig,
}

impl TopologyMerger {
    /// Create a merger. `point_config` supplies similarity cut-off and
    /// boost for the fallback; its radius is replaced by
    /// `fallback_merge_distance`.
    pub fn new(
        config: MergerConfig,
        signature: SignatureConfig,
        point_config: PointMergerConfig,
    ) -> Self {
        Self {
            config,
            signatures: SignatureBuilder::new(signature),
            point_config,
        }
    }

    /// Current config
    pub fn config(&self) -> &MergerConfig {
        &self.config
    }

    /// Merge `b` into `a`'s frame.
    ///
    /// Every structural failure degrades to [`MergeOutcome::Fallback`]; the
    /// call fails only when the graphs hold fewer than 2 nodes in total.
    pub fn merge_graphs(
        &self,
        a: &Graph,
        b: &Graph,
        transform: Option<&Transformation>,
    ) -> Result<MergeOutcome> {
        let total = a.node_count() + b.node_count();
        if total < 2 {
            return Err(Error::InsufficientInput {
                stage: "merge",
                needed: 2,
                found: total,
            });
        }

        let sig_a = self.signatures.build_signatures(a);
        let sig_b = self.signatures.build_signatures(b);
        let correspondences = find_correspondences(
            &sig_a,
            &sig_b,
            self.config.correspondence_threshold,
            self.signatures.config().correspondence_sharpness,
        );

        if correspondences.len() < self.config.min_matches_for_merge {
            let reason = FallbackReason::InsufficientCorrespondences {
                found: correspondences.len(),
                needed: self.config.min_matches_for_merge,
            };
            return Ok(self.fallback(a, b, reason, correspondences, None));
        }

        let similarity = structural_similarity(a, b, &correspondences);
        if similarity.score < self.config.structural_similarity_threshold {
            let reason = FallbackReason::LowStructuralSimilarity {
                similarity: similarity.score,
                threshold: self.config.structural_similarity_threshold,
            };
            return Ok(self.fallback(a, b, reason, correspondences, Some(similarity)));
        }

        let transform = match transform {
            Some(t) if t.is_finite() => Ok(*t),
            Some(_) => Err(Error::non_finite("provided transform")),
            None => TransformEstimator::new(self.config.transform_top_k).estimate(
                &correspondences,
                a,
                b,
            ),
        };
        let fuser = NodeFuser::new(self.config.confidence_boost, self.config.fused_neighbors);
        let fused = transform.and_then(|t| Ok((t, fuser.fuse(a, b, &correspondences, &t)?)));

        match fused {
            Ok((transform, fused)) => {
                log::info!(
                    "[TopologyMerger] Structural merge: {} correspondences, \
                     similarity {:.3}, {} nodes",
                    correspondences.len(),
                    similarity.score,
                    fused.graph.node_count()
                );
                Ok(MergeOutcome::Structural(StructuralMerge {
                    fused,
                    correspondences,
                    transform,
                    similarity,
                }))
            }
            Err(e) => {
                let reason = FallbackReason::InternalFault {
                    message: e.to_string(),
                };
                Ok(self.fallback(a, b, reason, correspondences, Some(similarity)))
            }
        }
    }

    fn fallback(
        &self,
        a: &Graph,
        b: &Graph,
        reason: FallbackReason,
        correspondences: Vec<Correspondence>,
        similarity: Option<StructuralSimilarity>,
    ) -> MergeOutcome {
        log::warn!("[TopologyMerger] Falling back to point merge: {}", reason);

        let points_of = |g: &Graph| -> Vec<TreadPoint> {
            g.nodes()
                .map(|n| TreadPoint::new(n.position.x, n.position.y, n.confidence))
                .collect()
        };
        let merger = PointMerger::new(
            self.point_config
                .clone()
                .with_merge_distance(self.config.fallback_merge_distance),
        );
        let points = merger.merge(&points_of(a), &points_of(b));
        let fused = NodeFuser::new(self.config.confidence_boost, self.config.fused_neighbors)
            .from_point_merge(a, b, &points);

        MergeOutcome::Fallback(FallbackMerge {
            reason,
            correspondences,
            similarity,
            points,
            fused,
        })
    }
}

/// Structural similarity of a correspondence set.
pub fn structural_similarity(
    a: &Graph,
    b: &Graph,
    correspondences: &[Correspondence],
) -> StructuralSimilarity {
    if correspondences.is_empty() {
        return StructuralSimilarity {
            mean_score: 0.0,
            coverage: 0.0,
            topology_preservation: 0.0,
            score: 0.0,
        };
    }

    let n = correspondences.len() as f32;
    let mean_score = correspondences.iter().map(|c| c.score).sum::<f32>() / n;
    let smaller = a.node_count().min(b.node_count()).max(1) as f32;
    let coverage = (n / smaller).min(1.0);

    let mut related = 0usize;
    let mut consistent = 0usize;
    for (i, x) in correspondences.iter().enumerate() {
        for y in &correspondences[i + 1..] {
            let in_a = a.are_connected(x.node_a, y.node_a);
            let in_b = b.are_connected(x.node_b, y.node_b);
            if in_a || in_b {
                related += 1;
                if in_a && in_b {
                    consistent += 1;
                }
            }
        }
    }
    let topology_preservation = if related == 0 {
        0.0
    } else {
        consistent as f32 / related as f32
    };

    StructuralSimilarity {
        mean_score,
        coverage,
        topology_preservation,
        score: 0.5 * mean_score + 0.3 * coverage + 0.2 * topology_preservation,
    }
}
