//! Coarse structural matcher: a cheap-to-expensive cascade over graph
//! invariants.
//!
//! ```text
//!  Stage 1 (quick reject)      node / edge count ratios
//!        │ pass
//!        ▼
//!  Stage 2 (basic invariants)  weighted sum of 7 scalar comparisons
//!        │ score > detailed_threshold
//!        ▼
//!  Stage 3 (detailed)          histograms, length and radial statistics,
//!                              local star-vector structure (confidence)
//!
//!  final = 0.4 * stage2 + 0.6 * stage3   (stage2 alone when stage 3 is skipped)
//! ```

use serde::{Deserialize, Serialize};

use super::prefilter::CandidateFilter;
use crate::core::math::{mean, min_max_ratio, relative_closeness, std_dev, tolerance_score};
use crate::graph::{Graph, Invariants};
use crate::signature::{SignatureBuilder, SignatureConfig};

// Stage 2 weights (sum to 1)
const W_NODE_COUNT: f32 = 0.20;
const W_EDGE_COUNT: f32 = 0.15;
const W_AVG_DEGREE: f32 = 0.15;
const W_CLUSTERING: f32 = 0.15;
const W_DIAMETER: f32 = 0.10;
const W_DENSITY: f32 = 0.10;
const W_DEGREE_HISTOGRAM: f32 = 0.15;

// Stage 3 weights (sum to 1)
const W_EDGE_LENGTH_HISTOGRAM: f32 = 0.3;
const W_EDGE_LENGTH_STATS: f32 = 0.4;
const W_NODE_DISTRIBUTION: f32 = 0.3;

/// Configuration for [`CoarseMatcher`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CoarseMatcherConfig {
    /// Node count ratio below which graphs are rejected outright.
    /// Default: 0.7
    pub min_node_ratio: f32,

    /// Edge count ratio below which graphs are rejected outright.
    /// Default: 0.6
    pub min_edge_ratio: f32,

    /// Relative average-degree difference that scores zero.
    /// Default: 0.5
    pub degree_tolerance: f32,

    /// Absolute clustering-coefficient difference that scores zero.
    /// Default: 0.2
    pub clustering_tolerance: f32,

    /// Absolute density difference that scores zero.
    /// Default: 0.1
    pub density_tolerance: f32,

    /// Stage 2 score a pair must exceed to run stage 3.
    /// Default: 0.5
    pub detailed_threshold: f32,

    /// Score at or above which graphs are judged the same.
    /// Default: 0.7
    pub same_threshold: f32,

    /// Score at or above which graphs are judged similar.
    /// Default: 0.4
    pub similar_threshold: f32,
}

impl Default for CoarseMatcherConfig {
    fn default() -> Self {
        Self {
            min_node_ratio: 0.7,
            min_edge_ratio: 0.6,
            degree_tolerance: 0.5,
            clustering_tolerance: 0.2,
            density_tolerance: 0.1,
            detailed_threshold: 0.5,
            same_threshold: 0.7,
            similar_threshold: 0.4,
        }
    }
}

impl CoarseMatcherConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set decision thresholds
    pub fn with_thresholds(mut self, same: f32, similar: f32) -> Self {
        self.same_threshold = same;
        self.similar_threshold = similar;
        self
    }

    /// Builder: set minimum node ratio
    pub fn with_min_node_ratio(mut self, ratio: f32) -> Self {
        self.min_node_ratio = ratio;
        self
    }
}

/// Coarse decision for a pair of graphs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDecision {
    /// Likely the same outsole
    Same,
    /// Structurally related, inconclusive
    Similar,
    /// Different outsoles
    Different,
}

impl MatchDecision {
    /// Lowercase name for logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            MatchDecision::Same => "same",
            MatchDecision::Similar => "similar",
            MatchDecision::Different => "different",
        }
    }
}

/// Stage 1 ratios.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuickScores {
    /// min/max node count
    pub node_ratio: f32,
    /// min/max edge count
    pub edge_ratio: f32,
    /// min/max geometric diameter
    pub diameter_ratio: f32,
    /// Mean of the three ratios
    pub score: f32,
}

/// Stage 2 component scores, each in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasicScores {
    /// Node count ratio
    pub node_count: f32,
    /// Edge count ratio
    pub edge_count: f32,
    /// Average degree closeness
    pub avg_degree: f32,
    /// Clustering coefficient closeness
    pub clustering: f32,
    /// Diameter ratio
    pub diameter: f32,
    /// Density closeness
    pub density: f32,
    /// Degree histogram intersection
    pub degree_histogram: f32,
    /// Weighted total
    pub score: f32,
}

impl BasicScores {
    fn named(&self) -> [(&'static str, f32); 7] {
        [
            ("node count", self.node_count),
            ("edge count", self.edge_count),
            ("average degree", self.avg_degree),
            ("clustering coefficient", self.clustering),
            ("diameter", self.diameter),
            ("density", self.density),
            ("degree distribution", self.degree_histogram),
        ]
    }
}

/// Stage 3 component scores, each in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetailedScores {
    /// Edge-length histogram intersection
    pub edge_length_histogram: f32,
    /// Normalized edge-length mean/stddev closeness
    pub edge_length_stats: f32,
    /// Node radial distribution mean/stddev closeness
    pub node_distribution: f32,
    /// Weighted total
    pub score: f32,
    /// Star-vector local structure similarity (feeds confidence only)
    pub local_structure: f32,
}

impl DetailedScores {
    fn named(&self) -> [(&'static str, f32); 3] {
        [
            ("edge length distribution", self.edge_length_histogram),
            ("edge length statistics", self.edge_length_stats),
            ("node distribution", self.node_distribution),
        ]
    }
}

/// Per-stage scores; later stages are `None` when skipped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageScores {
    /// Stage 1
    pub quick: QuickScores,
    /// Stage 2 (absent after a quick reject)
    pub basic: Option<BasicScores>,
    /// Stage 3 (absent unless stage 2 exceeded the detailed threshold)
    pub detailed: Option<DetailedScores>,
}

/// Result of [`CoarseMatcher::compare`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Overall similarity in [0, 1]
    pub similarity: f32,
    /// Decision from the similarity thresholds
    pub decision: MatchDecision,
    /// Human-readable justification
    pub reason: String,
    /// Confidence in the decision, in [0, 1]
    pub confidence: f32,
    /// Per-stage breakdown
    pub stages: StageScores,
}

/// One ranked candidate from [`CoarseMatcher::find_most_similar`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    /// Index into the candidate slice
    pub index: usize,
    /// Candidate graph id
    pub graph_id: String,
    /// Comparison outcome
    pub outcome: MatchOutcome,
}

/// Result of a ranking query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRanking {
    /// Best candidates, descending similarity
    pub matches: Vec<RankedMatch>,
    /// Candidates actually compared
    pub compared: usize,
    /// Candidates judged the same
    pub same_count: usize,
    /// Candidates judged similar
    pub similar_count: usize,
    /// Candidates judged different
    pub different_count: usize,
}

/// Cascading invariant-based graph comparator.
#[derive(Clone, Debug, Default)]
pub struct CoarseMatcher {
    config: CoarseMatcherConfig,
    signatures: SignatureBuilder,
}

impl CoarseMatcher {
    /// Create a matcher
    pub fn new(config: CoarseMatcherConfig, signature: SignatureConfig) -> Self {
        Self {
            config,
            signatures: SignatureBuilder::new(signature),
        }
    }

    /// Current config
    pub fn config(&self) -> &CoarseMatcherConfig {
        &self.config
    }

    /// Compare two graphs.
    pub fn compare(&self, a: &Graph, b: &Graph) -> MatchOutcome {
        let inv_a = a.invariants();
        let inv_b = b.invariants();

        let quick = quick_scores(&inv_a, &inv_b);
        if quick.node_ratio < self.config.min_node_ratio {
            return self.quick_reject(
                quick,
                format!(
                    "node count ratio {:.2} below {:.2}",
                    quick.node_ratio, self.config.min_node_ratio
                ),
            );
        }
        if quick.edge_ratio < self.config.min_edge_ratio {
            return self.quick_reject(
                quick,
                format!(
                    "edge count ratio {:.2} below {:.2}",
                    quick.edge_ratio, self.config.min_edge_ratio
                ),
            );
        }

        let basic = self.basic_scores(&inv_a, &inv_b, &quick);
        let detailed = if basic.score > self.config.detailed_threshold {
            Some(self.detailed_scores(a, b, &inv_a, &inv_b))
        } else {
            None
        };

        let similarity = match &detailed {
            Some(d) => 0.4 * basic.score + 0.6 * d.score,
            None => basic.score,
        }
        .clamp(0.0, 1.0);
        let decision = self.decide(similarity);

        let confidence = match &detailed {
            Some(d) => ((1.0 - (basic.score - d.score).abs()) + d.local_structure) / 2.0,
            None => self.margin_confidence(similarity),
        }
        .clamp(0.0, 1.0);

        let reason = match decision {
            MatchDecision::Different => {
                let (name, score) = weakest(&basic, detailed.as_ref());
                format!("weakest comparison: {} ({:.2})", name, score)
            }
            MatchDecision::Same => format!(
                "similarity {:.2} at or above same threshold {:.2}",
                similarity, self.config.same_threshold
            ),
            MatchDecision::Similar => format!(
                "similarity {:.2} at or above similar threshold {:.2}",
                similarity, self.config.similar_threshold
            ),
        };

        log::debug!(
            "[CoarseMatcher] {} vs {}: {:.3} ({}), stage2 {:.3}, stage3 {}",
            a.id(),
            b.id(),
            similarity,
            decision.name(),
            basic.score,
            detailed
                .as_ref()
                .map(|d| format!("{:.3}", d.score))
                .unwrap_or_else(|| "skipped".to_string())
        );

        MatchOutcome {
            similarity,
            decision,
            reason,
            confidence,
            stages: StageScores {
                quick,
                basic: Some(basic),
                detailed,
            },
        }
    }

    /// Rank candidates by similarity to `target`.
    ///
    /// Candidates sharing the target's id are skipped. Returns the best
    /// `top_n` plus decision counts over every compared candidate.
    pub fn find_most_similar(
        &self,
        target: &Graph,
        candidates: &[Graph],
        top_n: usize,
    ) -> CandidateRanking {
        self.rank(target, candidates, top_n, |_| true)
    }

    /// Like [`CoarseMatcher::find_most_similar`], but only candidates the
    /// external filter admits are compared.
    pub fn find_most_similar_filtered(
        &self,
        target: &Graph,
        candidates: &[Graph],
        top_n: usize,
        filter: &dyn CandidateFilter,
    ) -> CandidateRanking {
        let ranking = self.rank(target, candidates, top_n, |c| filter.admit(target, c));
        log::debug!(
            "[CoarseMatcher] Filter '{}' admitted {} of {} candidates",
            filter.name(),
            ranking.compared,
            candidates.len()
        );
        ranking
    }

    fn rank(
        &self,
        target: &Graph,
        candidates: &[Graph],
        top_n: usize,
        admit: impl Fn(&Graph) -> bool,
    ) -> CandidateRanking {
        let mut ranking = CandidateRanking::default();
        let mut all: Vec<RankedMatch> = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.id() == target.id() || !admit(candidate) {
                continue;
            }
            let outcome = self.compare(target, candidate);
            match outcome.decision {
                MatchDecision::Same => ranking.same_count += 1,
                MatchDecision::Similar => ranking.similar_count += 1,
                MatchDecision::Different => ranking.different_count += 1,
            }
            all.push(RankedMatch {
                index,
                graph_id: candidate.id().to_string(),
                outcome,
            });
        }

        ranking.compared = all.len();
        // Stable sort keeps input order among equal scores
        all.sort_by(|x, y| y.outcome.similarity.total_cmp(&x.outcome.similarity));
        all.truncate(top_n);
        ranking.matches = all;
        ranking
    }

    fn quick_reject(&self, quick: QuickScores, reason: String) -> MatchOutcome {
        log::debug!("[CoarseMatcher] Quick reject: {}", reason);
        MatchOutcome {
            similarity: quick.score,
            decision: MatchDecision::Different,
            reason,
            confidence: self.margin_confidence(quick.score),
            stages: StageScores {
                quick,
                basic: None,
                detailed: None,
            },
        }
    }

    fn decide(&self, similarity: f32) -> MatchDecision {
        if similarity >= self.config.same_threshold {
            MatchDecision::Same
        } else if similarity >= self.config.similar_threshold {
            MatchDecision::Similar
        } else {
            MatchDecision::Different
        }
    }

    /// 0.5 at a decision boundary, rising with distance from the nearest one.
    fn margin_confidence(&self, score: f32) -> f32 {
        let margin = (score - self.config.same_threshold)
            .abs()
            .min((score - self.config.similar_threshold).abs());
        (0.5 + margin).clamp(0.0, 1.0)
    }

    fn basic_scores(&self, a: &Invariants, b: &Invariants, quick: &QuickScores) -> BasicScores {
        let degree_rel = if a.avg_degree.max(b.avg_degree) > f32::EPSILON {
            (a.avg_degree - b.avg_degree).abs() / a.avg_degree.max(b.avg_degree)
        } else {
            0.0
        };
        let avg_degree = tolerance_score(degree_rel, 0.0, self.config.degree_tolerance);
        let clustering = tolerance_score(
            a.clustering_coefficient,
            b.clustering_coefficient,
            self.config.clustering_tolerance,
        );
        let density = tolerance_score(a.density, b.density, self.config.density_tolerance);
        let degree_histogram = degree_histogram_similarity(a, b);

        let score = W_NODE_COUNT * quick.node_ratio
            + W_EDGE_COUNT * quick.edge_ratio
            + W_AVG_DEGREE * avg_degree
            + W_CLUSTERING * clustering
            + W_DIAMETER * quick.diameter_ratio
            + W_DENSITY * density
            + W_DEGREE_HISTOGRAM * degree_histogram;

        BasicScores {
            node_count: quick.node_ratio,
            edge_count: quick.edge_ratio,
            avg_degree,
            clustering,
            diameter: quick.diameter_ratio,
            density,
            degree_histogram,
            score,
        }
    }

    fn detailed_scores(
        &self,
        ga: &Graph,
        gb: &Graph,
        a: &Invariants,
        b: &Invariants,
    ) -> DetailedScores {
        let edge_length_histogram =
            histogram_intersection(&a.edge_length_histogram, &b.edge_length_histogram);
        let edge_length_stats =
            stats_closeness(&a.normalized_edge_lengths, &b.normalized_edge_lengths);
        let node_distribution = stats_closeness(&a.node_distribution, &b.node_distribution);

        let score = W_EDGE_LENGTH_HISTOGRAM * edge_length_histogram
            + W_EDGE_LENGTH_STATS * edge_length_stats
            + W_NODE_DISTRIBUTION * node_distribution;

        let sig_a = self.signatures.build_signatures(ga);
        let sig_b = self.signatures.build_signatures(gb);
        let local_structure = self.signatures.local_structure_similarity(&sig_a, &sig_b);

        DetailedScores {
            edge_length_histogram,
            edge_length_stats,
            node_distribution,
            score,
            local_structure,
        }
    }
}

fn quick_scores(a: &Invariants, b: &Invariants) -> QuickScores {
    let node_ratio = min_max_ratio(a.node_count as f32, b.node_count as f32);
    let edge_ratio = min_max_ratio(a.edge_count as f32, b.edge_count as f32);
    let diameter_ratio = min_max_ratio(a.diameter, b.diameter);
    QuickScores {
        node_ratio,
        edge_ratio,
        diameter_ratio,
        score: (node_ratio + edge_ratio + diameter_ratio) / 3.0,
    }
}

/// Intersection of two degree histograms, each normalized by its node total.
fn degree_histogram_similarity(a: &Invariants, b: &Invariants) -> f32 {
    let total_a: u32 = a.degree_histogram.iter().sum();
    let total_b: u32 = b.degree_histogram.iter().sum();
    if total_a == 0 && total_b == 0 {
        return 1.0;
    }
    if total_a == 0 || total_b == 0 {
        return 0.0;
    }
    let len = a.degree_histogram.len().max(b.degree_histogram.len());
    (0..len)
        .map(|i| {
            let fa = a.degree_histogram.get(i).copied().unwrap_or(0) as f32 / total_a as f32;
            let fb = b.degree_histogram.get(i).copied().unwrap_or(0) as f32 / total_b as f32;
            fa.min(fb)
        })
        .sum::<f32>()
        .clamp(0.0, 1.0)
}

/// Intersection of two fraction histograms; two empty histograms match.
fn histogram_intersection(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| x.min(*y))
        .sum::<f32>()
        .clamp(0.0, 1.0)
}

/// Mean of mean-closeness and stddev-closeness.
fn stats_closeness(a: &[f32], b: &[f32]) -> f32 {
    (relative_closeness(mean(a), mean(b)) + relative_closeness(std_dev(a), std_dev(b))) / 2.0
}

fn weakest(basic: &BasicScores, detailed: Option<&DetailedScores>) -> (&'static str, f32) {
    let mut all: Vec<(&'static str, f32)> = basic.named().to_vec();
    if let Some(d) = detailed {
        all.extend(d.named());
    }
    all.into_iter()
        .min_by(|x, y| x.1.total_cmp(&y.1))
        .unwrap_or(("none", 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TreadPoint;
    use crate::graph::GraphBuilder;
    use crate::matching::{AcceptAll, IdAllowList};
    use approx::assert_relative_eq;

    fn lattice(cols: usize, rows: usize, spacing: f32, wobble: f32) -> Graph {
        let pts: Vec<TreadPoint> = (0..cols * rows)
            .map(|i| {
                let (c, r) = ((i % cols) as f32, (i / cols) as f32);
                let w = ((i * 7919) % 13) as f32 / 13.0 - 0.5;
                TreadPoint::new(c * spacing + w * wobble, r * spacing - w * wobble, 0.9)
            })
            .collect();
        GraphBuilder::default().build(&pts)
    }

    #[test]
    fn test_self_similarity() {
        let g = lattice(5, 6, 35.0, 8.0);
        let out = CoarseMatcher::default().compare(&g, &g);
        assert_eq!(out.decision, MatchDecision::Same);
        assert_relative_eq!(out.similarity, 1.0, epsilon = 1e-5);
        assert!(out.stages.detailed.is_some());
    }

    #[test]
    fn test_quick_reject_on_node_ratio() {
        let big = lattice(5, 8, 35.0, 8.0);
        let small = lattice(5, 3, 35.0, 8.0);
        let out = CoarseMatcher::default().compare(&big, &small);
        assert_eq!(out.decision, MatchDecision::Different);
        assert!(out.stages.basic.is_none());
        assert!(out.reason.contains("node count"));
        assert_relative_eq!(out.similarity, out.stages.quick.score);
    }

    #[test]
    fn test_symmetry() {
        let a = lattice(5, 6, 35.0, 8.0);
        let b = lattice(5, 7, 33.0, 12.0);
        let m = CoarseMatcher::default();
        let ab = m.compare(&a, &b);
        let ba = m.compare(&b, &a);
        assert_relative_eq!(ab.similarity, ba.similarity, epsilon = 1e-4);
    }

    #[test]
    fn test_different_reason_names_weakest() {
        let a = lattice(5, 6, 35.0, 0.0);
        // Same count, far sparser: every node is isolated
        let pts: Vec<TreadPoint> = (0..30)
            .map(|i| TreadPoint::new(i as f32 * 400.0, 0.0, 0.9))
            .collect();
        let b = GraphBuilder::default().build(&pts);
        let cfg = CoarseMatcherConfig::new();
        let cfg = CoarseMatcherConfig {
            min_edge_ratio: 0.0,
            ..cfg
        };
        let out = CoarseMatcher::new(cfg, SignatureConfig::default()).compare(&a, &b);
        assert_eq!(out.decision, MatchDecision::Different);
        assert!(out.reason.starts_with("weakest comparison"));
    }

    #[test]
    fn test_find_most_similar_skips_self_and_counts() {
        let target = lattice(5, 6, 35.0, 8.0);
        let candidates = vec![
            target.clone(),
            lattice(5, 6, 35.0, 6.0).with_id("near"),
            lattice(5, 2, 35.0, 8.0).with_id("far"),
        ];
        let m = CoarseMatcher::default();
        let ranking = m.find_most_similar(&target, &candidates, 1);
        assert_eq!(ranking.compared, 2);
        assert_eq!(ranking.matches.len(), 1);
        assert_eq!(ranking.matches[0].graph_id, "near");
        assert_eq!(
            ranking.same_count + ranking.similar_count + ranking.different_count,
            2
        );

        let filtered =
            m.find_most_similar_filtered(&target, &candidates, 5, &IdAllowList::new(["far"]));
        assert_eq!(filtered.compared, 1);
        assert_eq!(filtered.matches[0].graph_id, "far");

        let all = m.find_most_similar_filtered(&target, &candidates, 5, &AcceptAll);
        assert_eq!(all.compared, 2);
    }
}
