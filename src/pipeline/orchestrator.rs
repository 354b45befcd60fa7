//! End-to-end merge → refine → validate orchestration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::quality::QualityAssessment;
use super::stage::StageOutcome;
use crate::config::PadaConfig;
use crate::core::Point2D;
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId, VisCorrespondence, VisualizationSnapshot};
use crate::merge::{MergeOutcome, TopologyMerger, Transformation};
use crate::refine::{RefinementResult, RestState, SpringRefiner};
use crate::validation::{TopologyValidator, ValidationReport};

/// Stage toggles for [`TopologyPipeline`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run spring refinement after merging.
    /// Default: true
    pub enable_refinement: bool,

    /// Run topology validation on the final layout.
    /// Default: true
    pub enable_validation: bool,

    /// Fused node count below which validation is skipped.
    /// Default: 3
    pub min_nodes_for_validation: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_refinement: true,
            enable_validation: true,
            min_nodes_for_validation: 3,
        }
    }
}

impl PipelineConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: enable or disable refinement
    pub fn with_refinement(mut self, enabled: bool) -> Self {
        self.enable_refinement = enabled;
        self
    }

    /// Builder: enable or disable validation
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = enabled;
        self
    }
}

/// Result of [`TopologyPipeline::full_topology_merge`].
#[derive(Clone, Debug)]
pub struct PipelineResult {
    /// Structural or fallback merge
    pub merge: MergeOutcome,
    /// Spring relaxation of the fused layout
    pub refinement: StageOutcome<RefinementResult>,
    /// Geometry checks of the final layout against the fused reference
    pub validation: StageOutcome<ValidationReport>,
    /// Refined graph, or the fused graph when refinement did not complete
    pub final_graph: Graph,
    /// Combined quality over all stages
    pub quality: QualityAssessment,
}

impl PipelineResult {
    /// True when no stage failed
    pub fn is_success(&self) -> bool {
        !self.refinement.is_failed() && !self.validation.is_failed()
    }

    /// Final node positions
    pub fn final_positions(&self) -> BTreeMap<NodeId, Point2D> {
        self.final_graph.positions()
    }

    /// Read-only view of the final layout with origins, correspondences
    /// and check scores.
    pub fn visualization(&self) -> VisualizationSnapshot {
        let scores = self
            .validation
            .value()
            .map(|v| v.scores())
            .unwrap_or_default();
        VisualizationSnapshot::from_graph(&self.final_graph)
            .with_origins(&self.merge.fused().origin_labels())
            .with_correspondences(self.merge.correspondences().iter().map(|c| {
                VisCorrespondence {
                    node_a: c.node_a,
                    node_b: c.node_b,
                    score: c.score,
                }
            }))
            .with_check_scores(scores)
    }
}

/// Why a batch stopped early.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchStop {
    /// Index of the graph that could not be merged in
    pub graph_index: usize,
    /// Error or failed-stage description
    pub reason: String,
}

/// Result of [`TopologyPipeline::batch_merge`].
#[derive(Clone, Debug)]
pub struct BatchResult {
    /// Accumulated model after the last successful step
    pub graph: Graph,
    /// One entry per attempted step, in order
    pub steps: Vec<PipelineResult>,
    /// Set when a step failed
    pub stopped: Option<BatchStop>,
}

impl BatchResult {
    /// True when every graph was merged in
    pub fn is_complete(&self) -> bool {
        self.stopped.is_none()
    }
}

/// Merge → refine → validate pipeline.
#[derive(Clone, Debug, Default)]
pub struct TopologyPipeline {
    config: PipelineConfig,
    merger: TopologyMerger,
    refiner: SpringRefiner,
    validator: TopologyValidator,
}

impl TopologyPipeline {
    /// Create a pipeline from its components
    pub fn new(
        config: PipelineConfig,
        merger: TopologyMerger,
        refiner: SpringRefiner,
        validator: TopologyValidator,
    ) -> Self {
        Self {
            config,
            merger,
            refiner,
            validator,
        }
    }

    /// Create a pipeline from the full configuration
    pub fn from_config(config: &PadaConfig) -> Self {
        Self::new(
            config.pipeline.clone(),
            TopologyMerger::new(
                config.merger.clone(),
                config.signature.clone(),
                config.point_merger.clone(),
            ),
            SpringRefiner::new(config.refiner.clone()),
            TopologyValidator::new(config.validator.clone()),
        )
    }

    /// Current config
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Merge `b` into `a`, relax the fused layout and validate it against
    /// the source geometry.
    ///
    /// Fails only when merging itself cannot start; refinement and
    /// validation failures are reported in their [`StageOutcome`].
    pub fn full_topology_merge(
        &self,
        a: &Graph,
        b: &Graph,
        transform: Option<&Transformation>,
    ) -> Result<PipelineResult> {
        let merge = self.merger.merge_graphs(a, b, transform)?;
        let fused = merge.fused();

        let refinement = if !self.config.enable_refinement {
            StageOutcome::skipped("refinement disabled")
        } else {
            match self.refiner.refine(&fused.graph, &fused.rest_state()) {
                Ok(result) => StageOutcome::Completed(result),
                Err(e) => {
                    log::warn!("[TopologyPipeline] Refinement failed: {}", e);
                    StageOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            }
        };

        let final_graph = match refinement.value() {
            Some(r) => r.graph.clone(),
            None => fused.graph.clone(),
        };

        let validation = if !self.config.enable_validation {
            StageOutcome::skipped("validation disabled")
        } else if final_graph.node_count() < self.config.min_nodes_for_validation {
            StageOutcome::skipped(format!(
                "{} nodes, need {}",
                final_graph.node_count(),
                self.config.min_nodes_for_validation
            ))
        } else {
            let after = final_graph.positions();
            if after.values().any(|p| !p.is_finite()) {
                StageOutcome::Failed {
                    error: Error::non_finite("final position").to_string(),
                }
            } else {
                StageOutcome::Completed(self.validator.validate_transformation(
                    &fused.reference_positions,
                    &after,
                    &final_graph,
                    None,
                ))
            }
        };

        let quality = QualityAssessment::assess(&merge, &refinement, &validation);
        log::info!(
            "[TopologyPipeline] {} merge: {} nodes, refinement {}, validation {}, \
             quality {} ({:.3})",
            merge.method(),
            final_graph.node_count(),
            refinement.name(),
            validation.name(),
            quality.tier.name(),
            quality.combined_score
        );

        Ok(PipelineResult {
            merge,
            refinement,
            validation,
            final_graph,
            quality,
        })
    }

    /// Merge only; no refinement or validation
    pub fn quick_merge(&self, a: &Graph, b: &Graph) -> Result<MergeOutcome> {
        self.merger.merge_graphs(a, b, None)
    }

    /// Relax a graph towards its own current geometry
    pub fn refine_only(&self, graph: &Graph) -> Result<RefinementResult> {
        self.refiner.refine(graph, &RestState::from_graph(graph))
    }

    /// Validate a layout change without merging
    pub fn validate_only(
        &self,
        before: &BTreeMap<NodeId, Point2D>,
        after: &BTreeMap<NodeId, Point2D>,
        graph: &Graph,
        transform: Option<&Transformation>,
    ) -> ValidationReport {
        self.validator
            .validate_transformation(before, after, graph, transform)
    }

    /// Fold `graphs` into one model, merging each into the running result.
    ///
    /// Stops at the first step that errors or whose refinement or
    /// validation fails; the model built so far is kept.
    pub fn batch_merge(&self, graphs: &[Graph]) -> Result<BatchResult> {
        let Some((first, rest)) = graphs.split_first() else {
            return Err(Error::InsufficientInput {
                stage: "batch merge",
                needed: 1,
                found: 0,
            });
        };

        let mut graph = first.clone();
        let mut steps = Vec::with_capacity(rest.len());
        let mut stopped = None;

        for (offset, next) in rest.iter().enumerate() {
            let graph_index = offset + 1;
            match self.full_topology_merge(&graph, next, None) {
                Ok(result) if result.is_success() => {
                    graph = result.final_graph.clone();
                    steps.push(result);
                }
                Ok(result) => {
                    stopped = Some(BatchStop {
                        graph_index,
                        reason: "refinement or validation failed".to_string(),
                    });
                    steps.push(result);
                    break;
                }
                Err(e) => {
                    stopped = Some(BatchStop {
                        graph_index,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        match &stopped {
            Some(stop) => log::warn!(
                "[TopologyPipeline] Batch stopped at graph {}: {}",
                stop.graph_index,
                stop.reason
            ),
            None => log::info!(
                "[TopologyPipeline] Batch merged {} graphs into {} nodes",
                graphs.len(),
                graph.node_count()
            ),
        }

        Ok(BatchResult {
            graph,
            steps,
            stopped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TreadPoint;
    use crate::graph::GraphBuilder;
    use crate::pipeline::QualityTier;
    use crate::refine::RefinerConfig;

    fn pattern(dx: f32, dy: f32) -> Graph {
        let points: Vec<TreadPoint> = (0..30)
            .map(|i| {
                let (r, c) = (i / 5, i % 5);
                let wx = ((i * 7919) % 31) as f32 / 31.0 * 16.0 - 8.0;
                let wy = ((i * 104729) % 29) as f32 / 29.0 * 16.0 - 8.0;
                TreadPoint::new(c as f32 * 35.0 + wx + dx, r as f32 * 35.0 + wy + dy, 0.8)
            })
            .collect();
        GraphBuilder::default().build(&points)
    }

    #[test]
    fn test_self_merge_is_high_quality() {
        let g = pattern(0.0, 0.0);
        let result = TopologyPipeline::default()
            .full_topology_merge(&g, &g, None)
            .unwrap();
        assert!(!result.merge.is_fallback());
        assert!(result.refinement.is_completed());
        assert!(result.validation.is_completed());
        assert!(result.quality.tier >= QualityTier::Good);
        assert_eq!(result.final_graph.node_count(), 30);
    }

    #[test]
    fn test_disabled_stages_use_neutral_score() {
        let g = pattern(0.0, 0.0);
        let config = PipelineConfig::new()
            .with_refinement(false)
            .with_validation(false);
        let pipeline = TopologyPipeline::new(
            config,
            TopologyMerger::default(),
            SpringRefiner::default(),
            TopologyValidator::default(),
        );
        let result = pipeline.full_topology_merge(&g, &g, None).unwrap();
        assert!(matches!(result.refinement, StageOutcome::Skipped { .. }));
        assert!(matches!(result.validation, StageOutcome::Skipped { .. }));
        let expected = 0.4 * result.merge.structural_similarity() + 0.18;
        assert!((result.quality.combined_score - expected).abs() < 1e-5);
    }

    #[test]
    fn test_small_graph_skips_validation() {
        let mut a = Graph::new("a");
        a.add_node(Point2D::new(0.0, 0.0), 0.9);
        let mut b = Graph::new("b");
        b.add_node(Point2D::new(5.0, 0.0), 0.9);
        let result = TopologyPipeline::default()
            .full_topology_merge(&a, &b, None)
            .unwrap();
        assert!(result.merge.is_fallback());
        assert!(matches!(result.validation, StageOutcome::Skipped { .. }));
    }

    #[test]
    fn test_empty_inputs_error() {
        let empty = Graph::new("empty");
        let err = TopologyPipeline::default()
            .full_topology_merge(&empty, &empty, None)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientInput { .. }));
    }

    #[test]
    fn test_batch_edge_cases() {
        let pipeline = TopologyPipeline::default();
        assert!(pipeline.batch_merge(&[]).is_err());

        let single = pipeline.batch_merge(&[pattern(0.0, 0.0)]).unwrap();
        assert!(single.is_complete());
        assert!(single.steps.is_empty());
        assert_eq!(single.graph.node_count(), 30);
    }

    #[test]
    fn test_batch_folds_sequentially() {
        let graphs = vec![pattern(0.0, 0.0), pattern(2.0, 1.0), pattern(-1.0, 2.0)];
        let batch = TopologyPipeline::default().batch_merge(&graphs).unwrap();
        assert!(batch.is_complete());
        assert_eq!(batch.steps.len(), 2);
        assert_eq!(
            batch.graph.node_count(),
            batch.steps[1].final_graph.node_count()
        );
    }

    #[test]
    fn test_batch_stops_on_failed_stage() {
        // Infinite repulsion turns every refined position into NaN.
        let refiner = SpringRefiner::new(RefinerConfig {
            repulsion_constant: f32::INFINITY,
            ..RefinerConfig::default()
        });
        let pipeline = TopologyPipeline::new(
            PipelineConfig::default(),
            TopologyMerger::default(),
            refiner,
            TopologyValidator::default(),
        );
        let first = pattern(0.0, 0.0);
        let graphs = vec![first.clone(), pattern(2.0, 1.0), pattern(-1.0, 2.0)];

        let batch = pipeline.batch_merge(&graphs).unwrap();
        assert!(!batch.is_complete());
        let stop = batch.stopped.as_ref().unwrap();
        assert_eq!(stop.graph_index, 1);
        assert_eq!(stop.reason, "refinement or validation failed");
        assert_eq!(batch.steps.len(), 1);
        assert!(batch.steps[0].refinement.is_failed());
        assert_eq!(batch.graph.positions(), first.positions());
    }

    #[test]
    fn test_batch_stops_on_merge_error() {
        let mut single = Graph::new("single");
        single.add_node(Point2D::new(0.0, 0.0), 0.9);
        let graphs = vec![single.clone(), Graph::new("empty"), pattern(0.0, 0.0)];

        let batch = TopologyPipeline::default().batch_merge(&graphs).unwrap();
        let stop = batch.stopped.as_ref().unwrap();
        assert_eq!(stop.graph_index, 1);
        assert!(stop.reason.contains("merge"), "reason: {}", stop.reason);
        assert!(batch.steps.is_empty());
        assert_eq!(batch.graph.node_count(), 1);
        assert_eq!(batch.graph.positions(), single.positions());
    }

    #[test]
    fn test_visualization_carries_scores() {
        let g = pattern(0.0, 0.0);
        let result = TopologyPipeline::default()
            .full_topology_merge(&g, &g, None)
            .unwrap();
        let vis = result.visualization();
        assert_eq!(vis.nodes.len(), result.final_graph.node_count());
        assert!(vis.nodes.iter().all(|n| n.origin.is_some()));
        assert_eq!(vis.correspondences.len(), result.merge.correspondences().len());
        assert_eq!(vis.check_scores.len(), 5);
    }
}
