//! Node fusion: correspondences + transform → fused graph.
//!
//! Output nodes are laid out in A's frame:
//!
//! ```text
//! matched pair     weighted average of A and B→A positions   (Merged)
//! unmatched A      verbatim                                  (FromA)
//! unmatched B      inverse-transformed into A's frame        (FromB)
//! ```
//!
//! Edges are re-derived by connecting each output node to its nearest fused
//! neighbours; no edge of either input is carried over.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::correspondence::Correspondence;
use super::point_merger::{PointMergeResult, PointOrigin};
use super::transform::Transformation;
use crate::core::Point2D;
use crate::error::{Error, Result};
use crate::graph::{Graph, GraphBuilder, GraphBuilderConfig, NodeId};
use crate::refine::RestState;

/// Provenance of a fused node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum NodeOrigin {
    /// Fused from a matched pair
    Merged {
        /// Node id in A
        source_a: NodeId,
        /// Node id in B
        source_b: NodeId,
        /// Score that justified the match
        score: f32,
    },
    /// Unmatched node of A
    FromA {
        /// Node id in A
        source: NodeId,
    },
    /// Unmatched node of B
    FromB {
        /// Node id in B
        source: NodeId,
    },
}

impl NodeOrigin {
    /// Short label for reports and visualization
    pub fn label(&self) -> &'static str {
        match self {
            NodeOrigin::Merged { .. } => "merged",
            NodeOrigin::FromA { .. } => "from_a",
            NodeOrigin::FromB { .. } => "from_b",
        }
    }
}

/// A fused graph with per-node provenance.
#[derive(Clone, Debug)]
pub struct FusedGraph {
    /// The fused graph (A's frame)
    pub graph: Graph,
    /// Provenance per node id
    pub origins: BTreeMap<NodeId, NodeOrigin>,
    /// Pre-fusion source position per node id, in A's frame
    pub reference_positions: BTreeMap<NodeId, Point2D>,
}

impl FusedGraph {
    /// Rest state from source geometry over the fused topology
    pub fn rest_state(&self) -> RestState {
        RestState::from_positions(&self.graph, &self.reference_positions)
    }

    /// Number of nodes fused from matched pairs
    pub fn merged_count(&self) -> usize {
        self.origins
            .values()
            .filter(|o| matches!(o, NodeOrigin::Merged { .. }))
            .count()
    }

    /// Origin labels by node id
    pub fn origin_labels(&self) -> BTreeMap<NodeId, String> {
        self.origins
            .iter()
            .map(|(id, o)| (*id, o.label().to_string()))
            .collect()
    }
}

/// Builds fused graphs.
#[derive(Clone, Debug)]
pub struct NodeFuser {
    /// Multiplier on fused confidence (clamped to [0, 1])
    pub confidence_boost: f32,
    /// Nearest neighbours each fused node is connected to
    pub neighbors: usize,
}

impl Default for NodeFuser {
    fn default() -> Self {
        Self {
            confidence_boost: 1.3,
            neighbors: 3,
        }
    }
}

impl NodeFuser {
    /// Create a fuser
    pub fn new(confidence_boost: f32, neighbors: usize) -> Self {
        Self {
            confidence_boost,
            neighbors,
        }
    }

    /// Fuse two graphs along correspondences.
    ///
    /// `transform` maps A onto B; B positions are brought into A's frame
    /// with its inverse.
    pub fn fuse(
        &self,
        a: &Graph,
        b: &Graph,
        correspondences: &[Correspondence],
        transform: &Transformation,
    ) -> Result<FusedGraph> {
        let mut graph = Graph::new(fused_name(a, b));
        let mut origins = BTreeMap::new();
        let mut reference_positions = BTreeMap::new();
        let mut used_a = BTreeSet::new();
        let mut used_b = BTreeSet::new();

        for c in correspondences {
            let (Some(na), Some(nb)) = (a.node(c.node_a), b.node(c.node_b)) else {
                continue;
            };
            let pa = na.position;
            let pb = transform.inverse_apply(nb.position);
            let wa = na.confidence * c.score;
            let wb = nb.confidence * c.score;
            let total = wa + wb;
            let (pos, conf) = if total > f32::EPSILON {
                (
                    (pa * wa + pb * wb) * (1.0 / total),
                    (na.confidence * wa + nb.confidence * wb) / total,
                )
            } else {
                ((pa + pb) * 0.5, (na.confidence + nb.confidence) / 2.0)
            };
            if !pos.is_finite() {
                return Err(Error::non_finite("fused position"));
            }

            let id = graph.add_node(pos, (conf * self.confidence_boost).clamp(0.0, 1.0));
            origins.insert(
                id,
                NodeOrigin::Merged {
                    source_a: c.node_a,
                    source_b: c.node_b,
                    score: c.score,
                },
            );
            reference_positions.insert(id, pa);
            used_a.insert(c.node_a);
            used_b.insert(c.node_b);
        }

        for node in a.nodes().filter(|n| !used_a.contains(&n.id)) {
            let id = graph.add_node(node.position, node.confidence);
            origins.insert(id, NodeOrigin::FromA { source: node.id });
            reference_positions.insert(id, node.position);
        }
        for node in b.nodes().filter(|n| !used_b.contains(&n.id)) {
            let pos = transform.inverse_apply(node.position);
            if !pos.is_finite() {
                return Err(Error::non_finite("inverse-transformed position"));
            }
            let id = graph.add_node(pos, node.confidence);
            origins.insert(id, NodeOrigin::FromB { source: node.id });
            reference_positions.insert(id, pos);
        }

        self.connect(&mut graph);
        log::debug!(
            "[NodeFuser] {} merged + {} A + {} B = {} nodes, {} edges",
            used_a.len(),
            a.node_count() - used_a.len(),
            b.node_count() - used_b.len(),
            graph.node_count(),
            graph.edge_count()
        );

        Ok(FusedGraph {
            graph,
            origins,
            reference_positions,
        })
    }

    /// Fused graph from a point-merger result over the nodes of `a` and `b`
    /// (indices follow node-id order).
    pub fn from_point_merge(&self, a: &Graph, b: &Graph, merged: &PointMergeResult) -> FusedGraph {
        let ids_a = a.node_ids();
        let ids_b = b.node_ids();
        let mut graph = Graph::new(fused_name(a, b));
        let mut origins = BTreeMap::new();
        let mut reference_positions = BTreeMap::new();

        for mp in &merged.points {
            let (origin, reference) = match mp.origin {
                PointOrigin::Merged {
                    index_a,
                    index_b,
                    similarity,
                } => {
                    let (Some(&sa), Some(&sb)) = (ids_a.get(index_a), ids_b.get(index_b)) else {
                        continue;
                    };
                    (
                        NodeOrigin::Merged {
                            source_a: sa,
                            source_b: sb,
                            score: similarity,
                        },
                        a.position(sa),
                    )
                }
                PointOrigin::FromA { index } => {
                    let Some(&s) = ids_a.get(index) else { continue };
                    (NodeOrigin::FromA { source: s }, a.position(s))
                }
                PointOrigin::FromB { index } => {
                    let Some(&s) = ids_b.get(index) else { continue };
                    (NodeOrigin::FromB { source: s }, b.position(s))
                }
            };
            let id = graph.add_node(mp.point.position(), mp.point.confidence);
            origins.insert(id, origin);
            reference_positions.insert(id, reference.unwrap_or(mp.point.position()));
        }

        self.connect(&mut graph);
        FusedGraph {
            graph,
            origins,
            reference_positions,
        }
    }

    fn connect(&self, graph: &mut Graph) {
        let config = GraphBuilderConfig::new()
            .with_max_neighbors(self.neighbors)
            .with_distance_threshold(f32::INFINITY);
        GraphBuilder::new(config).connect_nearest(graph);
        graph.recompute_normalized_lengths();
    }
}

fn fused_name(a: &Graph, b: &Graph) -> String {
    match (a.name().is_empty(), b.name().is_empty()) {
        (true, true) => "fused".to_string(),
        _ => format!("{}+{}", a.name(), b.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn graph(points: &[(f32, f32)], conf: f32) -> Graph {
        let mut g = Graph::new("g");
        for &(x, y) in points {
            g.add_node(Point2D::new(x, y), conf);
        }
        g
    }

    #[test]
    fn test_fuse_in_a_frame() {
        let a = graph(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (50.0, 50.0)], 0.5);
        let shift = Point2D::new(100.0, 0.0);
        let b = graph(&[(102.0, 0.0), (110.0, 0.0), (100.0, 10.0), (200.0, 200.0)], 0.5);
        let t = Transformation::translation_only(shift, 0.6);
        let corr: Vec<Correspondence> = (0..3)
            .map(|i| Correspondence {
                index_a: i,
                index_b: i,
                node_a: i as u32,
                node_b: i as u32,
                score: 0.8,
            })
            .collect();

        let fused = NodeFuser::default().fuse(&a, &b, &corr, &t).unwrap();
        assert_eq!(fused.graph.node_count(), 5);
        assert_eq!(fused.merged_count(), 3);

        // Equal weights: midpoint of (0,0) and (2,0)
        let p0 = fused.graph.position(0).unwrap();
        assert_relative_eq!(p0.x, 1.0, epsilon = 1e-5);
        // Boosted confidence
        assert_relative_eq!(fused.graph.node(0).unwrap().confidence, 0.65, epsilon = 1e-5);
        // Unmatched B brought into A frame
        let last = fused.graph.position(4).unwrap();
        assert_relative_eq!(last.x, 100.0, epsilon = 1e-4);
        assert!(matches!(fused.origins[&4], NodeOrigin::FromB { source: 3 }));
        assert_relative_eq!(fused.reference_positions[&0].x, 0.0);
    }

    #[test]
    fn test_edges_rederived() {
        let a = graph(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0), (500.0, 500.0)], 0.9);
        let b = graph(&[], 0.9);
        let fused = NodeFuser::default()
            .fuse(&a, &b, &[], &Transformation::identity())
            .unwrap();
        // The far node still gets 3 neighbours
        assert_eq!(fused.graph.node(4).map(|n| n.degree()), Some(3));
    }
}
