//! Rest state for spring relaxation: the edge lengths and neighbour-pair
//! angles the relaxation tries to restore.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::Point2D;
use crate::core::math::angle_diff;
use crate::graph::{Graph, NodeId};

/// Signed rest angle at `center` from `first` to `second` (radians).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AngleConstraint {
    /// Vertex node
    pub center: NodeId,
    /// First neighbour (lower id)
    pub first: NodeId,
    /// Second neighbour (higher id)
    pub second: NodeId,
    /// Rest angle in [-π, π)
    pub angle: f32,
}

/// Edge rest lengths keyed by `(source, target)` plus angle constraints and
/// the rest layout they were measured on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RestState {
    /// Rest position per node; repulsion is balanced at this layout
    #[serde(default)]
    pub positions: BTreeMap<NodeId, Point2D>,
    /// Rest length per edge (lower id first)
    pub lengths: BTreeMap<(NodeId, NodeId), f32>,
    /// Neighbour-pair rest angles
    pub angles: Vec<AngleConstraint>,
}

impl RestState {
    /// Capture the graph's current geometry as rest state.
    pub fn from_graph(graph: &Graph) -> Self {
        Self::from_positions(graph, &graph.positions())
    }

    /// Rest state from reference positions over the graph's topology.
    ///
    /// Nodes missing from `reference` fall back to their current position.
    pub fn from_positions(graph: &Graph, reference: &BTreeMap<NodeId, Point2D>) -> Self {
        let at = |id: NodeId| reference.get(&id).copied().or_else(|| graph.position(id));

        let mut lengths = BTreeMap::new();
        for edge in graph.edges() {
            let rest = match (at(edge.source), at(edge.target)) {
                (Some(a), Some(b)) => a.distance(&b),
                _ => edge.length,
            };
            lengths.insert((edge.source, edge.target), rest);
        }

        let positions: BTreeMap<NodeId, Point2D> = graph
            .node_ids()
            .into_iter()
            .filter_map(|id| Some((id, at(id)?)))
            .collect();

        let mut angles = Vec::new();
        for node in graph.nodes() {
            let Some(center) = at(node.id) else {
                continue;
            };
            let neighbors: Vec<NodeId> = node.neighbors.iter().copied().collect();
            for (i, &first) in neighbors.iter().enumerate() {
                for &second in &neighbors[i + 1..] {
                    let (Some(p1), Some(p2)) = (at(first), at(second)) else {
                        continue;
                    };
                    angles.push(AngleConstraint {
                        center: node.id,
                        first,
                        second,
                        angle: angle_diff(center.angle_to(&p1), center.angle_to(&p2)),
                    });
                }
            }
        }

        Self {
            positions,
            lengths,
            angles,
        }
    }

    /// Rest length of the edge joining `a` and `b`
    pub fn length(&self, a: NodeId, b: NodeId) -> Option<f32> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.lengths.get(&key).copied()
    }
}
