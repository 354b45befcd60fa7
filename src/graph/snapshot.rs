//! Serializable graph snapshots.
//!
//! [`GraphSnapshot`] is the persistence contract consumed by an external
//! storage layer. [`VisualizationSnapshot`] is a read-only view for an
//! external renderer; this crate never renders.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::invariants::Invariants;
use super::types::{Edge, Graph, Node, NodeId};
use crate::error::Result;

/// Full persisted form of a [`Graph`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Graph id
    pub id: String,
    /// Graph name
    pub name: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Nodes in id order
    pub nodes: Vec<Node>,
    /// Edges in id order
    pub edges: Vec<Edge>,
    /// Invariants at snapshot time
    pub invariants: Invariants,
}

impl GraphSnapshot {
    /// Capture a graph.
    pub fn capture(graph: &Graph) -> Self {
        Self {
            id: graph.id().to_string(),
            name: graph.name().to_string(),
            created_at: graph.created_at(),
            updated_at: graph.updated_at(),
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().cloned().collect(),
            invariants: (*graph.invariants()).clone(),
        }
    }

    /// Rebuild a graph.
    ///
    /// Edge lengths are recomputed from node positions; edges whose
    /// endpoints are missing are dropped with a warning.
    pub fn restore(&self) -> Graph {
        let mut graph = Graph::new(self.name.clone()).with_id(self.id.clone());
        for node in &self.nodes {
            graph.insert_node(node.id, node.position, node.confidence);
        }
        let mut dropped = 0usize;
        for edge in &self.edges {
            if graph.node(edge.source).is_none() || graph.node(edge.target).is_none() {
                dropped += 1;
                continue;
            }
            graph.add_edge(edge.source, edge.target);
        }
        if dropped > 0 {
            log::warn!(
                "[GraphSnapshot] Dropped {} edge(s) with unknown endpoints in '{}'",
                dropped,
                self.id
            );
        }
        graph.recompute_normalized_lengths();
        graph.with_timestamps(self.created_at, self.updated_at)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Graph {
    /// Capture this graph as a [`GraphSnapshot`]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(self)
    }
}

/// One node as seen by a renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisNode {
    /// Node id
    pub id: NodeId,
    /// X position (pixels)
    pub x: f32,
    /// Y position (pixels)
    pub y: f32,
    /// Node confidence
    pub confidence: f32,
    /// Origin label ("merged", "from_a", "from_b"), if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// A correspondence line between two source graphs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisCorrespondence {
    /// Node id in graph A
    pub node_a: NodeId,
    /// Node id in graph B
    pub node_b: NodeId,
    /// Match score
    pub score: f32,
}

/// Read-only rendering view of a graph and its annotations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationSnapshot {
    /// Nodes in id order
    pub nodes: Vec<VisNode>,
    /// Edge endpoint pairs in edge-id order
    pub edges: Vec<(NodeId, NodeId)>,
    /// Correspondences used to build the graph
    pub correspondences: Vec<VisCorrespondence>,
    /// Validation check scores by check name
    pub check_scores: BTreeMap<String, f32>,
}

impl VisualizationSnapshot {
    /// View of a bare graph.
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .map(|n| VisNode {
                    id: n.id,
                    x: n.position.x,
                    y: n.position.y,
                    confidence: n.confidence,
                    origin: None,
                })
                .collect(),
            edges: graph.edges().map(|e| (e.source, e.target)).collect(),
            correspondences: Vec::new(),
            check_scores: BTreeMap::new(),
        }
    }

    /// Builder: attach origin labels by node id
    pub fn with_origins(mut self, origins: &BTreeMap<NodeId, String>) -> Self {
        for node in &mut self.nodes {
            node.origin = origins.get(&node.id).cloned();
        }
        self
    }

    /// Builder: attach correspondences
    pub fn with_correspondences(
        mut self,
        correspondences: impl IntoIterator<Item = VisCorrespondence>,
    ) -> Self {
        self.correspondences = correspondences.into_iter().collect();
        self
    }

    /// Builder: attach per-check scores
    pub fn with_check_scores(mut self, scores: BTreeMap<String, f32>) -> Self {
        self.check_scores = scores;
        self
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
