//! Proximity graph model.
//!
//! Nodes and edges live in ordered registries keyed by sequential ids, so
//! every iteration over a graph is deterministic. Every structural or
//! geometric mutation bumps [`Graph::version`], which keys the invariant
//! memo (see [`super::invariants`]).

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::invariants::Invariants;
use crate::core::Point2D;

/// Node identifier (sequential within a graph).
pub type NodeId = u32;

/// Edge identifier (sequential within a graph).
pub type EdgeId = u32;

/// Lowest confidence a node may carry.
pub const MIN_NODE_CONFIDENCE: f32 = 0.1;

/// Highest confidence a node may carry.
pub const MAX_NODE_CONFIDENCE: f32 = 1.0;

static GRAPH_SEQ: AtomicU64 = AtomicU64::new(0);

/// A graph node: one tread point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node id
    pub id: NodeId,
    /// Position in pixels
    pub position: Point2D,
    /// Confidence in [0.1, 1.0]
    pub confidence: f32,
    /// Adjacent node ids
    pub neighbors: BTreeSet<NodeId>,
}

impl Node {
    /// Number of incident edges
    #[inline]
    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }
}

/// An undirected edge between two distinct nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge id
    pub id: EdgeId,
    /// Lower endpoint id
    pub source: NodeId,
    /// Higher endpoint id
    pub target: NodeId,
    /// Euclidean length in pixels
    pub length: f32,
    /// Length divided by the graph's mean edge length
    pub normalized_length: f32,
    /// Mean of endpoint confidences
    pub confidence: f32,
}

impl Edge {
    /// The endpoint opposite `node`, if `node` is an endpoint
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.source {
            Some(self.target)
        } else if node == self.target {
            Some(self.source)
        } else {
            None
        }
    }
}

#[inline]
fn edge_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Proximity graph over tread points.
#[derive(Clone, Debug)]
pub struct Graph {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    edge_index: BTreeMap<(NodeId, NodeId), EdgeId>,
    next_node_id: NodeId,
    next_edge_id: EdgeId,
    version: u64,
    pub(super) invariants_memo: RefCell<Option<(u64, Rc<Invariants>)>>,
}

impl Graph {
    /// Create an empty graph with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        let seq = GRAPH_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("graph-{:x}-{}", now.timestamp_millis(), seq),
            name: name.into(),
            created_at: now,
            updated_at: now,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            edge_index: BTreeMap::new(),
            next_node_id: 0,
            next_edge_id: 0,
            version: 0,
            invariants_memo: RefCell::new(None),
        }
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Override both timestamps (used when restoring snapshots).
    pub(crate) fn with_timestamps(
        mut self,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Graph id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation time (UTC)
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last mutation time (UTC)
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Mutation counter. Strictly increases on every change.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────

    /// Add a node. Confidence is clamped to [0.1, 1.0].
    pub fn add_node(&mut self, position: Point2D, confidence: f32) -> NodeId {
        let id = self.next_node_id;
        self.insert_node(id, position, confidence);
        id
    }

    /// Insert a node under an explicit id (snapshot restore).
    pub(crate) fn insert_node(&mut self, id: NodeId, position: Point2D, confidence: f32) {
        let confidence = clamp_confidence(confidence);
        self.nodes.insert(
            id,
            Node {
                id,
                position,
                confidence,
                neighbors: BTreeSet::new(),
            },
        );
        self.next_node_id = self.next_node_id.max(id + 1);
        self.touch();
    }

    /// Connect two nodes.
    ///
    /// Returns `None` for self loops, unknown endpoints, and pairs that are
    /// already connected (in either direction).
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        if a == b {
            return None;
        }
        let key = edge_key(a, b);
        if self.edge_index.contains_key(&key) {
            return None;
        }
        let (pa, ca) = self.nodes.get(&a).map(|n| (n.position, n.confidence))?;
        let (pb, cb) = self.nodes.get(&b).map(|n| (n.position, n.confidence))?;

        let id = self.next_edge_id;
        self.next_edge_id += 1;
        self.edges.insert(
            id,
            Edge {
                id,
                source: key.0,
                target: key.1,
                length: pa.distance(&pb),
                normalized_length: 1.0,
                confidence: (ca + cb) / 2.0,
            },
        );
        self.edge_index.insert(key, id);
        if let Some(n) = self.nodes.get_mut(&a) {
            n.neighbors.insert(b);
        }
        if let Some(n) = self.nodes.get_mut(&b) {
            n.neighbors.insert(a);
        }
        self.touch();
        Some(id)
    }

    /// Move a node, updating incident edge lengths.
    ///
    /// Normalized lengths are left as they are; call
    /// [`Graph::recompute_normalized_lengths`] after a batch of moves.
    pub fn set_node_position(&mut self, id: NodeId, position: Point2D) -> bool {
        let neighbors = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.position = position;
                node.neighbors.clone()
            }
            None => return false,
        };
        for other in neighbors {
            let Some(other_pos) = self.nodes.get(&other).map(|n| n.position) else {
                continue;
            };
            if let Some(edge_id) = self.edge_index.get(&edge_key(id, other))
                && let Some(edge) = self.edges.get_mut(edge_id)
            {
                edge.length = position.distance(&other_pos);
            }
        }
        self.touch();
        true
    }

    /// Replace a node's confidence (clamped), updating incident edge confidence.
    pub fn set_node_confidence(&mut self, id: NodeId, confidence: f32) -> bool {
        let confidence = clamp_confidence(confidence);
        let neighbors = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.confidence = confidence;
                node.neighbors.clone()
            }
            None => return false,
        };
        for other in neighbors {
            let Some(other_conf) = self.nodes.get(&other).map(|n| n.confidence) else {
                continue;
            };
            if let Some(edge_id) = self.edge_index.get(&edge_key(id, other))
                && let Some(edge) = self.edges.get_mut(edge_id)
            {
                edge.confidence = (confidence + other_conf) / 2.0;
            }
        }
        self.touch();
        true
    }

    /// Recompute `normalized_length = length / mean length` for all edges.
    pub fn recompute_normalized_lengths(&mut self) {
        if self.edges.is_empty() {
            return;
        }
        let mean = self.edges.values().map(|e| e.length).sum::<f32>() / self.edges.len() as f32;
        for edge in self.edges.values_mut() {
            edge.normalized_length = if mean > f32::EPSILON {
                edge.length / mean
            } else {
                0.0
            };
        }
        self.touch();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Edge by id
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in id order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Node ids in ascending order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Whether an edge joins `a` and `b`
    pub fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.edge_index.contains_key(&edge_key(a, b))
    }

    /// Edge joining `a` and `b`, if any
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<&Edge> {
        self.edge_index
            .get(&edge_key(a, b))
            .and_then(|id| self.edges.get(id))
    }

    /// Position of a node
    pub fn position(&self, id: NodeId) -> Option<Point2D> {
        self.nodes.get(&id).map(|n| n.position)
    }

    /// All node positions keyed by id
    pub fn positions(&self) -> BTreeMap<NodeId, Point2D> {
        self.nodes.iter().map(|(id, n)| (*id, n.position)).collect()
    }

    /// Node positions in id order
    pub fn position_list(&self) -> Vec<Point2D> {
        self.nodes.values().map(|n| n.position).collect()
    }
}

#[inline]
fn clamp_confidence(c: f32) -> f32 {
    if c.is_finite() {
        c.clamp(MIN_NODE_CONFIDENCE, MAX_NODE_CONFIDENCE)
    } else {
        MIN_NODE_CONFIDENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        let mut g = Graph::new("triangle");
        let a = g.add_node(Point2D::new(0.0, 0.0), 1.0);
        let b = g.add_node(Point2D::new(10.0, 0.0), 0.5);
        let c = g.add_node(Point2D::new(0.0, 10.0), 0.8);
        g.add_edge(a, b);
        g.add_edge(b, c);
        g.add_edge(c, a);
        g
    }

    #[test]
    fn test_edge_dedup_and_self_loop() {
        let mut g = triangle();
        assert_eq!(g.edge_count(), 3);
        assert!(g.add_edge(1, 0).is_none());
        assert!(g.add_edge(0, 0).is_none());
        assert!(g.add_edge(0, 99).is_none());
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.node(0).map(|n| n.degree()), Some(2));
    }

    #[test]
    fn test_confidence_clamped() {
        let mut g = Graph::new("clamp");
        let a = g.add_node(Point2D::ZERO, 0.0);
        let b = g.add_node(Point2D::new(1.0, 0.0), 3.0);
        assert_eq!(g.node(a).map(|n| n.confidence), Some(MIN_NODE_CONFIDENCE));
        assert_eq!(g.node(b).map(|n| n.confidence), Some(MAX_NODE_CONFIDENCE));
    }

    #[test]
    fn test_edge_attributes() {
        let g = triangle();
        let e = g.edge_between(0, 1).unwrap();
        assert_eq!((e.source, e.target), (0, 1));
        assert!((e.length - 10.0).abs() < 1e-6);
        assert!((e.confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_version_bumps_on_mutation() {
        let mut g = triangle();
        let v0 = g.version();
        assert!(g.set_node_position(2, Point2D::new(0.0, 20.0)));
        assert!(g.version() > v0);
        let e = g.edge_between(0, 2).unwrap();
        assert!((e.length - 20.0).abs() < 1e-5);
        let v1 = g.version();
        assert!(!g.set_node_position(42, Point2D::ZERO));
        assert_eq!(g.version(), v1);
    }

    #[test]
    fn test_normalized_lengths() {
        let mut g = triangle();
        g.recompute_normalized_lengths();
        let mean = g.edges().map(|e| e.normalized_length).sum::<f32>() / 3.0;
        assert!((mean - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(Graph::new("a").id(), Graph::new("a").id());
    }
}
