//! k-nearest-neighbour proximity graph construction.
//!
//! ```text
//! points ──► skip non-finite ──► nodes ──► k-NN within threshold ──► edges
//!                                                 │
//!                                      normalized_length = len / mean
//! ```

use serde::{Deserialize, Serialize};

use super::types::Graph;
use crate::core::{PointIndex, TreadPoint};

/// Configuration for [`GraphBuilder`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphBuilderConfig {
    /// Nearest neighbours each node connects to.
    /// Effective degree can be higher when farther nodes choose this one.
    /// Default: 5
    pub max_neighbors: usize,

    /// Maximum edge length in pixels.
    /// Default: 150.0
    pub distance_threshold: f32,

    /// Point count below which a warning is logged.
    /// Default: 3
    pub min_points: usize,
}

impl Default for GraphBuilderConfig {
    fn default() -> Self {
        Self {
            max_neighbors: 5,
            distance_threshold: 150.0,
            min_points: 3,
        }
    }
}

impl GraphBuilderConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set max neighbours
    pub fn with_max_neighbors(mut self, k: usize) -> Self {
        self.max_neighbors = k;
        self
    }

    /// Builder: set distance threshold
    pub fn with_distance_threshold(mut self, threshold: f32) -> Self {
        self.distance_threshold = threshold;
        self
    }
}

/// Builds proximity graphs from tread points.
#[derive(Clone, Debug, Default)]
pub struct GraphBuilder {
    config: GraphBuilderConfig,
}

impl GraphBuilder {
    /// Create a builder with the given config
    pub fn new(config: GraphBuilderConfig) -> Self {
        Self { config }
    }

    /// Current config
    pub fn config(&self) -> &GraphBuilderConfig {
        &self.config
    }

    /// Build an unnamed graph from points.
    pub fn build(&self, points: &[TreadPoint]) -> Graph {
        self.build_named(points, "")
    }

    /// Build a graph from points.
    ///
    /// Node ids follow the order of the usable (finite) input points.
    /// Never fails: sparse input yields a sparse graph.
    pub fn build_named(&self, points: &[TreadPoint], name: &str) -> Graph {
        let mut graph = Graph::new(name);

        let mut skipped = 0usize;
        for p in points {
            if !p.is_valid() {
                skipped += 1;
                continue;
            }
            graph.add_node(p.position(), p.confidence);
        }
        if skipped > 0 {
            log::warn!(
                "[GraphBuilder] Skipped {} point(s) with undefined coordinates",
                skipped
            );
        }
        if graph.node_count() < self.config.min_points {
            log::warn!(
                "[GraphBuilder] Only {} usable point(s), graph will be degenerate",
                graph.node_count()
            );
        }

        self.connect_nearest(&mut graph);
        graph.recompute_normalized_lengths();

        log::debug!(
            "[GraphBuilder] Built graph '{}': {} nodes, {} edges",
            graph.name(),
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }

    /// Add k-NN edges for every node currently in `graph`.
    ///
    /// Candidates are ordered by (squared distance, node id).
    pub fn connect_nearest(&self, graph: &mut Graph) {
        let ids = graph.node_ids();
        let positions = graph.position_list();
        let index = PointIndex::new(&positions);

        for (i, &pos) in positions.iter().enumerate() {
            let nearest = index.k_nearest(
                pos,
                self.config.max_neighbors,
                self.config.distance_threshold,
                |j| j != i,
            );
            for (j, _) in nearest {
                graph.add_edge(ids[i], ids[j]);
            }
        }
    }
}
