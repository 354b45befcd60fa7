//! Graph invariants: scalar and histogram descriptors that are stable under
//! rigid motion and moderate noise.
//!
//! Invariants are memoized per graph keyed by [`Graph::version`], so a
//! repeated [`Graph::invariants`] call on an unchanged graph is free and any
//! mutation forces recomputation on the next call.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::types::Graph;
use crate::core::math::compute_centroid;

/// Number of bins in the edge-length histogram.
pub const EDGE_LENGTH_BINS: usize = 8;

/// Width of one edge-length bin in normalized-length units.
pub const EDGE_LENGTH_BIN_WIDTH: f32 = 0.25;

/// Derived graph descriptors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Invariants {
    /// Number of nodes
    pub node_count: usize,
    /// Number of edges
    pub edge_count: usize,
    /// 2E / (N(N-1))
    pub density: f32,
    /// 2E / N
    pub avg_degree: f32,
    /// Largest node degree
    pub max_degree: usize,
    /// Node count per degree, indexed by degree
    pub degree_histogram: Vec<u32>,
    /// Mean edge length in pixels
    pub avg_edge_length: f32,
    /// Fraction of edges per normalized-length bin (width 0.25, last bin open)
    pub edge_length_histogram: Vec<f32>,
    /// Largest pairwise Euclidean distance between nodes (pixels)
    pub diameter: f32,
    /// Mean local clustering coefficient over nodes with degree >= 2
    pub clustering_coefficient: f32,
    /// Normalized edge lengths in edge-id order
    pub normalized_edge_lengths: Vec<f32>,
    /// Sorted radial distances from the centroid divided by the largest one
    pub node_distribution: Vec<f32>,
}

impl Invariants {
    /// Compute invariants from scratch.
    ///
    /// A graph with no edges yields zeroed descriptors and empty histograms;
    /// only `node_count` and `diameter` are still reported.
    pub fn compute(graph: &Graph) -> Self {
        let n = graph.node_count();
        let e = graph.edge_count();
        let positions = graph.position_list();
        let diameter = geometric_diameter(&positions);

        if e == 0 {
            return Self {
                node_count: n,
                diameter,
                ..Self::default()
            };
        }

        let nf = n as f32;
        let ef = e as f32;
        let density = if n > 1 {
            2.0 * ef / (nf * (nf - 1.0))
        } else {
            0.0
        };
        let avg_degree = 2.0 * ef / nf;

        let max_degree = graph.nodes().map(|node| node.degree()).max().unwrap_or(0);
        let mut degree_histogram = vec![0u32; max_degree + 1];
        for node in graph.nodes() {
            degree_histogram[node.degree()] += 1;
        }

        let avg_edge_length = graph.edges().map(|edge| edge.length).sum::<f32>() / ef;
        let normalized_edge_lengths: Vec<f32> =
            graph.edges().map(|edge| edge.normalized_length).collect();

        let mut edge_length_histogram = vec![0.0f32; EDGE_LENGTH_BINS];
        for &len in &normalized_edge_lengths {
            let bin = ((len / EDGE_LENGTH_BIN_WIDTH).max(0.0) as usize).min(EDGE_LENGTH_BINS - 1);
            edge_length_histogram[bin] += 1.0;
        }
        for v in &mut edge_length_histogram {
            *v /= ef;
        }

        Self {
            node_count: n,
            edge_count: e,
            density,
            avg_degree,
            max_degree,
            degree_histogram,
            avg_edge_length,
            edge_length_histogram,
            diameter,
            clustering_coefficient: clustering_coefficient(graph),
            normalized_edge_lengths,
            node_distribution: node_distribution(&positions),
        }
    }
}

impl Graph {
    /// Invariants for the current version of this graph (memoized).
    pub fn invariants(&self) -> Rc<Invariants> {
        if let Some((version, cached)) = self.invariants_memo.borrow().as_ref()
            && *version == self.version()
        {
            return Rc::clone(cached);
        }
        let fresh = Rc::new(Invariants::compute(self));
        *self.invariants_memo.borrow_mut() = Some((self.version(), Rc::clone(&fresh)));
        fresh
    }
}

fn geometric_diameter(positions: &[crate::core::Point2D]) -> f32 {
    let mut best = 0.0f32;
    for (i, a) in positions.iter().enumerate() {
        for b in &positions[i + 1..] {
            best = best.max(a.distance_squared(b));
        }
    }
    best.sqrt()
}

/// Mean of (edges among neighbours) / (k(k-1)/2) over nodes with k >= 2.
fn clustering_coefficient(graph: &Graph) -> f32 {
    let mut total = 0.0f32;
    let mut qualifying = 0usize;
    for node in graph.nodes() {
        let k = node.degree();
        if k < 2 {
            continue;
        }
        let neighbors: Vec<_> = node.neighbors.iter().copied().collect();
        let mut links = 0usize;
        for (i, &a) in neighbors.iter().enumerate() {
            for &b in &neighbors[i + 1..] {
                if graph.are_connected(a, b) {
                    links += 1;
                }
            }
        }
        total += links as f32 / (k * (k - 1) / 2) as f32;
        qualifying += 1;
    }
    if qualifying == 0 {
        0.0
    } else {
        total / qualifying as f32
    }
}

fn node_distribution(positions: &[crate::core::Point2D]) -> Vec<f32> {
    let centroid = compute_centroid(positions);
    let mut radial: Vec<f32> = positions.iter().map(|p| p.distance(&centroid)).collect();
    radial.sort_by(|a, b| a.total_cmp(b));
    let max = radial.last().copied().unwrap_or(0.0);
    if max > f32::EPSILON {
        radial.iter_mut().for_each(|r| *r /= max);
    }
    radial
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point2D;
    use approx::assert_relative_eq;

    fn square_with_diagonal() -> Graph {
        let mut g = Graph::new("square");
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
            g.add_node(Point2D::new(x, y), 1.0);
        }
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g.add_edge(2, 3);
        g.add_edge(3, 0);
        g.add_edge(0, 2);
        g.recompute_normalized_lengths();
        g
    }

    #[test]
    fn test_basic_counts() {
        let g = square_with_diagonal();
        let inv = g.invariants();
        assert_eq!(inv.node_count, 4);
        assert_eq!(inv.edge_count, 5);
        assert_relative_eq!(inv.density, 10.0 / 12.0, epsilon = 1e-6);
        assert_relative_eq!(inv.avg_degree, 2.5);
        assert_eq!(inv.max_degree, 3);
        assert_eq!(inv.degree_histogram, vec![0, 0, 2, 2]);
        assert_relative_eq!(inv.diameter, 200.0f32.sqrt(), epsilon = 1e-4);
    }

    #[test]
    fn test_clustering() {
        let g = square_with_diagonal();
        // Nodes 1 and 3: both neighbours linked (1.0). Nodes 0 and 2: 2 of 3 pairs.
        let expected = (1.0 + 1.0 + 2.0 / 3.0 + 2.0 / 3.0) / 4.0;
        assert_relative_eq!(g.invariants().clustering_coefficient, expected, epsilon = 1e-5);
    }

    #[test]
    fn test_histograms_normalized() {
        let inv = square_with_diagonal().invariants();
        let sum: f32 = inv.edge_length_histogram.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
        assert_eq!(inv.node_distribution.last().copied(), Some(1.0));
    }

    #[test]
    fn test_zero_edges_neutral() {
        let mut g = Graph::new("lonely");
        g.add_node(Point2D::ZERO, 1.0);
        g.add_node(Point2D::new(3.0, 4.0), 1.0);
        let inv = g.invariants();
        assert_eq!(inv.edge_count, 0);
        assert_eq!(inv.density, 0.0);
        assert!(inv.degree_histogram.is_empty());
        assert!(inv.edge_length_histogram.is_empty());
        assert_relative_eq!(inv.diameter, 5.0);
    }

    #[test]
    fn test_memo_invalidated_by_mutation() {
        let mut g = square_with_diagonal();
        let first = g.invariants();
        let again = g.invariants();
        assert!(Rc::ptr_eq(&first, &again));

        g.set_node_position(2, Point2D::new(30.0, 30.0));
        let moved = g.invariants();
        assert!(!Rc::ptr_eq(&first, &moved));
        assert!(moved.diameter > first.diameter);
    }
}
