//! Spatial indexing for nearest-neighbour queries over point sets.
//!
//! Uses an R-tree so k-NN and radius queries stay sub-linear:
//! - k nearest points to a position, optionally within a radius
//! - nearest point passing a caller predicate (e.g. "not yet claimed")
//!
//! Results are ordered by (squared distance, index), so equidistant points
//! always come back in the same order regardless of how the tree was packed.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use super::Point2D;

/// An indexed position for R-tree storage.
#[derive(Clone, Copy, Debug)]
pub struct IndexedPoint {
    /// The position.
    pub position: Point2D,
    /// Index of this point in the original collection.
    pub index: usize,
}

impl IndexedPoint {
    /// Create a new indexed point.
    pub fn new(position: Point2D, index: usize) -> Self {
        Self { position, index }
    }
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.position.x, self.position.y])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        Point2D::new(point[0], point[1]).distance_squared(&self.position)
    }

    fn contains_point(&self, point: &[f32; 2]) -> bool {
        self.distance_2(point) <= 0.0
    }
}

/// Spatial index over a fixed set of positions.
///
/// # Example
/// ```rust
/// use pada_match::core::{Point2D, PointIndex};
///
/// let points = vec![Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0), Point2D::new(50.0, 0.0)];
/// let index = PointIndex::new(&points);
///
/// let near = index.k_nearest(Point2D::new(1.0, 0.0), 2, f32::INFINITY, |_| true);
/// assert_eq!(near.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1]);
/// ```
#[derive(Clone)]
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    /// Create a new index; each point keeps its slice position as index.
    pub fn new(points: &[Point2D]) -> Self {
        let indexed: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new(*p, i))
            .collect();

        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Number of points in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Up to `k` nearest points within `max_distance` for which `keep`
    /// returns true.
    ///
    /// Returns (index, squared distance) pairs sorted by squared distance,
    /// then index. Points tied with the k-th distance are all considered
    /// before truncating, so the lower index wins a tie.
    pub fn k_nearest<F>(
        &self,
        point: Point2D,
        k: usize,
        max_distance: f32,
        keep: F,
    ) -> Vec<(usize, f32)>
    where
        F: Fn(usize) -> bool,
    {
        if k == 0 {
            return Vec::new();
        }
        let max_dist_sq = max_distance * max_distance;

        let mut found: Vec<(usize, f32)> = Vec::new();
        for (indexed, d2) in self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[point.x, point.y])
        {
            if d2 > max_dist_sq {
                break;
            }
            if found.len() >= k && found.last().is_some_and(|&(_, last)| d2 > last) {
                break;
            }
            if keep(indexed.index) {
                found.push((indexed.index, d2));
            }
        }

        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found.truncate(k);
        found
    }

    /// Nearest point within `max_distance` for which `keep` returns true.
    ///
    /// Returns (index, distance).
    pub fn nearest<F>(&self, point: Point2D, max_distance: f32, keep: F) -> Option<(usize, f32)>
    where
        F: Fn(usize) -> bool,
    {
        self.k_nearest(point, 1, max_distance, keep)
            .first()
            .map(|&(i, d2)| (i, d2.sqrt()))
    }
}

impl std::fmt::Debug for PointIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointIndex")
            .field("size", &self.tree.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_points() -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(0.0, 10.0),  // Tied with index 1 from the origin
            Point2D::new(-10.0, 0.0), // Tied as well
            Point2D::new(100.0, 100.0),
        ]
    }

    #[test]
    fn test_new_index() {
        let index = PointIndex::new(&make_test_points());
        assert_eq!(index.len(), 5);
        assert!(!index.is_empty());
        assert!(PointIndex::new(&[]).is_empty());
    }

    #[test]
    fn test_k_nearest_breaks_ties_by_index() {
        let index = PointIndex::new(&make_test_points());
        let near = index.k_nearest(Point2D::ZERO, 3, f32::INFINITY, |i| i != 0);
        let ids: Vec<usize> = near.iter().map(|(i, _)| *i).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let two = index.k_nearest(Point2D::ZERO, 2, f32::INFINITY, |i| i != 0);
        assert_eq!(two.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_k_nearest_respects_radius() {
        let index = PointIndex::new(&make_test_points());
        let near = index.k_nearest(Point2D::ZERO, 10, 50.0, |_| true);
        assert_eq!(near.len(), 4);
        for (_, d2) in &near {
            assert!(*d2 <= 2500.0, "Distance² {} exceeds threshold", d2);
        }
        assert!(index.k_nearest(Point2D::ZERO, 0, 50.0, |_| true).is_empty());
    }

    #[test]
    fn test_nearest_skips_rejected() {
        let index = PointIndex::new(&make_test_points());
        let (idx, dist) = index
            .nearest(Point2D::new(9.0, 0.0), 20.0, |i| i != 1)
            .unwrap();
        assert_eq!(idx, 0);
        assert!((dist - 9.0).abs() < 1e-5);
        assert!(index.nearest(Point2D::new(9.0, 0.0), 5.0, |i| i != 1).is_none());
    }
}
