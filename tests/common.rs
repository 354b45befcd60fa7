//! Test utilities for pada-match.
//!
//! Synthetic outsole point sets and rigid motions.

#![allow(dead_code)]

use pada_match::{Graph, GraphBuilder, Point2D, TreadPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Columns of the synthetic tread lattice
pub const OUTSOLE_COLUMNS: usize = 5;

/// Lattice spacing in pixels
pub const OUTSOLE_SPACING: f32 = 35.0;

/// Create a jittered lattice of `n` tread points, 5 columns wide.
pub fn outsole(n: usize, seed: u64) -> Vec<TreadPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let (col, row) = (i % OUTSOLE_COLUMNS, i / OUTSOLE_COLUMNS);
            TreadPoint::new(
                col as f32 * OUTSOLE_SPACING + rng.random_range(-10.0..10.0),
                row as f32 * OUTSOLE_SPACING + rng.random_range(-10.0..10.0),
                rng.random_range(0.6..1.0),
            )
        })
        .collect()
}

/// Uniformly scattered points over a 250 x 300 px sole area.
pub fn uniform_cloud(n: usize, seed: u64) -> Vec<TreadPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            TreadPoint::new(
                rng.random_range(0.0..250.0),
                rng.random_range(0.0..300.0),
                rng.random_range(0.6..1.0),
            )
        })
        .collect()
}

/// Centroid of a point set.
pub fn centroid(points: &[TreadPoint]) -> Point2D {
    let n = points.len().max(1) as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point2D::new(sx / n, sy / n)
}

/// Rotate about the centroid by `degrees`, then translate.
pub fn rotate_translate(
    points: &[TreadPoint],
    degrees: f32,
    translation: Point2D,
) -> Vec<TreadPoint> {
    let pivot = centroid(points);
    let angle = degrees.to_radians();
    points
        .iter()
        .map(|p| {
            let q = p.position().rotate_about(pivot, angle) + translation;
            TreadPoint::new(q.x, q.y, p.confidence)
        })
        .collect()
}

/// Translate every point.
pub fn translate(points: &[TreadPoint], translation: Point2D) -> Vec<TreadPoint> {
    rotate_translate(points, 0.0, translation)
}

/// Build a graph with default builder settings.
pub fn graph(points: &[TreadPoint]) -> Graph {
    GraphBuilder::default().build(points)
}
