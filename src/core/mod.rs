//! Core geometry types, math helpers and spatial indexing.

pub mod math;
mod point;
mod spatial;

pub use point::{Point2D, TreadPoint};
pub use spatial::{IndexedPoint, PointIndex};
