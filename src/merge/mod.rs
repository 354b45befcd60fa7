//! Graph fusion.
//!
//! - [`TopologyMerger`]: structural merge via star-vector correspondences,
//!   falling back to [`PointMerger`]
//! - [`TransformEstimator`]: rigid transform from correspondences
//! - [`NodeFuser`]: builds the fused graph

mod correspondence;
mod fusion;
mod point_merger;
mod topology;
mod transform;

pub use correspondence::{Correspondence, find_correspondences};
pub use fusion::{FusedGraph, NodeFuser, NodeOrigin};
pub use point_merger::{
    MergedPoint, PointMatch, PointMergeResult, PointMerger, PointMergerConfig, PointOrigin,
};
pub use topology::{
    FallbackMerge, FallbackReason, MergeOutcome, MergerConfig, StructuralMerge,
    StructuralSimilarity, TopologyMerger, structural_similarity,
};
pub use transform::{TransformEstimator, TransformKind, Transformation};
