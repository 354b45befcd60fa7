//! # pada-match
//!
//! Structural comparison and topological fusion of shoe-outsole tread point
//! sets.
//!
//! ## Overview
//!
//! Tread contact points extracted from two photographs are turned into
//! proximity graphs and compared in stages:
//!
//! - **Coarse matching**: cascading invariant comparison with early exit
//!   (same / similar / different)
//! - **Structural merge**: star-vector correspondences, rigid transform
//!   estimation and node fusion, falling back to point proximity merging
//! - **Refinement**: spring relaxation of the fused layout
//! - **Validation**: statistical checks that fusion kept the source geometry
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pada_match::{GraphBuilder, TopologyPipeline, TreadPoint};
//!
//! let builder = GraphBuilder::default();
//! let a = builder.build(&points_a);
//! let b = builder.build(&points_b);
//!
//! let result = TopologyPipeline::default().full_topology_merge(&a, &b, None)?;
//! println!("{} ({:.2})", result.quality.tier.name(), result.quality.combined_score);
//! ```
//!
//! ## Coordinate System
//!
//! Image pixels, X right and Y down as extracted. Rotations are in degrees,
//! positive from +X towards +Y.

#![warn(missing_docs)]

// Geometry primitives
pub mod core;

// Proximity graphs, invariants and snapshots
pub mod graph;

// Star-vector signatures
pub mod signature;

// Graph-level comparison
pub mod matching;

// Correspondence, transform estimation and fusion
pub mod merge;

// Spring relaxation
pub mod refine;

// Geometry-preservation checks
pub mod validation;

// Orchestration
pub mod pipeline;

// Unified configuration
pub mod config;

mod error;

pub use error::{Error, Result};

pub use crate::core::{Point2D, TreadPoint};

pub use graph::{
    Edge, Graph, GraphBuilder, GraphBuilderConfig, GraphSnapshot, Invariants, Node, NodeId,
    VisualizationSnapshot,
};

pub use signature::{SignatureBuilder, SignatureConfig, StarSignature};

pub use matching::{
    AcceptAll, CandidateFilter, CoarseMatcher, CoarseMatcherConfig, MatchDecision, MatchOutcome,
};

pub use merge::{
    Correspondence, FusedGraph, MergeOutcome, MergerConfig, NodeOrigin, PointMerger,
    PointMergerConfig, TopologyMerger, Transformation,
};

pub use refine::{RefinementResult, RefinementState, RefinerConfig, RestState, SpringRefiner};

pub use validation::{CheckKind, TopologyValidator, ValidationReport, ValidatorConfig};

pub use pipeline::{PipelineConfig, PipelineResult, QualityTier, StageOutcome, TopologyPipeline};

pub use config::{ConfigError, PadaConfig};
