//! Proximity graphs over tread points.
//!
//! - [`GraphBuilder`]: points to k-NN graph
//! - [`Graph`]: node/edge registries with versioned mutation
//! - [`Invariants`]: memoized structural descriptors
//! - [`GraphSnapshot`], [`VisualizationSnapshot`]: serializable views

mod builder;
pub mod invariants;
mod snapshot;
mod types;

pub use builder::{GraphBuilder, GraphBuilderConfig};
pub use invariants::Invariants;
pub use snapshot::{GraphSnapshot, VisCorrespondence, VisNode, VisualizationSnapshot};
pub use types::{Edge, EdgeId, Graph, MAX_NODE_CONFIDENCE, MIN_NODE_CONFIDENCE, Node, NodeId};
