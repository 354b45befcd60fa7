//! Physics-based relaxation of fused layouts.
//!
//! - [`RestState`]: target edge lengths and neighbour angles
//! - [`SpringRefiner`]: iterative spring/repulsion/torque solver
//! - [`RefinementState`]: explicit termination states

mod rest;
mod spring;
mod state;

pub use rest::{AngleConstraint, RestState};
pub use spring::{RefinementMetrics, RefinementResult, RefinerConfig, SpringRefiner};
pub use state::RefinementState;
