//! Statistical validation that a layout change preserved geometry.
//!
//! Five weighted checks over a graph's edges and neighbourhoods:
//!
//! ```text
//! distance relations   0.35   edge-length ratios are uniform
//! angle preservation   0.25   neighbour-pair angles unchanged
//! connectivity         0.20   no edge torn apart
//! scale uniformity     0.10   same scale on X and Y
//! local structure      0.10   per-node neighbourhood shape kept
//! ```
//!
//! A report passes when every check weighing 0.2 or more passes and the
//! weighted score exceeds 0.7.

mod checks;
mod validator;

pub use checks::{CheckKind, CheckMetrics, CheckResult};
pub use validator::{TopologyValidator, ValidationReport, ValidatorConfig};
