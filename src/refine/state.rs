//! Relaxation state machine states.

use serde::{Deserialize, Serialize};

/// Refinement loop state.
///
/// ```text
/// Relaxing ──(energy variance < threshold)──► Converged
///     │
///     └────(iteration == max_iterations)────► IterationLimitReached
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RefinementState {
    /// Still iterating
    Relaxing {
        /// Iterations completed so far
        iteration: usize,
    },

    /// Energy settled before the iteration cap
    Converged {
        /// Iterations run
        iterations: usize,
    },

    /// Iteration cap hit without settling
    IterationLimitReached {
        /// Iterations run
        iterations: usize,
    },
}

impl RefinementState {
    /// Is this a terminal state?
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RefinementState::Relaxing { .. })
    }

    /// Did the relaxation converge?
    pub fn is_converged(&self) -> bool {
        matches!(self, RefinementState::Converged { .. })
    }

    /// Iterations completed
    pub fn iterations(&self) -> usize {
        match self {
            RefinementState::Relaxing { iteration } => *iteration,
            RefinementState::Converged { iterations }
            | RefinementState::IterationLimitReached { iterations } => *iterations,
        }
    }

    /// State name for logging
    pub fn name(&self) -> &'static str {
        match self {
            RefinementState::Relaxing { .. } => "Relaxing",
            RefinementState::Converged { .. } => "Converged",
            RefinementState::IterationLimitReached { .. } => "IterationLimitReached",
        }
    }
}

impl Default for RefinementState {
    fn default() -> Self {
        RefinementState::Relaxing { iteration: 0 }
    }
}
