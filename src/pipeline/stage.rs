//! Per-stage outcome.

/// Outcome of one optional pipeline stage.
#[derive(Clone, Debug)]
pub enum StageOutcome<T> {
    /// Stage ran and produced a value
    Completed(T),
    /// Stage did not run
    Skipped {
        /// Why it was skipped
        reason: String,
    },
    /// Stage ran and failed; earlier results are kept
    Failed {
        /// Error message
        error: String,
    },
}

impl<T> StageOutcome<T> {
    /// Completed value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed(v) => Some(v),
            _ => None,
        }
    }

    /// Consume into the completed value
    pub fn into_value(self) -> Option<T> {
        match self {
            StageOutcome::Completed(v) => Some(v),
            _ => None,
        }
    }

    /// True when the stage ran to completion
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }

    /// True when the stage hit a fault
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }

    /// Outcome name for logging
    pub fn name(&self) -> &'static str {
        match self {
            StageOutcome::Completed(_) => "completed",
            StageOutcome::Skipped { .. } => "skipped",
            StageOutcome::Failed { .. } => "failed",
        }
    }

    pub(super) fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped {
            reason: reason.into(),
        }
    }
}
