//! Pipeline orchestration.
//!
//! ```text
//!  Graph A ─┐
//!           ├─► TopologyMerger ─► SpringRefiner ─► TopologyValidator ─► QualityAssessment
//!  Graph B ─┘     (structural       (optional)        (optional,
//!                  or fallback)                        >= 3 nodes)
//! ```
//!
//! Each optional stage reports a [`StageOutcome`]; a failed stage keeps the
//! results of the stages before it.

mod orchestrator;
mod quality;
mod stage;

pub use orchestrator::{BatchResult, BatchStop, PipelineConfig, PipelineResult, TopologyPipeline};
pub use quality::{QualityAssessment, QualityTier};
pub use stage::StageOutcome;
