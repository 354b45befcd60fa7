//! Combined quality of a pipeline run.
//!
//! ```text
//! combined = 0.4 * structural similarity
//!          + 0.3 * refinement consistency   (0.3 when refinement did not complete)
//!          + 0.3 * validation score         (0.3 when validation did not complete)
//! ```

use serde::{Deserialize, Serialize};

use super::stage::StageOutcome;
use crate::merge::MergeOutcome;
use crate::refine::RefinementResult;
use crate::validation::ValidationReport;

const STRUCTURAL_WEIGHT: f32 = 0.4;
const REFINEMENT_WEIGHT: f32 = 0.3;
const VALIDATION_WEIGHT: f32 = 0.3;

/// Value standing in for a stage that produced no score
const NEUTRAL_SCORE: f32 = 0.3;

/// Below this, refinement consistency earns a recommendation
const LOW_CONSISTENCY: f32 = 0.7;

/// Quality tier of a combined score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Below 0.5
    Poor,
    /// 0.5 to 0.7
    Acceptable,
    /// 0.7 to 0.85
    Good,
    /// 0.85 and above
    Excellent,
}

impl QualityTier {
    /// Tier for a combined score
    pub fn from_score(score: f32) -> Self {
        if score >= 0.85 {
            QualityTier::Excellent
        } else if score >= 0.7 {
            QualityTier::Good
        } else if score >= 0.5 {
            QualityTier::Acceptable
        } else {
            QualityTier::Poor
        }
    }

    /// Tier name for reports
    pub fn name(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Acceptable => "acceptable",
            QualityTier::Poor => "poor",
        }
    }
}

/// Combined score, its components, and follow-up advice.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// 0.4 structural + 0.3 refinement + 0.3 validation
    pub combined_score: f32,
    /// Tier of `combined_score`
    pub tier: QualityTier,
    /// Structural similarity of the merge (0 for a fallback without one)
    pub structural_similarity: f32,
    /// Refinement consistency, when refinement completed
    pub refinement_consistency: Option<f32>,
    /// Validation overall score, when validation completed
    pub validation_score: Option<f32>,
    /// Follow-up advice
    pub recommendations: Vec<String>,
}

impl QualityAssessment {
    /// Assess a run from its stage outcomes.
    pub fn assess(
        merge: &MergeOutcome,
        refinement: &StageOutcome<RefinementResult>,
        validation: &StageOutcome<ValidationReport>,
    ) -> Self {
        let structural_similarity = merge.structural_similarity();
        let refinement_consistency = refinement.value().map(|r| r.metrics.consistency);
        let validation_score = validation.value().map(|v| v.overall_score);

        let combined_score = STRUCTURAL_WEIGHT * structural_similarity
            + REFINEMENT_WEIGHT * refinement_consistency.unwrap_or(NEUTRAL_SCORE)
            + VALIDATION_WEIGHT * validation_score.unwrap_or(NEUTRAL_SCORE);
        let tier = QualityTier::from_score(combined_score);

        let mut recommendations = Vec::new();
        if let MergeOutcome::Fallback(f) = merge {
            recommendations.push(format!(
                "Merged by point proximity ({}); capture more tread points \
                 or check that both prints show the same region",
                f.reason
            ));
        }
        match refinement {
            StageOutcome::Completed(r) if r.metrics.consistency < LOW_CONSISTENCY => {
                recommendations.push(format!(
                    "Refinement left edge lengths inconsistent ({:.2}); \
                     raise max_iterations or review correspondences",
                    r.metrics.consistency
                ));
            }
            StageOutcome::Completed(r) if !r.state.is_converged() => {
                recommendations
                    .push("Refinement hit the iteration limit; raise max_iterations".to_string());
            }
            StageOutcome::Failed { error } => {
                recommendations.push(format!("Refinement failed: {}", error));
            }
            _ => {}
        }
        match validation {
            StageOutcome::Completed(v) => {
                recommendations.extend(v.recommendations.iter().cloned());
            }
            StageOutcome::Failed { error } => {
                recommendations.push(format!("Validation failed: {}", error));
            }
            StageOutcome::Skipped { .. } => {}
        }
        if tier == QualityTier::Poor {
            recommendations.push(
                "Treat this merge as unreliable; do not use it as a reference model".to_string(),
            );
        }

        Self {
            combined_score,
            tier,
            structural_similarity,
            refinement_consistency,
            validation_score,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(QualityTier::from_score(0.85), QualityTier::Excellent);
        assert_eq!(QualityTier::from_score(0.849), QualityTier::Good);
        assert_eq!(QualityTier::from_score(0.7), QualityTier::Good);
        assert_eq!(QualityTier::from_score(0.5), QualityTier::Acceptable);
        assert_eq!(QualityTier::from_score(0.49), QualityTier::Poor);
        assert!(QualityTier::Excellent > QualityTier::Poor);
    }
}
