//! Graph-level comparison.
//!
//! - [`CoarseMatcher`]: invariant cascade producing a same/similar/different
//!   decision
//! - [`CandidateFilter`]: seam for an external fast pre-filter

mod coarse;
mod prefilter;

pub use coarse::{
    BasicScores, CandidateRanking, CoarseMatcher, CoarseMatcherConfig, DetailedScores,
    MatchDecision, MatchOutcome, QuickScores, RankedMatch, StageScores,
};
pub use prefilter::{AcceptAll, CandidateFilter, IdAllowList};
