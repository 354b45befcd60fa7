//! Greedy one-pass node correspondence search.
//!
//! For each node of A (in id order) the best still-unclaimed node of B is
//! claimed when its signature similarity exceeds the threshold. A candidate
//! must strictly beat the current best, so ties keep the earlier candidate.
//! This is a tuned heuristic, not an optimal assignment.

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;
use crate::signature::StarSignature;

/// A hypothesized same-point match between two graphs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Index into A's signature list
    pub index_a: usize,
    /// Index into B's signature list
    pub index_b: usize,
    /// Node id in A
    pub node_a: NodeId,
    /// Node id in B
    pub node_b: NodeId,
    /// Signature similarity
    pub score: f32,
}

/// Find greedy 1-1 correspondences between two signature sets.
pub fn find_correspondences(
    sig_a: &[StarSignature],
    sig_b: &[StarSignature],
    threshold: f32,
    sharpness: f32,
) -> Vec<Correspondence> {
    let mut claimed = vec![false; sig_b.len()];
    let mut out = Vec::new();

    for (index_a, sa) in sig_a.iter().enumerate() {
        let mut best: Option<(usize, f32)> = None;
        let mut best_score = threshold;
        for (index_b, sb) in sig_b.iter().enumerate() {
            if claimed[index_b] {
                continue;
            }
            let score = sa.correspondence_similarity(sb, sharpness);
            if score > best_score {
                best_score = score;
                best = Some((index_b, score));
            }
        }
        if let Some((index_b, score)) = best {
            claimed[index_b] = true;
            out.push(Correspondence {
                index_a,
                index_b,
                node_a: sa.node_id,
                node_b: sig_b[index_b].node_id,
                score,
            });
        }
    }

    log::debug!(
        "[Correspondence] {} matches from {} x {} signatures",
        out.len(),
        sig_a.len(),
        sig_b.len()
    );
    out
}
