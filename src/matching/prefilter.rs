//! Seam for an external fast pre-filter.
//!
//! A compact-descriptor index (bitmask Hamming distance, shape moments, ...)
//! may live outside this crate and reject most candidates before structural
//! comparison. This crate never computes or stores such descriptors; it only
//! asks the filter which candidates to keep.

use std::collections::BTreeSet;

use crate::graph::Graph;

/// Decides which candidate graphs reach structural comparison.
pub trait CandidateFilter {
    /// Whether `candidate` should be compared against `target`.
    fn admit(&self, target: &Graph, candidate: &Graph) -> bool;

    /// Name of this filter for logging
    fn name(&self) -> &str;
}

/// Admits every candidate.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl CandidateFilter for AcceptAll {
    fn admit(&self, _target: &Graph, _candidate: &Graph) -> bool {
        true
    }

    fn name(&self) -> &str {
        "accept-all"
    }
}

/// Admits only candidates whose graph id was returned by an external index.
#[derive(Clone, Debug, Default)]
pub struct IdAllowList {
    ids: BTreeSet<String>,
}

impl IdAllowList {
    /// Build from the ids an index returned
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of admitted ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if no id is admitted
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl CandidateFilter for IdAllowList {
    fn admit(&self, _target: &Graph, candidate: &Graph) -> bool {
        self.ids.contains(candidate.id())
    }

    fn name(&self) -> &str {
        "id-allow-list"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        let target = Graph::new("t");
        let keep = Graph::new("k").with_id("keep");
        let drop = Graph::new("d").with_id("drop");
        let filter = IdAllowList::new(["keep"]);
        assert!(filter.admit(&target, &keep));
        assert!(!filter.admit(&target, &drop));
        assert!(AcceptAll.admit(&target, &drop));
        assert_eq!(filter.len(), 1);
    }
}
