//! Behavioural properties: determinism, symmetry, self-similarity,
//! validator identity and refinement stability.

mod common;

use approx::assert_relative_eq;
use common::{graph, outsole, rotate_translate, uniform_cloud};
use pada_match::matching::IdAllowList;
use pada_match::validation::CheckKind;
use pada_match::{
    CoarseMatcher, Graph, MatchDecision, Point2D, SignatureBuilder, TopologyPipeline,
    TopologyValidator,
};

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_pipeline_is_deterministic() {
    let a = graph(&outsole(30, 42));
    let b = graph(&rotate_translate(&outsole(30, 42), 25.0, Point2D::new(40.0, 10.0)));
    let pipeline = TopologyPipeline::default();

    let first = pipeline.full_topology_merge(&a, &b, None).unwrap();
    let second = pipeline.full_topology_merge(&a, &b, None).unwrap();

    assert_eq!(first.merge.method(), second.merge.method());
    assert_eq!(first.merge.correspondences(), second.merge.correspondences());
    assert_eq!(first.final_positions(), second.final_positions());
    assert_eq!(first.quality.combined_score, second.quality.combined_score);
}

#[test]
fn test_builder_is_deterministic() {
    let points = outsole(40, 9);
    let g1 = graph(&points);
    let g2 = graph(&points);
    let edges1: Vec<(u32, u32)> = g1.edges().map(|e| (e.source, e.target)).collect();
    let edges2: Vec<(u32, u32)> = g2.edges().map(|e| (e.source, e.target)).collect();
    assert_eq!(edges1, edges2);
    assert_eq!(*g1.invariants(), *g2.invariants());
}

// ============================================================================
// Symmetry and self-similarity
// ============================================================================

#[test]
fn test_coarse_similarity_is_symmetric() {
    let matcher = CoarseMatcher::default();
    for seed in 0..5 {
        let a = graph(&outsole(40, seed));
        let b = graph(&outsole(36, seed + 50));
        let ab = matcher.compare(&a, &b);
        let ba = matcher.compare(&b, &a);
        assert_relative_eq!(ab.similarity, ba.similarity, epsilon = 1e-4);
        assert_eq!(ab.decision, ba.decision);
    }
}

#[test]
fn test_local_structure_similarity_is_symmetric() {
    let builder = SignatureBuilder::default();
    let a = builder.build_signatures(&graph(&outsole(30, 3)));
    let b = builder.build_signatures(&graph(&uniform_cloud(30, 4)));
    assert_relative_eq!(
        builder.local_structure_similarity(&a, &b),
        builder.local_structure_similarity(&b, &a),
        epsilon = 1e-6
    );
}

#[test]
fn test_self_similarity() {
    let a = graph(&outsole(40, 17));
    let outcome = CoarseMatcher::default().compare(&a, &a);
    assert_eq!(outcome.decision, MatchDecision::Same);
    assert!(outcome.similarity >= 0.99);
}

#[test]
fn test_ranking_prefers_rotated_copy() {
    let points = outsole(40, 1);
    let target = graph(&points);
    let candidates = vec![
        graph(&outsole(12, 2)),
        graph(&rotate_translate(&points, 45.0, Point2D::new(80.0, 0.0))),
        graph(&uniform_cloud(40, 3)),
    ];
    let matcher = CoarseMatcher::default();

    let ranking = matcher.find_most_similar(&target, &candidates, 2);
    assert_eq!(ranking.compared, 3);
    assert_eq!(ranking.matches.len(), 2);
    assert_eq!(ranking.matches[0].index, 1);
    assert!(ranking.different_count >= 1);

    let allow = IdAllowList::new([candidates[2].id()]);
    let filtered = matcher.find_most_similar_filtered(&target, &candidates, 5, &allow);
    assert_eq!(filtered.compared, 1);
    assert_eq!(filtered.matches[0].index, 2);
}

// ============================================================================
// Validator
// ============================================================================

#[test]
fn test_validator_identity() {
    let g = graph(&outsole(40, 8));
    let positions = g.positions();
    let report =
        TopologyValidator::default().validate_transformation(&positions, &positions, &g, None);
    assert!(report.passed);
    assert!(report.overall_score >= 0.99);
}

#[test]
fn test_single_edge_stretch_breaks_connectivity() {
    let mut g = Graph::new("stretch");
    for x in [0.0, 50.0, 100.0, 150.0] {
        g.add_node(Point2D::new(x, 0.0), 1.0);
    }
    g.add_edge(0, 1);
    g.add_edge(1, 2);
    g.add_edge(2, 3);

    let before = g.positions();
    let mut after = before.clone();
    after.insert(3, Point2D::new(350.0, 0.0));

    let report = TopologyValidator::default().validate_transformation(&before, &after, &g, None);
    let connectivity = report.check(CheckKind::Connectivity).unwrap();
    assert!(!connectivity.passed);
    assert!(!report.passed);
}

// ============================================================================
// Refinement
// ============================================================================

#[test]
fn test_refinement_of_rest_layout_is_stable() {
    let g = graph(&outsole(40, 12));
    let pipeline = TopologyPipeline::default();
    let result = pipeline.refine_only(&g).unwrap();

    assert!(result.state.is_converged(), "ended {}", result.state.name());
    assert!(
        result.state.iterations() <= 15,
        "took {} iterations",
        result.state.iterations()
    );
    assert!(result.metrics.initial_energy < 1e-6);
    assert!(result.metrics.final_energy < 1e-3, "energy {}", result.metrics.final_energy);
    assert!(result.energy_history.iter().all(|e| *e < 1e-3));
    assert!(result.metrics.consistency > 0.999);
    assert!(result.metrics.max_displacement < 0.5);
    for (id, p) in &result.positions {
        let original = g.position(*id).unwrap();
        assert!(p.distance(&original) < 0.5);
    }
}
