//! Property-based tests for scoring and detector invariants.
//!
//! Run with: cargo test -p mesh-machinability --test proptest_analysis

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_truncation)]

mod common;

use mesh_machinability::{
    AnalysisConfig, CountPenalty, DeepPocketMethod, DetectorKind, PenaltyTable, analyze, detect,
};
use mesh_types::{IndexedMesh, Point3, Vertex, axis_box};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_vertex() -> impl Strategy<Value = Vertex> {
    prop::array::uniform3(-50.0..50.0f64).prop_map(|[x, y, z]| Vertex::from_coords(x, y, z))
}

/// Triangle soup with valid indices; may be degenerate, open or self-intersecting.
fn arb_soup(max_vertices: usize, max_faces: usize) -> impl Strategy<Value = IndexedMesh> {
    (3..=max_vertices).prop_flat_map(move |n| {
        prop::collection::vec(arb_vertex(), n).prop_flat_map(move |verts| {
            let count = verts.len() as u32;
            prop::collection::vec(prop::array::uniform3(0..count), 1..=max_faces)
                .prop_map(move |faces| IndexedMesh::from_parts(verts.clone(), faces))
        })
    })
}

/// Axis-aligned box with random extents and position.
fn arb_box() -> impl Strategy<Value = IndexedMesh> {
    (
        prop::array::uniform3(-100.0..100.0f64),
        prop::array::uniform3(1.0..80.0f64),
    )
        .prop_map(|([x, y, z], [w, d, h])| {
            axis_box(Point3::new(x, y, z), Point3::new(x + w, y + d, z + h))
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Score stays in range and every enabled detector reports, whatever the input.
    #[test]
    fn score_is_bounded_for_any_soup(mesh in arb_soup(12, 30), context in any::<bool>()) {
        let config = AnalysisConfig::default().with_context_aware(context);
        let report = analyze(&mesh, &config);
        prop_assert!((0.0..=100.0).contains(&report.score()));
        prop_assert_eq!(report.results.len(), DetectorKind::ALL.len());
    }

    /// Plain boxes never lose points in the context-aware configuration.
    #[test]
    fn boxes_score_full_marks(mesh in arb_box()) {
        let report = analyze(&mesh, &AnalysisConfig::default());
        prop_assert_eq!(report.failures().count(), 0);
        let small = report.result(DetectorKind::SmallFeatures).unwrap();
        // Boxes thinner than the tool radius legitimately have small features.
        if small.grade() == 0 {
            prop_assert!((report.score() - 100.0).abs() < 1e-9);
        }
    }

    /// Raising the depth threshold never flags more deep pocket faces.
    #[test]
    fn deep_pockets_monotonic(gap in 1.0..90.0f64, low in 0.5..60.0f64, extra in 0.0..60.0f64) {
        let mesh = common::facing_blocks(gap);
        for method in [DeepPocketMethod::Ray, DeepPocketMethod::Normal] {
            let count = |threshold: f64| {
                let config = AnalysisConfig::default()
                    .with_deep_pocket_method(method)
                    .with_deep_pocket_threshold(threshold);
                detect(DetectorKind::DeepPockets, &mesh, &config).count()
            };
            prop_assert!(count(low + extra) <= count(low));
        }
    }

    /// More flagged faces never cost less.
    #[test]
    fn count_penalty_monotonic(a in 0usize..500, b in 0usize..500) {
        let table = PenaltyTable::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        for kind in DetectorKind::ALL {
            if let Some(p) = table.count_penalty(kind) {
                prop_assert!(p.apply(lo) <= p.apply(hi));
                prop_assert!(p.apply(hi) <= p.cap);
            }
        }
        let custom = CountPenalty::new(10.0, 0.25);
        prop_assert!(custom.apply(lo) <= custom.apply(hi));
    }
}
