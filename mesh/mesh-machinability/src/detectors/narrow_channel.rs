//! Narrow channel detection.

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Rotation3;
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Detector, DetectorKind, flag_faces};
use crate::error::MachinabilityResult;
use crate::facts::MeshFacts;
use crate::result::{DetectionResult, Findings, NarrowChannelFindings};
use crate::run::AnalysisRun;

/// How channel width is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NarrowChannelStrategy {
    /// Face size as a width proxy, restricted to deep faces without tool access.
    ContextBased,
    /// Distance to nearby face centroids as the local gap.
    Spatial,
}

/// Finds gaps too narrow for the tool and for chip evacuation.
#[derive(Debug, Clone, Copy)]
pub struct NarrowChannelDetector {
    strategy: NarrowChannelStrategy,
}

impl NarrowChannelDetector {
    /// Create a detector using `strategy`.
    #[must_use]
    pub const fn new(strategy: NarrowChannelStrategy) -> Self {
        Self { strategy }
    }
}

/// Local gap at every face: distance from its centroid to the centroid of
/// rank `rank` among its `neighbors` nearest (rank 0 is the face itself).
///
/// Faces with fewer than `rank + 1` neighbors get an infinite gap.
#[must_use]
pub fn centroid_gaps(facts: &MeshFacts, neighbors: usize, rank: usize) -> Vec<f64> {
    // Faces on axis-aligned planes share exact coordinates, which overflows
    // kd-tree buckets; distances are invariant under this fixed rotation.
    let skew = Rotation3::from_euler_angles(0.412, 0.733, 0.257);
    let points: Vec<[f64; 3]> = facts
        .centroids()
        .iter()
        .map(|c| {
            let p = skew * c;
            [p.x, p.y, p.z]
        })
        .collect();

    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, p) in points.iter().enumerate() {
        tree.add(p, i as u64);
    }

    let k = neighbors.max(rank + 1);
    points
        .par_iter()
        .map(|query| {
            let nearest = tree.nearest_n::<SquaredEuclidean>(query, k);
            nearest
                .get(rank)
                .map_or(f64::INFINITY, |n| n.distance.sqrt())
        })
        .collect()
}

impl Detector for NarrowChannelDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::NarrowChannels
    }

    fn detect(&self, run: &AnalysisRun<'_>) -> MachinabilityResult<DetectionResult> {
        let facts = run.facts();
        let config = run.config();
        let width = config.min_channel_width;

        let faces = match self.strategy {
            NarrowChannelStrategy::ContextBased => flag_faces(run, self.kind(), |face| {
                let ctx = run.context(face);
                ctx.face_area.sqrt() < width
                    && ctx.is_deep_pocket
                    && !ctx.has_tool_access
                    && !ctx.is_external
            })?,
            NarrowChannelStrategy::Spatial => {
                let gaps = centroid_gaps(
                    facts,
                    config.calibration.channel_neighbors,
                    config.calibration.channel_gap_rank,
                );
                flag_faces(run, self.kind(), |face| gaps[face] < width)?
            }
        };

        let count = faces.len();
        let severity = config.calibration.channel_tiers.severity(count);
        info!(
            strategy = ?self.strategy,
            min_width = width,
            count,
            severity = %severity,
            "Narrow channel check complete"
        );

        let recommendation = if count == 0 {
            "No problematic narrow channels."
        } else {
            "Widen channels to improve tool access and chip evacuation."
        };

        Ok(DetectionResult::completed(
            Findings::NarrowChannels(NarrowChannelFindings {
                strategy: self.strategy,
                faces,
                min_channel_width: width,
            }),
            severity,
            recommendation,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::detectors::fixtures;
    use crate::result::Severity;
    use mesh_types::{IndexedMesh, Point3, Vertex, subdivided_box};

    fn run_detector(
        mesh: &IndexedMesh,
        strategy: NarrowChannelStrategy,
        config: &AnalysisConfig,
    ) -> DetectionResult {
        let facts = fixtures::facts(mesh);
        let run = AnalysisRun::new(&facts, config);
        match NarrowChannelDetector::new(strategy).detect(&run) {
            Ok(r) => r,
            Err(err) => panic!("detector failed: {err}"),
        }
    }

    /// Flat `n x n` grid of 1 mm cells at height `z`.
    fn plate(n: u32, z: f64) -> IndexedMesh {
        let mut mesh = IndexedMesh::new();
        for j in 0..=n {
            for i in 0..=n {
                mesh.vertices
                    .push(Vertex::from_coords(f64::from(i), f64::from(j), z));
            }
        }
        let idx = |i: u32, j: u32| j * (n + 1) + i;
        for j in 0..n {
            for i in 0..n {
                mesh.faces.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
                mesh.faces.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }
        mesh
    }

    #[test]
    fn test_cube_has_no_narrow_channels() {
        let config = AnalysisConfig::default();
        let result = run_detector(&fixtures::cube(20.0), NarrowChannelStrategy::ContextBased, &config);
        assert!(!result.has_problem);
        assert_eq!(result.recommendation, "No problematic narrow channels.");
    }

    #[test]
    fn test_spatial_flags_parallel_plates() {
        let mut plates = plate(10, 0.0);
        plates.merge(&plate(10, 1.0));
        let config = AnalysisConfig::default().with_min_channel_width(5.0);
        let result = run_detector(&plates, NarrowChannelStrategy::Spatial, &config);
        assert_eq!(result.count(), plates.faces.len());
        assert_eq!(result.severity, Severity::High);
        assert_eq!(
            result.recommendation,
            "Widen channels to improve tool access and chip evacuation."
        );
    }

    #[test]
    fn test_spatial_ignores_sparse_faces() {
        let config = AnalysisConfig::default();
        let result = run_detector(&fixtures::cube(100.0), NarrowChannelStrategy::Spatial, &config);
        assert_eq!(result.count(), 0);
    }

    #[test]
    fn test_gap_rank_skips_self_and_nearest() {
        let mut plates = plate(4, 0.0);
        plates.merge(&plate(4, 1.0));
        let facts = fixtures::facts(&plates);
        let gaps = centroid_gaps(&facts, 10, 2);
        assert_eq!(gaps.len(), plates.faces.len());
        assert!(gaps.iter().all(|&g| g.is_finite() && g > 0.0 && g < 1.5));

        let too_few = centroid_gaps(&facts, 10, 1000);
        assert!(too_few.iter().all(|g| g.is_infinite()));
    }

    #[test]
    fn test_context_based_flags_fine_sealed_cavity() {
        let mut block = fixtures::cube(60.0);
        let mut cavity = subdivided_box(
            Point3::new(20.0, 20.0, 20.0),
            Point3::new(40.0, 40.0, 40.0),
            20,
        );
        cavity.flip_normals();
        block.merge(&cavity);

        let config = AnalysisConfig::default();
        let result = run_detector(&block, NarrowChannelStrategy::ContextBased, &config);
        // 1 mm cells: sqrt(0.5) < 2 mm, and every cavity face is sealed.
        assert_eq!(result.count(), 6 * 20 * 20 * 2);
        assert_eq!(result.severity, Severity::High);
    }
}
