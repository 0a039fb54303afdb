//! Undercut detection.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Detector, DetectorKind, flag_faces, percentage};
use crate::error::MachinabilityResult;
use crate::result::{DetectionResult, Findings, UndercutFindings};
use crate::run::AnalysisRun;

/// How undercuts are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UndercutStrategy {
    /// Upward-facing faces that point back toward the mesh center.
    Basic,
    /// Faces with no axis-aligned tool access that are not on the boundary.
    ContextAware,
}

/// Finds faces a 3-axis tool cannot reach.
#[derive(Debug, Clone, Copy)]
pub struct UndercutDetector {
    strategy: UndercutStrategy,
}

impl UndercutDetector {
    /// Create a detector using `strategy`.
    #[must_use]
    pub const fn new(strategy: UndercutStrategy) -> Self {
        Self { strategy }
    }
}

impl Detector for UndercutDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Undercuts
    }

    fn detect(&self, run: &AnalysisRun<'_>) -> MachinabilityResult<DetectionResult> {
        let facts = run.facts();
        let cal = &run.config().calibration;

        let faces = match self.strategy {
            UndercutStrategy::Basic => {
                let center = facts.face_center_mean();
                flag_faces(run, self.kind(), |face| {
                    let normal = facts.normals()[face];
                    if normal.z <= cal.upward_normal_z {
                        return false;
                    }
                    let to_face = facts.centroids()[face] - center;
                    let to_face = to_face / (to_face.norm() + 1e-8);
                    normal.dot(&to_face) < cal.inward_alignment
                })?
            }
            UndercutStrategy::ContextAware => flag_faces(run, self.kind(), |face| {
                let ctx = run.context(face);
                !ctx.has_tool_access && !ctx.is_external
            })?,
        };

        let count = faces.len();
        let severity = cal.undercut_tiers.severity(count);
        info!(
            strategy = ?self.strategy,
            count,
            severity = %severity,
            "Undercut check complete"
        );

        let recommendation = if count == 0 {
            "No undercuts detected".to_string()
        } else {
            format!(
                "{count} faces are unreachable from the six axis directions. \
                 Remove the undercuts or plan for 5-axis machining."
            )
        };

        Ok(DetectionResult::completed(
            Findings::Undercuts(UndercutFindings {
                strategy: self.strategy,
                percentage: percentage(count, facts.face_count()),
                faces,
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

    fn run_detector(
        mesh: &mesh_types::IndexedMesh,
        strategy: UndercutStrategy,
    ) -> DetectionResult {
        let facts = fixtures::facts(mesh);
        let config = AnalysisConfig::default();
        let run = AnalysisRun::new(&facts, &config);
        match UndercutDetector::new(strategy).detect(&run) {
            Ok(r) => r,
            Err(err) => panic!("detector failed: {err}"),
        }
    }

    #[test]
    fn test_cube_has_no_undercuts() {
        for strategy in [UndercutStrategy::Basic, UndercutStrategy::ContextAware] {
            let result = run_detector(&fixtures::cube(20.0), strategy);
            assert!(!result.has_problem);
            assert_eq!(result.severity, Severity::None);
            assert_eq!(result.count(), 0);
        }
    }

    #[test]
    fn test_basic_flags_lower_of_stacked_faces() {
        let result = run_detector(
            &fixtures::stacked_upward_triangles(),
            UndercutStrategy::Basic,
        );
        assert_eq!(result.faces(), &[1]);
        assert_eq!(result.severity, Severity::Low);
        let Some(Findings::Undercuts(f)) = &result.findings else {
            panic!("undercut findings expected");
        };
        assert!((f.percentage - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_sealed_cavity_is_undercut() {
        let result = run_detector(
            &fixtures::block_with_cavity(60.0, 20.0, 40.0),
            UndercutStrategy::ContextAware,
        );
        let expected: Vec<u32> = (12..24).collect();
        assert_eq!(result.faces(), expected.as_slice());
        assert_eq!(result.severity, Severity::Low);
        assert!(result.recommendation.contains("12 faces"));
    }
}
