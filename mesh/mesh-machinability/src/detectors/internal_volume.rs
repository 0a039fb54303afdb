//! Enclosed void detection from the volume / convex hull ratio.
//!
//! A low ratio alone does not mean a sealed cavity: brackets and U-shapes
//! have large open cutouts. Parts whose vertices crowd a stock boundary
//! plane are treated as open and never flagged.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Detector, DetectorKind};
use crate::config::Calibration;
use crate::error::{MachinabilityError, MachinabilityResult};
use crate::facts::MeshFacts;
use crate::result::{DetectionResult, Findings, InternalVolumeFindings, Severity};
use crate::run::AnalysisRun;

/// How external openings are recognized and grades assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InternalVolumeStrategy {
    /// A handful of vertices exactly on a boundary plane means "open".
    Realistic,
    /// A fixed share of vertices near a boundary plane means "open".
    ContextAware,
}

/// Grades how hollow a closed part is.
#[derive(Debug, Clone, Copy)]
pub struct InternalVolumeDetector {
    strategy: InternalVolumeStrategy,
}

impl InternalVolumeDetector {
    /// Create a detector using `strategy`.
    #[must_use]
    pub const fn new(strategy: InternalVolumeStrategy) -> Self {
        Self { strategy }
    }

    /// Whether the part appears open to the stock boundary.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn has_external_openings(&self, facts: &MeshFacts, cal: &Calibration) -> bool {
        let (tolerance, needed) = match self.strategy {
            InternalVolumeStrategy::Realistic => {
                (cal.opening_tolerance, cal.opening_vertex_count as f64)
            }
            InternalVolumeStrategy::ContextAware => (
                cal.opening_tolerance_context,
                facts.vertex_count() as f64 * cal.opening_vertex_fraction,
            ),
        };

        let bounds = facts.bounds();
        (0..3).any(|axis| {
            [bounds.min[axis], bounds.max[axis]].into_iter().any(|plane| {
                let on_plane = facts
                    .vertices()
                    .iter()
                    .filter(|v| (v[axis] - plane).abs() < tolerance)
                    .count();
                on_plane as f64 >= needed
            })
        })
    }

    fn grade(&self, ratio: f64, cal: &Calibration) -> u8 {
        let hollow = match self.strategy {
            InternalVolumeStrategy::Realistic => cal.hollow_ratio,
            InternalVolumeStrategy::ContextAware => cal.hollow_ratio_context,
        };
        if ratio < cal.enclosed_ratio {
            2
        } else if ratio < hollow {
            1
        } else {
            0
        }
    }
}

/// Advice for an internal volume grade.
#[must_use]
pub const fn recommendation(grade: u8) -> &'static str {
    match grade {
        0 => "No internal volume issues",
        1 => "Minor hollowness - verify design intent",
        _ => "Severe internal volumes - redesign required",
    }
}

impl Detector for InternalVolumeDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::InternalVolumes
    }

    fn detect(&self, run: &AnalysisRun<'_>) -> MachinabilityResult<DetectionResult> {
        let facts = run.facts();
        let cal = &run.config().calibration;

        let mut findings = InternalVolumeFindings {
            strategy: self.strategy,
            grade: 0,
            is_watertight: facts.is_watertight(),
            actual_volume: 0.0,
            convex_volume: 0.0,
            volume_ratio: 0.0,
            has_external_openings: false,
        };

        if !facts.is_watertight() {
            let err = MachinabilityError::NotWatertight;
            warn!(error = %err, "Internal volume check is inconclusive");
            return Ok(inconclusive(findings, err.to_string()));
        }

        let convex_volume = match facts.convex_hull_volume() {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "Internal volume check is inconclusive");
                return Ok(inconclusive(
                    findings,
                    format!("Error calculating volumes: {err}"),
                ));
            }
        };

        findings.actual_volume = facts.volume();
        findings.convex_volume = convex_volume;
        findings.volume_ratio = facts.volume() / convex_volume;
        findings.has_external_openings = self.has_external_openings(facts, cal);

        if !findings.has_external_openings {
            findings.grade = self.grade(findings.volume_ratio, cal);
        }

        info!(
            strategy = ?self.strategy,
            ratio = findings.volume_ratio,
            openings = findings.has_external_openings,
            grade = findings.grade,
            "Internal volume check complete"
        );

        let grade = findings.grade;
        Ok(DetectionResult::completed(
            Findings::InternalVolumes(findings),
            Severity::from_grade(grade),
            recommendation(grade),
        ))
    }
}

fn inconclusive(findings: InternalVolumeFindings, error: impl Into<String>) -> DetectionResult {
    DetectionResult {
        error: Some(error.into()),
        ..DetectionResult::completed(
            Findings::InternalVolumes(findings),
            Severity::None,
            recommendation(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::detectors::fixtures;
    use mesh_types::{IndexedMesh, Point3, subdivided_box};

    fn run_detector(mesh: &IndexedMesh, strategy: InternalVolumeStrategy) -> DetectionResult {
        let facts = fixtures::facts(mesh);
        let config = AnalysisConfig::default();
        let run = AnalysisRun::new(&facts, &config);
        match InternalVolumeDetector::new(strategy).detect(&run) {
            Ok(r) => r,
            Err(err) => panic!("detector failed: {err}"),
        }
    }

    /// 100 mm block around a finely tessellated cavity, so few vertices sit
    /// on the outer planes.
    fn hollow_shell(cavity_min: f64, cavity_max: f64) -> IndexedMesh {
        let mut block = fixtures::cube(100.0);
        let mut cavity = subdivided_box(
            Point3::new(cavity_min, cavity_min, cavity_min),
            Point3::new(cavity_max, cavity_max, cavity_max),
            4,
        );
        cavity.flip_normals();
        block.merge(&cavity);
        block
    }

    #[test]
    fn test_solid_cube_is_fine() {
        for strategy in [
            InternalVolumeStrategy::Realistic,
            InternalVolumeStrategy::ContextAware,
        ] {
            let result = run_detector(&fixtures::cube(20.0), strategy);
            assert!(!result.has_problem);
            assert!(result.error.is_none());
            let Some(Findings::InternalVolumes(f)) = &result.findings else {
                panic!("internal volume findings expected");
            };
            assert!((f.volume_ratio - 1.0).abs() < 1e-6);
            assert!(f.has_external_openings);
            assert_eq!(result.recommendation, "No internal volume issues");
        }
    }

    #[test]
    fn test_open_mesh_is_inconclusive() {
        let mut cube = fixtures::cube(20.0);
        cube.faces.pop();
        let result = run_detector(&cube, InternalVolumeStrategy::ContextAware);
        assert_eq!(result.error.as_deref(), Some("Mesh is not watertight"));
        assert_eq!(result.error, Some(MachinabilityError::NotWatertight.to_string()));
        assert_eq!(result.severity, Severity::None);
        assert_eq!(result.grade(), 0);
        assert!(!result.has_problem);
    }

    #[test]
    fn test_thin_shell_is_severe() {
        // Ratio 1 - 0.9^3 = 0.271; outer vertices are 8 of 106.
        let result = run_detector(&hollow_shell(5.0, 95.0), InternalVolumeStrategy::ContextAware);
        assert_eq!(result.grade(), 2);
        assert_eq!(result.severity, Severity::High);
        assert_eq!(
            result.recommendation,
            "Severe internal volumes - redesign required"
        );
    }

    #[test]
    fn test_thick_shell_is_minor() {
        // Ratio 1 - 0.8^3 = 0.488.
        let result = run_detector(&hollow_shell(10.0, 90.0), InternalVolumeStrategy::ContextAware);
        assert_eq!(result.grade(), 1);
        assert_eq!(result.severity, Severity::Medium);
    }

    #[test]
    fn test_realistic_sees_corner_vertices_as_openings() {
        // Each outer plane holds 4 box corners.
        let result = run_detector(&hollow_shell(5.0, 95.0), InternalVolumeStrategy::Realistic);
        assert_eq!(result.grade(), 0);
        let Some(Findings::InternalVolumes(f)) = &result.findings else {
            panic!("internal volume findings expected");
        };
        assert!(f.has_external_openings);
    }
}
