//! Small feature detection from unique edge lengths.

use hashbrown::HashSet;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Detector, DetectorKind, percentage};
use crate::error::MachinabilityResult;
use crate::result::{DetectionResult, EdgeLengthStats, Findings, Severity, SmallFeatureFindings};
use crate::run::AnalysisRun;

/// Which edges count and how grades are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SmallFeatureStrategy {
    /// All edges, two size classes (tool radius and minimum feature size).
    Basic,
    /// Tessellation-length edges are ignored; one size class.
    Realistic,
}

/// Flags geometry finer than the tool can cut.
#[derive(Debug, Clone, Copy)]
pub struct SmallFeatureDetector {
    strategy: SmallFeatureStrategy,
}

impl SmallFeatureDetector {
    /// Create a detector using `strategy`.
    #[must_use]
    pub const fn new(strategy: SmallFeatureStrategy) -> Self {
        Self { strategy }
    }
}

/// Advice for a small feature grade.
#[must_use]
pub const fn recommendation(grade: u8) -> &'static str {
    match grade {
        0 => "No small feature issues",
        1 => "Some small features - consider tool size",
        _ => "Many small features - may need micro-machining",
    }
}

impl Detector for SmallFeatureDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::SmallFeatures
    }

    #[allow(clippy::cast_precision_loss)]
    fn detect(&self, run: &AnalysisRun<'_>) -> MachinabilityResult<DetectionResult> {
        let edges = run.facts().edges();
        let config = run.config();
        let cal = &config.calibration;
        let tool_radius = config.min_tool_diameter / 2.0;

        if edges.is_empty() {
            return Ok(DetectionResult::inconclusive(
                self.kind(),
                "No edges found in mesh",
                recommendation(0),
            ));
        }

        let lengths: Vec<f64> = edges.iter().map(|e| e.length).collect();
        let edge_lengths = EdgeLengthStats {
            min: lengths.iter().copied().fold(f64::INFINITY, f64::min),
            max: lengths.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: lengths.iter().sum::<f64>() / lengths.len() as f64,
        };

        let (grade, significant_edges, small_edges, below_feature_size, qualifies): (
            u8,
            usize,
            usize,
            usize,
            Box<dyn Fn(f64) -> bool>,
        ) = match self.strategy {
            SmallFeatureStrategy::Realistic => {
                let noise = cal.tessellation_noise;
                let significant = lengths.iter().filter(|&&l| l > noise).count();
                let small = lengths
                    .iter()
                    .filter(|&&l| l > noise && l < tool_radius)
                    .count();
                let pct = percentage(small, significant);
                let grade = if pct > 20.0 {
                    2
                } else if pct > 10.0 {
                    1
                } else {
                    0
                };
                (
                    grade,
                    significant,
                    small,
                    0,
                    Box::new(move |l: f64| l > noise && l < tool_radius),
                )
            }
            SmallFeatureStrategy::Basic => {
                let feature = cal.min_feature_size;
                let very_small = lengths.iter().filter(|&&l| l < tool_radius).count();
                let small = lengths.iter().filter(|&&l| l < feature).count();
                let very_small_pct = percentage(very_small, lengths.len());
                let small_pct = percentage(small, lengths.len());
                let grade = if very_small_pct > 10.0 || small_pct > 20.0 {
                    2
                } else if very_small_pct > 5.0 || small_pct > 15.0 {
                    1
                } else {
                    0
                };
                (
                    grade,
                    lengths.len(),
                    very_small,
                    small,
                    Box::new(move |l: f64| l < tool_radius || l < feature),
                )
            }
        };

        let mut faces: Vec<u32> = edges
            .iter()
            .filter(|e| qualifies(e.length))
            .flat_map(|e| e.faces.iter().copied())
            .collect::<HashSet<u32>>()
            .into_iter()
            .collect();
        faces.sort_unstable();

        info!(
            strategy = ?self.strategy,
            edges = lengths.len(),
            significant = significant_edges,
            small = small_edges,
            grade,
            "Small feature check complete"
        );

        Ok(DetectionResult::completed(
            Findings::SmallFeatures(SmallFeatureFindings {
                strategy: self.strategy,
                grade,
                total_edges: lengths.len(),
                significant_edges,
                small_edges,
                small_percentage: percentage(small_edges, significant_edges),
                below_feature_size,
                edge_lengths,
                faces,
            }),
            Severity::from_grade(grade),
            recommendation(grade),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::detectors::fixtures;
    use mesh_types::{IndexedMesh, Point3, subdivided_box};

    fn run_detector(
        mesh: &IndexedMesh,
        strategy: SmallFeatureStrategy,
        tool: f64,
    ) -> DetectionResult {
        let facts = fixtures::facts(mesh);
        let config = AnalysisConfig::default().with_min_tool_diameter(tool);
        let run = AnalysisRun::new(&facts, &config);
        match SmallFeatureDetector::new(strategy).detect(&run) {
            Ok(r) => r,
            Err(err) => panic!("detector failed: {err}"),
        }
    }

    #[test]
    fn test_large_cube_has_no_small_features() {
        for strategy in [SmallFeatureStrategy::Basic, SmallFeatureStrategy::Realistic] {
            let result = run_detector(&fixtures::cube(20.0), strategy, 3.0);
            assert_eq!(result.grade(), 0);
            assert!(!result.has_problem);
            assert!(result.faces().is_empty());
            assert_eq!(result.recommendation, "No small feature issues");
        }
    }

    #[test]
    fn test_fine_grid_is_graded_severe() {
        // 1 mm cells: edges of 1.0 and 1.41 mm, all under a 1.5 mm tool radius.
        let grid = subdivided_box(Point3::origin(), Point3::new(10.0, 10.0, 10.0), 10);
        let result = run_detector(&grid, SmallFeatureStrategy::Realistic, 3.0);
        assert_eq!(result.grade(), 2);
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.count(), grid.faces.len());

        let Some(Findings::SmallFeatures(f)) = &result.findings else {
            panic!("small feature findings expected");
        };
        assert_eq!(f.significant_edges, f.total_edges);
        assert_eq!(f.small_edges, f.total_edges);
        assert!((f.edge_lengths.min - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tessellation_noise_is_ignored() {
        // 0.4 mm cells are pure noise to the realistic strategy.
        let grid = subdivided_box(Point3::origin(), Point3::new(2.0, 2.0, 2.0), 5);
        let realistic = run_detector(&grid, SmallFeatureStrategy::Realistic, 3.0);
        let Some(Findings::SmallFeatures(f)) = &realistic.findings else {
            panic!("small feature findings expected");
        };
        // Diagonals are 0.566 mm and survive the noise filter.
        assert!(f.significant_edges < f.total_edges);

        let basic = run_detector(&grid, SmallFeatureStrategy::Basic, 3.0);
        assert_eq!(basic.grade(), 2);
        let Some(Findings::SmallFeatures(b)) = &basic.findings else {
            panic!("small feature findings expected");
        };
        assert_eq!(b.below_feature_size, b.total_edges);
    }

    #[test]
    fn test_smaller_tool_clears_the_grid() {
        let grid = subdivided_box(Point3::origin(), Point3::new(10.0, 10.0, 10.0), 10);
        let result = run_detector(&grid, SmallFeatureStrategy::Realistic, 2.0);
        assert_eq!(result.grade(), 0);
    }
}
