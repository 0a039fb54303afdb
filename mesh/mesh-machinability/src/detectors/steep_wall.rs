//! Steep wall detection.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Detector, DetectorKind, flag_faces};
use crate::error::MachinabilityResult;
use crate::result::{DetectionResult, Findings, SteepWallFindings};
use crate::run::AnalysisRun;

/// Which steep faces are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SteepWallStrategy {
    /// Every steep face.
    Basic,
    /// Steep faces below the top by more than `min_depth` and away from the
    /// vertical stock planes.
    Realistic,
    /// Steep faces that are deep and have no tool access.
    ContextAware,
}

/// Finds near-vertical walls that need long-reach tooling.
#[derive(Debug, Clone, Copy)]
pub struct SteepWallDetector {
    strategy: SteepWallStrategy,
}

impl SteepWallDetector {
    /// Create a detector using `strategy`.
    #[must_use]
    pub const fn new(strategy: SteepWallStrategy) -> Self {
        Self { strategy }
    }
}

/// Largest `|normal.z|` of a face steeper than `angle_threshold` degrees
/// from horizontal.
#[must_use]
pub fn steep_normal_z(angle_threshold: f64) -> f64 {
    (90.0 - angle_threshold).to_radians().sin()
}

impl Detector for SteepWallDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::SteepWalls
    }

    fn detect(&self, run: &AnalysisRun<'_>) -> MachinabilityResult<DetectionResult> {
        let facts = run.facts();
        let config = run.config();
        let bounds = facts.bounds();
        let tolerance = config.calibration.boundary_tolerance;
        let z_limit = steep_normal_z(config.steep_angle_threshold);

        let is_steep = |face: usize| {
            let n = facts.normals()[face];
            n.norm_squared() > 0.0 && n.z.abs() < z_limit
        };
        let below_top = |face: usize| bounds.max.z - facts.centroids()[face].z > config.min_depth;
        let on_side_plane = |face: usize| {
            let c = &facts.centroids()[face];
            bounds.near_axis_plane(c, 0, tolerance) || bounds.near_axis_plane(c, 1, tolerance)
        };

        let steep: Vec<usize> = (0..facts.face_count()).filter(|&f| is_steep(f)).collect();
        let external_steep = steep.iter().filter(|&&f| on_side_plane(f)).count();

        let (faces, deep_steep) = match self.strategy {
            SteepWallStrategy::Basic => {
                let faces = flag_faces(run, self.kind(), is_steep)?;
                let deep = steep.iter().filter(|&&f| below_top(f)).count();
                (faces, deep)
            }
            SteepWallStrategy::Realistic => {
                let faces = flag_faces(run, self.kind(), |f| {
                    is_steep(f) && below_top(f) && !on_side_plane(f)
                })?;
                let deep = steep.iter().filter(|&&f| below_top(f)).count();
                (faces, deep)
            }
            SteepWallStrategy::ContextAware => {
                let faces = flag_faces(run, self.kind(), |f| {
                    if !is_steep(f) {
                        return false;
                    }
                    let ctx = run.context(f);
                    ctx.is_deep_pocket && !ctx.has_tool_access
                })?;
                let deep = steep
                    .iter()
                    .filter(|&&f| run.context(f).is_deep_pocket)
                    .count();
                (faces, deep)
            }
        };

        let count = faces.len();
        let severity = config.calibration.steep_wall_tiers.severity(count);
        info!(
            strategy = ?self.strategy,
            total_steep = steep.len(),
            flagged = count,
            severity = %severity,
            "Steep wall check complete"
        );

        let recommendation = if count == 0 {
            "No problematic steep walls".to_string()
        } else {
            format!(
                "{count} steep wall faces. Add draft or plan for long-reach tools \
                 with small step-downs."
            )
        };

        Ok(DetectionResult::completed(
            Findings::SteepWalls(SteepWallFindings {
                strategy: self.strategy,
                faces,
                angle_threshold: config.steep_angle_threshold,
                total_steep: steep.len(),
                deep_steep,
                external_steep,
            }),
            severity,
            recommendation,
        ))
    }
}
