//! Deep pocket detection.

use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Detector, DetectorKind, flag_faces};
use crate::error::MachinabilityResult;
use crate::facts::MeshFacts;
use crate::result::{DeepPocketFindings, DetectionResult, Findings};
use crate::run::AnalysisRun;

/// How pocket depth is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeepPocketMethod {
    /// Distance to the first face hit along the face normal.
    #[default]
    Ray,
    /// Faces whose normal points back toward the vertex mean.
    Normal,
}

/// Finds recesses deeper than the depth threshold.
#[derive(Debug, Clone, Copy)]
pub struct DeepPocketDetector {
    method: DeepPocketMethod,
}

impl DeepPocketDetector {
    /// Create a detector using `method`.
    #[must_use]
    pub const fn new(method: DeepPocketMethod) -> Self {
        Self { method }
    }
}

/// Distance from a face centroid to the first other face along its normal.
///
/// Zero when nothing is hit, the face is degenerate, or the ray cannot be
/// evaluated.
#[must_use]
pub fn normal_depth(facts: &MeshFacts, face: usize, self_hit_epsilon: f64) -> f64 {
    let Some(caster) = facts.ray_caster() else {
        return 0.0;
    };
    let normal = facts.normals()[face];
    if normal.norm_squared() == 0.0 {
        return 0.0;
    }
    let centroid = &facts.centroids()[face];
    match caster.closest_hit(facts.triangles(), centroid, &normal, self_hit_epsilon) {
        Ok(hit) => hit.map_or(0.0, |h| h.distance),
        Err(err) => {
            debug!(face, error = %err, "Depth ray failed, assuming open");
            0.0
        }
    }
}

impl Detector for DeepPocketDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::DeepPockets
    }

    fn detect(&self, run: &AnalysisRun<'_>) -> MachinabilityResult<DetectionResult> {
        let facts = run.facts();
        let config = run.config();
        let cal = &config.calibration;
        let threshold = config.deep_pocket_threshold;

        let (faces, max_depth) = match self.method {
            DeepPocketMethod::Ray => {
                let depths: Vec<f64> = (0..facts.face_count())
                    .into_par_iter()
                    .map(|face| {
                        run.check_deadline(self.kind())?;
                        Ok(normal_depth(facts, face, cal.self_hit_epsilon))
                    })
                    .collect::<MachinabilityResult<_>>()?;

                #[allow(clippy::cast_possible_truncation)]
                let faces: Vec<u32> = depths
                    .iter()
                    .enumerate()
                    .filter(|&(_, &d)| d > threshold)
                    .map(|(face, _)| face as u32)
                    .collect();
                let max_depth = faces
                    .iter()
                    .map(|&f| depths[f as usize])
                    .fold(0.0, f64::max);
                (faces, max_depth)
            }
            DeepPocketMethod::Normal => {
                let center = facts.vertex_mean();
                let faces = flag_faces(run, self.kind(), |face| {
                    let to_face = facts.centroids()[face] - center;
                    let to_face = to_face / (to_face.norm() + 1e-8);
                    facts.normals()[face].dot(&-to_face) > cal.pocket_alignment
                })?;
                (faces, 0.0)
            }
        };

        let count = faces.len();
        let severity = cal.pocket_tiers.severity(count);
        info!(
            method = ?self.method,
            threshold,
            count,
            max_depth,
            severity = %severity,
            "Deep pocket check complete"
        );

        let recommendation = if count == 0 {
            "No deep pockets detected".to_string()
        } else {
            format!(
                "Deep pocket detected ({max_depth:.1}mm). Consider reducing depth \
                 or using longer tools."
            )
        };

        Ok(DetectionResult::completed(
            Findings::DeepPockets(DeepPocketFindings {
                method: self.method,
                faces,
                depth_threshold: threshold,
                max_depth,
            }),
            severity,
            recommendation,
        ))
    }
}
