//! Per-face manufacturing context.
//!
//! Each face gets three verdicts: whether it lies on the stock boundary,
//! whether a tool can reach it along one of the six axis directions, and
//! whether it sits deep inside the part. Several detectors combine these,
//! so the verdicts are computed at most once per face and memoized.

use std::sync::OnceLock;

use mesh_types::Vector3;
use rayon::prelude::*;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::facts::MeshFacts;

/// The six axis-aligned approach directions, in probe order.
pub const APPROACH_DIRECTIONS: [[f64; 3]; 6] = [
    [1.0, 0.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, -1.0],
];

/// Manufacturing context of one face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FaceContext {
    /// Face lies on the bounding box of the part.
    pub is_external: bool,
    /// A tool can approach the face along at least one axis direction.
    pub has_tool_access: bool,
    /// Face is farther than `min_depth` from the boundary on every axis.
    pub is_deep_pocket: bool,
    /// Face area in mm².
    pub face_area: f64,
}

/// Classifies faces against the stock boundary and the tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceClassifier {
    /// Boundary distance in mm under which a face is external.
    pub boundary_tolerance: f64,
    /// Tool diameter in mm; the access test allows half of it as slack.
    pub tool_diameter: f64,
    /// Distance in mm beyond which a face is deep.
    pub min_depth: f64,
    /// Distance in mm in front of the face where probes start.
    pub probe_standoff: f64,
}

impl FaceClassifier {
    /// Classifier using the configured tool and calibration.
    #[must_use]
    pub const fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            boundary_tolerance: config.calibration.boundary_tolerance,
            tool_diameter: config.min_tool_diameter,
            min_depth: config.min_depth,
            probe_standoff: config.calibration.probe_standoff,
        }
    }

    /// Whether the face centroid is within tolerance of any boundary plane.
    #[must_use]
    pub fn is_external(&self, facts: &MeshFacts, face: usize) -> bool {
        facts
            .bounds()
            .nearest_plane_distance(&facts.centroids()[face])
            < self.boundary_tolerance
    }

    /// Whether a tool approaching along some axis direction reaches the face.
    ///
    /// For each direction `d`, a probe starts `probe_standoff` before the
    /// centroid and travels along `d`. The direction is clear when nothing
    /// is hit, or when the first hit is within half a tool diameter of the
    /// centroid. A probe that cannot be evaluated counts as clear.
    #[must_use]
    pub fn has_tool_access(&self, facts: &MeshFacts, face: usize) -> bool {
        let Some(caster) = facts.ray_caster() else {
            return true;
        };
        let centroid = facts.centroids()[face];
        let slack = self.tool_diameter / 2.0;

        APPROACH_DIRECTIONS.iter().any(|&[x, y, z]| {
            let direction = Vector3::new(x, y, z);
            let origin = centroid - direction * self.probe_standoff;
            match caster.closest_hit(facts.triangles(), &origin, &direction, 0.0) {
                Ok(None) => true,
                Ok(Some(hit)) => (hit.distance - self.probe_standoff).abs() < slack,
                Err(err) => {
                    debug!(face, error = %err, "Access probe failed, assuming clear");
                    true
                }
            }
        })
    }

    /// Whether the centroid is more than `min_depth` from the nearer
    /// boundary plane on every axis.
    #[must_use]
    pub fn is_deep_pocket(&self, facts: &MeshFacts, face: usize) -> bool {
        let depths = facts.bounds().axis_depths(&facts.centroids()[face]);
        depths.into_iter().fold(f64::INFINITY, f64::min) > self.min_depth
    }

    /// All three verdicts for a face, plus its area.
    #[must_use]
    pub fn classify(&self, facts: &MeshFacts, face: usize) -> FaceContext {
        FaceContext {
            is_external: self.is_external(facts, face),
            has_tool_access: self.has_tool_access(facts, face),
            is_deep_pocket: self.is_deep_pocket(facts, face),
            face_area: facts.areas()[face],
        }
    }
}

/// Memoized [`FaceContext`] for every face of one mesh.
///
/// Safe to query from many threads; each face is classified at most once.
#[derive(Debug)]
pub struct FaceContextTable<'a> {
    facts: &'a MeshFacts,
    classifier: FaceClassifier,
    slots: Vec<OnceLock<FaceContext>>,
}

impl<'a> FaceContextTable<'a> {
    /// Empty table for the faces of `facts`.
    #[must_use]
    pub fn new(facts: &'a MeshFacts, classifier: FaceClassifier) -> Self {
        Self {
            facts,
            classifier,
            slots: (0..facts.face_count()).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Classifier in use.
    #[must_use]
    pub const fn classifier(&self) -> &FaceClassifier {
        &self.classifier
    }

    /// Context of a face, classifying it on first request.
    ///
    /// # Panics
    ///
    /// Panics if `face` is not a face index of the mesh.
    #[must_use]
    pub fn get(&self, face: usize) -> FaceContext {
        *self.slots[face].get_or_init(|| self.classifier.classify(self.facts, face))
    }

    /// Classify every face in parallel.
    pub fn populate(&self) {
        (0..self.slots.len()).into_par_iter().for_each(|face| {
            let _ = self.get(face);
        });
    }

    /// Number of faces classified so far.
    #[must_use]
    pub fn computed(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}
