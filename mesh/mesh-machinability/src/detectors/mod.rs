//! The six manufacturability detectors.
//!
//! Each detector implements [`Detector`] and reads everything it needs from
//! an [`AnalysisRun`]. Detectors never mutate shared state except through
//! the run's memoized face contexts.

mod deep_pocket;
mod internal_volume;
mod narrow_channel;
mod small_feature;
mod steep_wall;
mod undercut;

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use deep_pocket::{DeepPocketDetector, DeepPocketMethod, normal_depth};
pub use internal_volume::{InternalVolumeDetector, InternalVolumeStrategy};
pub use narrow_channel::{NarrowChannelDetector, NarrowChannelStrategy, centroid_gaps};
pub use small_feature::{SmallFeatureDetector, SmallFeatureStrategy};
pub use steep_wall::{SteepWallDetector, SteepWallStrategy, steep_normal_z};
pub use undercut::{UndercutDetector, UndercutStrategy};

use crate::config::AnalysisConfig;
use crate::error::{MachinabilityError, MachinabilityResult};
use crate::result::DetectionResult;
use crate::run::AnalysisRun;

/// Identifies a detector.
///
/// Ordering follows [`DetectorKind::ALL`], which is also the order results
/// are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DetectorKind {
    /// Faces no axis-aligned tool can reach.
    Undercuts,
    /// Enclosed voids.
    InternalVolumes,
    /// Features too small for the tool.
    SmallFeatures,
    /// Near-vertical walls.
    SteepWalls,
    /// Gaps narrower than the minimum channel width.
    NarrowChannels,
    /// Recesses deeper than the depth threshold.
    DeepPockets,
}

impl DetectorKind {
    /// Every detector, in reporting order.
    pub const ALL: [Self; 6] = [
        Self::Undercuts,
        Self::InternalVolumes,
        Self::SmallFeatures,
        Self::SteepWalls,
        Self::NarrowChannels,
        Self::DeepPockets,
    ];

    /// Machine name, e.g. `"deep_pockets"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undercuts => "undercuts",
            Self::InternalVolumes => "internal_volumes",
            Self::SmallFeatures => "small_features",
            Self::SteepWalls => "steep_walls",
            Self::NarrowChannels => "narrow_channels",
            Self::DeepPockets => "deep_pockets",
        }
    }

    /// Display label, e.g. `"Deep Pockets"`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Undercuts => "Undercuts",
            Self::InternalVolumes => "Internal Volumes",
            Self::SmallFeatures => "Small Features",
            Self::SteepWalls => "Steep Walls",
            Self::NarrowChannels => "Narrow Channels",
            Self::DeepPockets => "Deep Pockets",
        }
    }

    /// Whether the score penalty scales with the number of flagged faces.
    #[must_use]
    pub const fn is_count_based(self) -> bool {
        !matches!(self, Self::InternalVolumes | Self::SmallFeatures)
    }

    /// Built-in detector for this kind, configured from `config`.
    #[must_use]
    pub fn builtin(self, config: &AnalysisConfig) -> Box<dyn Detector> {
        match self {
            Self::Undercuts => Box::new(UndercutDetector::new(config.undercut_strategy())),
            Self::InternalVolumes => {
                Box::new(InternalVolumeDetector::new(config.internal_volume_strategy()))
            }
            Self::SmallFeatures => {
                Box::new(SmallFeatureDetector::new(config.small_feature_strategy()))
            }
            Self::SteepWalls => Box::new(SteepWallDetector::new(config.steep_wall_strategy())),
            Self::NarrowChannels => {
                Box::new(NarrowChannelDetector::new(config.narrow_channel_strategy()))
            }
            Self::DeepPockets => Box::new(DeepPocketDetector::new(config.deep_pocket_method)),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorKind {
    type Err = MachinabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| MachinabilityError::invalid_config(format!("unknown detector '{s}'")))
    }
}

/// A manufacturability check.
///
/// Implementations must be deterministic for a given run and must not
/// modify the mesh. Returning `Err` (or panicking) marks this detector as
/// failed; the rest of the analysis continues.
pub trait Detector: Send + Sync {
    /// Which detector this is.
    fn kind(&self) -> DetectorKind;

    /// Inspect the mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be completed, including when
    /// the run's time budget is exhausted.
    fn detect(&self, run: &AnalysisRun<'_>) -> MachinabilityResult<DetectionResult>;
}

/// Faces for which `flag` holds, evaluated in parallel with deadline checks.
///
/// The result is sorted ascending.
pub(crate) fn flag_faces<F>(
    run: &AnalysisRun<'_>,
    kind: DetectorKind,
    flag: F,
) -> MachinabilityResult<Vec<u32>>
where
    F: Fn(usize) -> bool + Sync,
{
    let flags: Vec<bool> = (0..run.facts().face_count())
        .into_par_iter()
        .map(|face| {
            run.check_deadline(kind)?;
            Ok(flag(face))
        })
        .collect::<MachinabilityResult<_>>()?;

    #[allow(clippy::cast_possible_truncation)]
    let faces = flags
        .into_iter()
        .enumerate()
        .filter_map(|(face, hit)| hit.then_some(face as u32))
        .collect();
    Ok(faces)
}

/// Flagged faces as a percentage of all faces.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use mesh_types::{IndexedMesh, Point3, Vertex, axis_box};

    use crate::facts::MeshFacts;

    pub fn facts(mesh: &IndexedMesh) -> MeshFacts {
        match MeshFacts::from_mesh(mesh) {
            Ok(f) => f,
            Err(err) => panic!("fixture should be valid: {err}"),
        }
    }

    pub fn cube(size: f64) -> IndexedMesh {
        axis_box(Point3::origin(), Point3::new(size, size, size))
    }

    /// Block with a sealed box-shaped cavity.
    pub fn block_with_cavity(outer: f64, cavity_min: f64, cavity_max: f64) -> IndexedMesh {
        let mut block = cube(outer);
        let mut cavity = axis_box(
            Point3::new(cavity_min, cavity_min, cavity_min),
            Point3::new(cavity_max, cavity_max, cavity_max),
        );
        cavity.flip_normals();
        block.merge(&cavity);
        block
    }

    /// Two upward-facing triangles with the same footprint, at z = 10 and z = 0.
    pub fn stacked_upward_triangles() -> IndexedMesh {
        IndexedMesh::from_parts(
            vec![
                Vertex::from_coords(0.0, 0.0, 10.0),
                Vertex::from_coords(10.0, 0.0, 10.0),
                Vertex::from_coords(0.0, 10.0, 10.0),
                Vertex::from_coords(0.0, 0.0, 0.0),
                Vertex::from_coords(10.0, 0.0, 0.0),
                Vertex::from_coords(0.0, 10.0, 0.0),
            ],
            vec![[0, 1, 2], [3, 4, 5]],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in DetectorKind::ALL {
            assert_eq!(kind.as_str().parse::<DetectorKind>().ok(), Some(kind));
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert!("warp_drive".parse::<DetectorKind>().is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(DetectorKind::Undercuts.label(), "Undercuts");
        assert_eq!(DetectorKind::InternalVolumes.label(), "Internal Volumes");
        assert_eq!(DetectorKind::DeepPockets.label(), "Deep Pockets");
    }

    #[test]
    fn test_order_matches_all() {
        let mut sorted = DetectorKind::ALL;
        sorted.sort();
        assert_eq!(sorted, DetectorKind::ALL);
    }

    #[test]
    fn test_count_based_split() {
        let grade_based: Vec<_> = DetectorKind::ALL
            .into_iter()
            .filter(|k| !k.is_count_based())
            .collect();
        assert_eq!(
            grade_based,
            vec![DetectorKind::InternalVolumes, DetectorKind::SmallFeatures]
        );
    }

    #[test]
    fn test_builtin_kinds_match() {
        let config = AnalysisConfig::default();
        for kind in DetectorKind::ALL {
            assert_eq!(kind.builtin(&config).kind(), kind);
        }
    }

    #[test]
    fn test_percentage() {
        assert!((percentage(1, 4) - 25.0).abs() < 1e-12);
        assert!(percentage(3, 0).abs() < f64::EPSILON);
    }
}
