//! Detector results and findings.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::detectors::{
    DeepPocketMethod, DetectorKind, InternalVolumeStrategy, NarrowChannelStrategy,
    SmallFeatureStrategy, SteepWallStrategy, UndercutStrategy,
};
use crate::error::MachinabilityError;

/// How serious a detected problem is.
///
/// Ordered: `None < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Severity {
    /// No problem.
    #[default]
    None,
    /// Minor problem.
    Low,
    /// Noticeable problem.
    Medium,
    /// Serious problem.
    High,
}

impl Severity {
    /// Severity for a three-level grade (0, 1, 2).
    #[must_use]
    pub const fn from_grade(grade: u8) -> Self {
        match grade {
            0 => Self::None,
            1 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count thresholds mapping a number of flagged faces to a severity.
///
/// Zero is always [`Severity::None`]; counts below `medium_from` are
/// [`Severity::Low`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CountTiers {
    /// Smallest count rated [`Severity::Medium`].
    pub medium_from: usize,
    /// Smallest count rated [`Severity::High`].
    pub high_from: usize,
}

impl CountTiers {
    /// Create count tiers.
    #[must_use]
    pub const fn new(medium_from: usize, high_from: usize) -> Self {
        Self {
            medium_from,
            high_from,
        }
    }

    /// Severity for `count` flagged faces.
    #[must_use]
    pub const fn severity(&self, count: usize) -> Severity {
        if count == 0 {
            Severity::None
        } else if count >= self.high_from {
            Severity::High
        } else if count >= self.medium_from {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Undercut detector output.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UndercutFindings {
    /// Strategy that produced the result.
    pub strategy: UndercutStrategy,
    /// Flagged faces, sorted and unique.
    pub faces: Vec<u32>,
    /// Flagged share of all faces, in percent.
    pub percentage: f64,
}

/// Internal volume detector output.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InternalVolumeFindings {
    /// Strategy that produced the result.
    pub strategy: InternalVolumeStrategy,
    /// 0 = solid, 1 = mildly hollow, 2 = enclosed voids.
    pub grade: u8,
    /// Whether the mesh was closed; the volume test needs it.
    pub is_watertight: bool,
    /// Enclosed mesh volume in mm³.
    pub actual_volume: f64,
    /// Convex hull volume in mm³.
    pub convex_volume: f64,
    /// `actual_volume / convex_volume`.
    pub volume_ratio: f64,
    /// Whether the part appears open to the stock boundary.
    pub has_external_openings: bool,
}

/// Small feature detector output.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmallFeatureFindings {
    /// Strategy that produced the result.
    pub strategy: SmallFeatureStrategy,
    /// 0 = none, 1 = some, 2 = many.
    pub grade: u8,
    /// Unique edges in the mesh.
    pub total_edges: usize,
    /// Edges considered after discarding tessellation noise.
    pub significant_edges: usize,
    /// Edges shorter than the tool radius.
    pub small_edges: usize,
    /// `small_edges` as a percentage of `significant_edges`.
    pub small_percentage: f64,
    /// Edges shorter than the minimum feature size (basic strategy only).
    pub below_feature_size: usize,
    /// Shortest, mean and longest edge length in mm.
    pub edge_lengths: EdgeLengthStats,
    /// Faces incident to a qualifying edge, sorted and unique.
    pub faces: Vec<u32>,
}

/// Summary of edge lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeLengthStats {
    /// Shortest edge in mm.
    pub min: f64,
    /// Mean edge length in mm.
    pub mean: f64,
    /// Longest edge in mm.
    pub max: f64,
}

/// Steep wall detector output.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SteepWallFindings {
    /// Strategy that produced the result.
    pub strategy: SteepWallStrategy,
    /// Flagged faces, sorted and unique.
    pub faces: Vec<u32>,
    /// Angle threshold in degrees.
    pub angle_threshold: f64,
    /// Faces steeper than the threshold, before any depth filter.
    pub total_steep: usize,
    /// Steep faces that count as deep for the strategy in use.
    pub deep_steep: usize,
    /// Steep faces that lie on an X/Y stock boundary.
    pub external_steep: usize,
}

/// Narrow channel detector output.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NarrowChannelFindings {
    /// Strategy that produced the result.
    pub strategy: NarrowChannelStrategy,
    /// Flagged faces, sorted and unique.
    pub faces: Vec<u32>,
    /// Width threshold in mm.
    pub min_channel_width: f64,
}

/// Deep pocket detector output.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeepPocketFindings {
    /// Method that produced the result.
    pub method: DeepPocketMethod,
    /// Flagged faces, sorted and unique.
    pub faces: Vec<u32>,
    /// Depth threshold in mm.
    pub depth_threshold: f64,
    /// Largest measured depth among flagged faces (ray method), in mm.
    pub max_depth: f64,
}

/// Detector-specific output.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "detector", rename_all = "snake_case"))]
pub enum Findings {
    /// Undercuts.
    Undercuts(UndercutFindings),
    /// Internal volumes.
    InternalVolumes(InternalVolumeFindings),
    /// Small features.
    SmallFeatures(SmallFeatureFindings),
    /// Steep walls.
    SteepWalls(SteepWallFindings),
    /// Narrow channels.
    NarrowChannels(NarrowChannelFindings),
    /// Deep pockets.
    DeepPockets(DeepPocketFindings),
}

impl Findings {
    /// Detector these findings belong to.
    #[must_use]
    pub const fn kind(&self) -> DetectorKind {
        match self {
            Self::Undercuts(_) => DetectorKind::Undercuts,
            Self::InternalVolumes(_) => DetectorKind::InternalVolumes,
            Self::SmallFeatures(_) => DetectorKind::SmallFeatures,
            Self::SteepWalls(_) => DetectorKind::SteepWalls,
            Self::NarrowChannels(_) => DetectorKind::NarrowChannels,
            Self::DeepPockets(_) => DetectorKind::DeepPockets,
        }
    }

    /// Flagged faces. Empty for internal volumes, which are not face-based.
    #[must_use]
    pub fn faces(&self) -> &[u32] {
        match self {
            Self::Undercuts(f) => &f.faces,
            Self::SmallFeatures(f) => &f.faces,
            Self::SteepWalls(f) => &f.faces,
            Self::NarrowChannels(f) => &f.faces,
            Self::DeepPockets(f) => &f.faces,
            Self::InternalVolumes(_) => &[],
        }
    }

    /// Grade for grade-based detectors.
    #[must_use]
    pub const fn grade(&self) -> Option<u8> {
        match self {
            Self::InternalVolumes(f) => Some(f.grade),
            Self::SmallFeatures(f) => Some(f.grade),
            _ => None,
        }
    }
}

/// Outcome of one detector on one mesh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionResult {
    /// Detector that produced this result.
    pub detector: DetectorKind,
    /// Problem severity; [`Severity::None`] on failure.
    pub severity: Severity,
    /// Whether the detector found something to fix.
    pub has_problem: bool,
    /// Human-readable advice.
    pub recommendation: String,
    /// Failure or inconclusive-result description.
    pub error: Option<String>,
    /// Detector-specific data; `None` when the detector failed.
    pub findings: Option<Findings>,
}

impl DetectionResult {
    /// Build a successful result from findings.
    #[must_use]
    pub fn completed(findings: Findings, severity: Severity, recommendation: impl Into<String>) -> Self {
        Self {
            detector: findings.kind(),
            severity,
            has_problem: severity > Severity::None,
            recommendation: recommendation.into(),
            error: None,
            findings: Some(findings),
        }
    }

    /// Build an inconclusive result: the detector ran but could not decide.
    ///
    /// Severity is [`Severity::None`] and no findings are attached.
    #[must_use]
    pub fn inconclusive(
        detector: DetectorKind,
        error: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            detector,
            severity: Severity::None,
            has_problem: false,
            recommendation: recommendation.into(),
            error: Some(error.into()),
            findings: None,
        }
    }

    /// Build a failed result from an error.
    #[must_use]
    pub fn failed(detector: DetectorKind, error: &MachinabilityError) -> Self {
        Self::inconclusive(
            detector,
            error.to_string(),
            format!("{} check could not be completed", detector.label()),
        )
    }

    /// Whether the detector failed or was inconclusive.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Flagged faces; empty when none or when the detector failed.
    #[must_use]
    pub fn faces(&self) -> &[u32] {
        self.findings.as_ref().map_or(&[][..], Findings::faces)
    }

    /// Number of flagged faces.
    #[must_use]
    pub fn count(&self) -> usize {
        self.faces().len()
    }

    /// Grade for grade-based detectors; 0 when failed or not applicable.
    #[must_use]
    pub fn grade(&self) -> u8 {
        self.findings
            .as_ref()
            .and_then(Findings::grade)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::None < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(Severity::default(), Severity::None);
    }

    #[test]
    fn test_severity_from_grade() {
        assert_eq!(Severity::from_grade(0), Severity::None);
        assert_eq!(Severity::from_grade(1), Severity::Medium);
        assert_eq!(Severity::from_grade(2), Severity::High);
    }

    #[test]
    fn test_count_tiers_boundaries() {
        let tiers = CountTiers::new(50, 100);
        assert_eq!(tiers.severity(0), Severity::None);
        assert_eq!(tiers.severity(1), Severity::Low);
        assert_eq!(tiers.severity(49), Severity::Low);
        assert_eq!(tiers.severity(50), Severity::Medium);
        assert_eq!(tiers.severity(99), Severity::Medium);
        assert_eq!(tiers.severity(100), Severity::High);
    }

    #[test]
    fn test_completed_result() {
        let findings = Findings::SteepWalls(SteepWallFindings {
            strategy: SteepWallStrategy::Basic,
            faces: vec![1, 4, 7],
            angle_threshold: 80.0,
            total_steep: 3,
            deep_steep: 3,
            external_steep: 0,
        });
        let result = DetectionResult::completed(findings, Severity::Low, "fix");
        assert_eq!(result.detector, DetectorKind::SteepWalls);
        assert!(result.has_problem);
        assert_eq!(result.count(), 3);
        assert_eq!(result.grade(), 0);
        assert!(!result.is_failed());
    }

    #[test]
    fn test_failed_result() {
        let err = MachinabilityError::ray_cast("nan origin");
        let result = DetectionResult::failed(DetectorKind::DeepPockets, &err);
        assert!(result.is_failed());
        assert!(!result.has_problem);
        assert_eq!(result.severity, Severity::None);
        assert_eq!(result.count(), 0);
        assert!(result.error.as_deref().is_some_and(|e| e.contains("nan origin")));
    }
}
