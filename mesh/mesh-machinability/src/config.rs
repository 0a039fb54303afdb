//! Analysis configuration.
//!
//! [`AnalysisConfig`] carries the user-facing options (tool diameter,
//! channel width, angle and depth cutoffs, strategy selection, enabled
//! detectors) plus two tables of tunable constants:
//!
//! - [`Calibration`]: the empirical thresholds the heuristics use
//! - [`PenaltyTable`]: how detector results turn into score deductions
//!
//! The calibration values are starting points picked on sample parts, not
//! values derived from tool or machine kinematics.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::detectors::{
    DeepPocketMethod, DetectorKind, InternalVolumeStrategy, NarrowChannelStrategy,
    SmallFeatureStrategy, SteepWallStrategy, UndercutStrategy,
};
use crate::error::{MachinabilityError, MachinabilityResult};
use crate::result::CountTiers;

/// Default smallest usable tool diameter in mm.
pub const DEFAULT_MIN_TOOL_DIAMETER: f64 = 3.0;
/// Default narrowest machinable channel in mm.
pub const DEFAULT_MIN_CHANNEL_WIDTH: f64 = 2.0;
/// Default steep-wall cutoff in degrees from horizontal.
pub const DEFAULT_STEEP_ANGLE_THRESHOLD: f64 = 80.0;
/// Default deep-pocket cutoff in mm.
pub const DEFAULT_DEEP_POCKET_THRESHOLD: f64 = 30.0;
/// Default "deep inside the part" distance in mm.
pub const DEFAULT_MIN_DEPTH: f64 = 5.0;
/// Meshes with at least this many faces run under the time budget.
pub const DEFAULT_LARGE_MESH_FACES: usize = 100_000;

/// Score deduction for a count-based detector: `min(cap, count * per_face)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CountPenalty {
    /// Maximum deduction.
    pub cap: f64,
    /// Deduction per flagged face.
    pub per_face: f64,
}

impl CountPenalty {
    /// Create a count penalty.
    #[must_use]
    pub const fn new(cap: f64, per_face: f64) -> Self {
        Self { cap, per_face }
    }

    /// Deduction for `count` flagged faces.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn apply(&self, count: usize) -> f64 {
        (count as f64 * self.per_face).min(self.cap)
    }
}

/// Score deductions per detector.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PenaltyTable {
    /// Undercut faces.
    pub undercuts: CountPenalty,
    /// Steep wall faces.
    pub steep_walls: CountPenalty,
    /// Narrow channel faces.
    pub narrow_channels: CountPenalty,
    /// Deep pocket faces.
    pub deep_pockets: CountPenalty,
    /// Internal volumes, indexed by grade 0..=2.
    pub internal_volumes: [f64; 3],
    /// Small features, indexed by grade 0..=2.
    pub small_features: [f64; 3],
}

impl Default for PenaltyTable {
    fn default() -> Self {
        Self {
            undercuts: CountPenalty::new(40.0, 0.8),
            steep_walls: CountPenalty::new(20.0, 0.4),
            narrow_channels: CountPenalty::new(30.0, 0.5),
            deep_pockets: CountPenalty::new(40.0, 1.0),
            internal_volumes: [0.0, 15.0, 35.0],
            small_features: [0.0, 5.0, 10.0],
        }
    }
}

impl PenaltyTable {
    /// Deduction for a count-based detector.
    ///
    /// Returns `None` for grade-based detectors.
    #[must_use]
    pub const fn count_penalty(&self, kind: DetectorKind) -> Option<CountPenalty> {
        match kind {
            DetectorKind::Undercuts => Some(self.undercuts),
            DetectorKind::SteepWalls => Some(self.steep_walls),
            DetectorKind::NarrowChannels => Some(self.narrow_channels),
            DetectorKind::DeepPockets => Some(self.deep_pockets),
            DetectorKind::InternalVolumes | DetectorKind::SmallFeatures => None,
        }
    }

    /// Deduction for a grade-based detector at `grade` (clamped to 2).
    ///
    /// Returns `None` for count-based detectors.
    #[must_use]
    pub fn grade_penalty(&self, kind: DetectorKind, grade: u8) -> Option<f64> {
        let table = match kind {
            DetectorKind::InternalVolumes => &self.internal_volumes,
            DetectorKind::SmallFeatures => &self.small_features,
            _ => return None,
        };
        Some(table[usize::from(grade.min(2))])
    }
}

/// Empirical constants used by the classifier and detectors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    /// Distance in mm under which a face counts as lying on the stock boundary.
    pub boundary_tolerance: f64,
    /// Distance in mm in front of a face where tool-access probes start.
    pub probe_standoff: f64,
    /// Minimum `normal.z` for a face to count as upward facing (basic undercuts).
    pub upward_normal_z: f64,
    /// Alignment below which a face points back toward the mesh center.
    pub inward_alignment: f64,
    /// Alignment above which a face points toward the mesh center (normal-method pockets).
    pub pocket_alignment: f64,
    /// Self-hit exclusion for normal rays in mm.
    pub self_hit_epsilon: f64,
    /// Boundary tolerance in mm for the realistic external-opening test.
    pub opening_tolerance: f64,
    /// Vertices on one boundary plane that indicate an external opening.
    pub opening_vertex_count: usize,
    /// Boundary tolerance in mm for the context-aware external-opening test.
    pub opening_tolerance_context: f64,
    /// Fraction of vertices on one boundary plane that indicates an external opening.
    pub opening_vertex_fraction: f64,
    /// Volume ratio under which a closed part is severely hollow.
    pub enclosed_ratio: f64,
    /// Volume ratio under which a closed part is mildly hollow (realistic).
    pub hollow_ratio: f64,
    /// Volume ratio under which a closed part is mildly hollow (context-aware).
    pub hollow_ratio_context: f64,
    /// Edges at or below this length in mm are tessellation noise.
    pub tessellation_noise: f64,
    /// Minimum feature size in mm for the basic small-feature test.
    pub min_feature_size: f64,
    /// Neighbors queried per centroid by the spatial channel test (self included).
    pub channel_neighbors: usize,
    /// Rank of the neighbor whose distance is the local gap (0 = self).
    pub channel_gap_rank: usize,
    /// Severity tiers for undercut counts.
    pub undercut_tiers: CountTiers,
    /// Severity tiers for steep wall counts.
    pub steep_wall_tiers: CountTiers,
    /// Severity tiers for narrow channel counts.
    pub channel_tiers: CountTiers,
    /// Severity tiers for deep pocket counts.
    pub pocket_tiers: CountTiers,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            boundary_tolerance: 2.0,
            probe_standoff: 50.0,
            upward_normal_z: 0.3,
            inward_alignment: -0.2,
            pocket_alignment: 0.3,
            self_hit_epsilon: 0.1,
            opening_tolerance: 0.1,
            opening_vertex_count: 3,
            opening_tolerance_context: 1.0,
            opening_vertex_fraction: 0.1,
            enclosed_ratio: 0.3,
            hollow_ratio: 0.6,
            hollow_ratio_context: 0.7,
            tessellation_noise: 0.5,
            min_feature_size: 1.0,
            channel_neighbors: 10,
            channel_gap_rank: 2,
            undercut_tiers: CountTiers::new(50, 100),
            steep_wall_tiers: CountTiers::new(21, 51),
            channel_tiers: CountTiers::new(51, 101),
            pocket_tiers: CountTiers::new(51, 101),
        }
    }
}

/// Configuration for a machinability analysis run.
///
/// # Example
///
/// ```
/// use mesh_machinability::{AnalysisConfig, DetectorKind};
///
/// let config = AnalysisConfig::default()
///     .with_min_tool_diameter(6.0)
///     .with_enabled([DetectorKind::Undercuts, DetectorKind::DeepPockets]);
///
/// assert!((config.min_tool_diameter - 6.0).abs() < f64::EPSILON);
/// assert!(config.is_enabled(DetectorKind::Undercuts));
/// assert!(!config.is_enabled(DetectorKind::SteepWalls));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalysisConfig {
    /// Smallest usable tool diameter in mm (tool access, small features).
    pub min_tool_diameter: f64,
    /// Narrowest machinable channel in mm.
    pub min_channel_width: f64,
    /// Steep wall cutoff in degrees from horizontal.
    pub steep_angle_threshold: f64,
    /// Deep pocket cutoff in mm.
    pub deep_pocket_threshold: f64,
    /// Distance in mm from the boundary beyond which a face is "deep".
    pub min_depth: f64,
    /// Prefer context-aware strategies where a detector has one.
    pub use_context_aware: bool,
    /// Detectors to run.
    pub enabled_detectors: BTreeSet<DetectorKind>,
    /// Undercut strategy override.
    pub undercut_strategy: Option<UndercutStrategy>,
    /// Internal volume strategy override.
    pub internal_volume_strategy: Option<InternalVolumeStrategy>,
    /// Small feature strategy override.
    pub small_feature_strategy: Option<SmallFeatureStrategy>,
    /// Steep wall strategy override.
    pub steep_wall_strategy: Option<SteepWallStrategy>,
    /// Narrow channel strategy override.
    pub narrow_channel_strategy: Option<NarrowChannelStrategy>,
    /// Deep pocket method.
    pub deep_pocket_method: DeepPocketMethod,
    /// Wall-clock budget for ray-casting detectors on large meshes.
    pub time_budget: Option<Duration>,
    /// Face count at which the time budget starts to apply.
    pub large_mesh_faces: usize,
    /// Heuristic thresholds.
    pub calibration: Calibration,
    /// Score deductions.
    pub penalties: PenaltyTable,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_tool_diameter: DEFAULT_MIN_TOOL_DIAMETER,
            min_channel_width: DEFAULT_MIN_CHANNEL_WIDTH,
            steep_angle_threshold: DEFAULT_STEEP_ANGLE_THRESHOLD,
            deep_pocket_threshold: DEFAULT_DEEP_POCKET_THRESHOLD,
            min_depth: DEFAULT_MIN_DEPTH,
            use_context_aware: true,
            enabled_detectors: DetectorKind::ALL.into_iter().collect(),
            undercut_strategy: None,
            internal_volume_strategy: None,
            small_feature_strategy: None,
            steep_wall_strategy: None,
            narrow_channel_strategy: None,
            deep_pocket_method: DeepPocketMethod::Ray,
            time_budget: Some(Duration::from_secs(120)),
            large_mesh_faces: DEFAULT_LARGE_MESH_FACES,
            calibration: Calibration::default(),
            penalties: PenaltyTable::default(),
        }
    }
}

impl AnalysisConfig {
    /// Set the minimum tool diameter.
    #[must_use]
    pub const fn with_min_tool_diameter(mut self, diameter: f64) -> Self {
        self.min_tool_diameter = diameter;
        self
    }

    /// Set the minimum channel width.
    #[must_use]
    pub const fn with_min_channel_width(mut self, width: f64) -> Self {
        self.min_channel_width = width;
        self
    }

    /// Set the steep wall angle threshold in degrees.
    #[must_use]
    pub const fn with_steep_angle_threshold(mut self, degrees: f64) -> Self {
        self.steep_angle_threshold = degrees;
        self
    }

    /// Set the deep pocket depth threshold.
    #[must_use]
    pub const fn with_deep_pocket_threshold(mut self, depth: f64) -> Self {
        self.deep_pocket_threshold = depth;
        self
    }

    /// Set the general "deep" classification distance.
    #[must_use]
    pub const fn with_min_depth(mut self, depth: f64) -> Self {
        self.min_depth = depth;
        self
    }

    /// Choose between context-aware and basic/realistic strategies.
    #[must_use]
    pub const fn with_context_aware(mut self, enabled: bool) -> Self {
        self.use_context_aware = enabled;
        self
    }

    /// Run only the given detectors.
    #[must_use]
    pub fn with_enabled(mut self, detectors: impl IntoIterator<Item = DetectorKind>) -> Self {
        self.enabled_detectors = detectors.into_iter().collect();
        self
    }

    /// Select the deep pocket method.
    #[must_use]
    pub const fn with_deep_pocket_method(mut self, method: DeepPocketMethod) -> Self {
        self.deep_pocket_method = method;
        self
    }

    /// Select the narrow channel strategy.
    #[must_use]
    pub const fn with_narrow_channel_strategy(mut self, strategy: NarrowChannelStrategy) -> Self {
        self.narrow_channel_strategy = Some(strategy);
        self
    }

    /// Set or clear the time budget for large meshes.
    #[must_use]
    pub const fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget;
        self
    }

    /// Check whether a detector is enabled.
    #[must_use]
    pub fn is_enabled(&self, kind: DetectorKind) -> bool {
        self.enabled_detectors.contains(&kind)
    }

    /// Effective undercut strategy.
    #[must_use]
    pub fn undercut_strategy(&self) -> UndercutStrategy {
        self.undercut_strategy.unwrap_or(if self.use_context_aware {
            UndercutStrategy::ContextAware
        } else {
            UndercutStrategy::Basic
        })
    }

    /// Effective internal volume strategy.
    #[must_use]
    pub fn internal_volume_strategy(&self) -> InternalVolumeStrategy {
        self.internal_volume_strategy
            .unwrap_or(if self.use_context_aware {
                InternalVolumeStrategy::ContextAware
            } else {
                InternalVolumeStrategy::Realistic
            })
    }

    /// Effective small feature strategy.
    #[must_use]
    pub fn small_feature_strategy(&self) -> SmallFeatureStrategy {
        self.small_feature_strategy
            .unwrap_or(SmallFeatureStrategy::Realistic)
    }

    /// Effective steep wall strategy.
    #[must_use]
    pub fn steep_wall_strategy(&self) -> SteepWallStrategy {
        self.steep_wall_strategy.unwrap_or(if self.use_context_aware {
            SteepWallStrategy::ContextAware
        } else {
            SteepWallStrategy::Realistic
        })
    }

    /// Effective narrow channel strategy.
    #[must_use]
    pub fn narrow_channel_strategy(&self) -> NarrowChannelStrategy {
        self.narrow_channel_strategy
            .unwrap_or(if self.use_context_aware {
                NarrowChannelStrategy::ContextBased
            } else {
                NarrowChannelStrategy::Spatial
            })
    }

    /// Check option values.
    ///
    /// # Errors
    ///
    /// Returns [`MachinabilityError::InvalidConfig`] naming the first invalid
    /// option.
    pub fn validate(&self) -> MachinabilityResult<()> {
        let (_, warnings) = Self::resolve(&AnalysisOptions::from(self));
        match warnings.into_iter().next() {
            Some(w) => Err(MachinabilityError::invalid_config(format!(
                "{}: {}",
                w.key, w.message
            ))),
            None => Ok(()),
        }
    }

    /// Copy of this configuration with every invalid option replaced by its
    /// default.
    ///
    /// Uses the same fallbacks as [`from_options`](Self::from_options); each
    /// replacement is logged and returned as a [`ConfigWarning`]. Options
    /// outside [`AnalysisOptions`] are kept as they are.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_machinability::AnalysisConfig;
    ///
    /// let config = AnalysisConfig::default().with_deep_pocket_threshold(-1.0);
    /// let (fixed, warnings) = config.sanitized();
    ///
    /// assert!((fixed.deep_pocket_threshold - 30.0).abs() < f64::EPSILON);
    /// assert_eq!(warnings.len(), 1);
    /// assert_eq!(warnings[0].key, "deep_pocket_threshold");
    /// ```
    #[must_use]
    pub fn sanitized(&self) -> (Self, Vec<ConfigWarning>) {
        let (resolved, warnings) = Self::resolve(&AnalysisOptions::from(self));
        log_warnings(&warnings);
        let config = Self {
            min_tool_diameter: resolved.min_tool_diameter,
            min_channel_width: resolved.min_channel_width,
            steep_angle_threshold: resolved.steep_angle_threshold,
            deep_pocket_threshold: resolved.deep_pocket_threshold,
            min_depth: resolved.min_depth,
            use_context_aware: resolved.use_context_aware,
            enabled_detectors: resolved.enabled_detectors,
            ..self.clone()
        };
        (config, warnings)
    }

    /// Build a configuration from partially specified options.
    ///
    /// Absent or invalid options are filled from the documented defaults.
    /// Each substitution is logged and returned as a [`ConfigWarning`];
    /// this never fails.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_machinability::{AnalysisConfig, AnalysisOptions};
    ///
    /// let options = AnalysisOptions {
    ///     min_tool_diameter: Some(6.0),
    ///     min_depth: Some(-1.0),
    ///     ..AnalysisOptions::default()
    /// };
    /// let (config, warnings) = AnalysisConfig::from_options(&options);
    ///
    /// assert!((config.min_tool_diameter - 6.0).abs() < f64::EPSILON);
    /// assert!((config.min_depth - 5.0).abs() < f64::EPSILON);
    /// assert!(warnings.iter().any(|w| w.key == "min_depth"));
    /// ```
    #[must_use]
    pub fn from_options(options: &AnalysisOptions) -> (Self, Vec<ConfigWarning>) {
        let (config, warnings) = Self::resolve(options);
        log_warnings(&warnings);
        (config, warnings)
    }

    fn resolve(options: &AnalysisOptions) -> (Self, Vec<ConfigWarning>) {
        let defaults = Self::default();
        let mut warnings = Vec::new();

        let mut length = |key: &'static str, value: Option<f64>, default: f64| match value {
            Some(v) if v.is_finite() && v > 0.0 => v,
            Some(v) => {
                warnings.push(ConfigWarning::new(
                    key,
                    format!("invalid value {v}, using default {default}"),
                ));
                default
            }
            None => {
                warnings.push(ConfigWarning::new(
                    key,
                    format!("not set, using default {default}"),
                ));
                default
            }
        };

        let min_tool_diameter = length(
            "min_tool_diameter",
            options.min_tool_diameter,
            defaults.min_tool_diameter,
        );
        let min_channel_width = length(
            "min_channel_width",
            options.min_channel_width,
            defaults.min_channel_width,
        );
        let deep_pocket_threshold = length(
            "deep_pocket_threshold",
            options.deep_pocket_threshold,
            defaults.deep_pocket_threshold,
        );
        let min_depth = length("min_depth", options.min_depth, defaults.min_depth);

        let steep_angle_threshold = match options.steep_angle_threshold {
            Some(v) if v > 0.0 && v <= 90.0 => v,
            other => {
                warnings.push(ConfigWarning::new(
                    "steep_angle_threshold",
                    other.map_or_else(
                        || format!("not set, using default {}", defaults.steep_angle_threshold),
                        |v| {
                            format!(
                                "invalid value {v}, using default {}",
                                defaults.steep_angle_threshold
                            )
                        },
                    ),
                ));
                defaults.steep_angle_threshold
            }
        };

        let use_context_aware = options.use_context_aware.unwrap_or_else(|| {
            warnings.push(ConfigWarning::new(
                "use_context_aware",
                "not set, using default true",
            ));
            defaults.use_context_aware
        });

        let enabled_detectors = match &options.enabled_detectors {
            Some(set) if !set.is_empty() => set.clone(),
            Some(_) => {
                warnings.push(ConfigWarning::new(
                    "enabled_detectors",
                    "empty set, enabling all detectors",
                ));
                defaults.enabled_detectors.clone()
            }
            None => {
                warnings.push(ConfigWarning::new(
                    "enabled_detectors",
                    "not set, enabling all detectors",
                ));
                defaults.enabled_detectors.clone()
            }
        };

        let config = Self {
            min_tool_diameter,
            min_channel_width,
            steep_angle_threshold,
            deep_pocket_threshold,
            min_depth,
            use_context_aware,
            enabled_detectors,
            ..defaults
        };
        (config, warnings)
    }
}

fn log_warnings(warnings: &[ConfigWarning]) {
    for w in warnings {
        warn!(key = %w.key, "{}", w.message);
    }
}

/// Partially specified options, as they arrive from a UI or config file.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalysisOptions {
    /// Smallest usable tool diameter in mm.
    pub min_tool_diameter: Option<f64>,
    /// Narrowest machinable channel in mm.
    pub min_channel_width: Option<f64>,
    /// Steep wall cutoff in degrees.
    pub steep_angle_threshold: Option<f64>,
    /// Deep pocket cutoff in mm.
    pub deep_pocket_threshold: Option<f64>,
    /// General "deep" distance in mm.
    pub min_depth: Option<f64>,
    /// Context-aware strategy selection.
    pub use_context_aware: Option<bool>,
    /// Detectors to run.
    pub enabled_detectors: Option<BTreeSet<DetectorKind>>,
}

impl From<&AnalysisConfig> for AnalysisOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            min_tool_diameter: Some(config.min_tool_diameter),
            min_channel_width: Some(config.min_channel_width),
            steep_angle_threshold: Some(config.steep_angle_threshold),
            deep_pocket_threshold: Some(config.deep_pocket_threshold),
            min_depth: Some(config.min_depth),
            use_context_aware: Some(config.use_context_aware),
            enabled_detectors: Some(config.enabled_detectors.clone()),
        }
    }
}

/// An option that was filled from its default.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConfigWarning {
    /// Option name.
    pub key: String,
    /// What was substituted and why.
    pub message: String,
}

impl ConfigWarning {
    fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
