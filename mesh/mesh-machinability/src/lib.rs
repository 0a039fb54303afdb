//! CNC machinability screening for triangle meshes.
//!
//! Given a closed, outward-oriented part mesh in millimeters, this crate
//! runs six independent heuristics and folds their findings into a 0-100
//! score with labeled problem faces:
//!
//! - **Undercuts**: faces no 3-axis tool can reach from the six axis directions
//! - **Internal volumes**: sealed voids, from the volume / convex hull ratio
//! - **Small features**: edges finer than the tool radius
//! - **Steep walls**: near-vertical faces deep inside the part
//! - **Narrow channels**: gaps narrower than the minimum channel width
//! - **Deep pockets**: recesses deeper than the depth threshold
//!
//! Results are screening heuristics, not toolpath verification.
//!
//! # Architecture
//!
//! [`MeshFacts`] derives normals, centroids, edges and volumes once per
//! mesh and lazily builds a BVH [`RayCaster`]. An [`AnalysisRun`] borrows
//! the facts and memoizes per-face [`FaceContext`]s (external, tool access,
//! deep) shared by the context-aware detectors. [`ScoreAggregator`] runs the
//! enabled detectors, contains their failures and produces an
//! [`AnalysisReport`].
//!
//! # Example
//!
//! ```
//! use mesh_machinability::{AnalysisConfig, DetectorKind, Rating, analyze};
//! use mesh_types::{Point3, axis_box};
//!
//! let block = axis_box(Point3::origin(), Point3::new(60.0, 40.0, 20.0));
//! let report = analyze(&block, &AnalysisConfig::default());
//!
//! assert_eq!(report.results.len(), DetectorKind::ALL.len());
//! assert_eq!(report.report.rating(), Rating::Excellent);
//! assert!(report.report.problem_regions.is_empty());
//! ```
//!
//! # Failure handling
//!
//! Analysis never fails as a whole. An invalid mesh, a detector error or a
//! detector panic is recorded in that detector's
//! [`DetectionResult::error`], and the detector contributes no penalty.
//! Invalid options run with their defaults and are listed in
//! [`AnalysisReport::config_warnings`].
//!
//! # Logging
//!
//! Progress and fallbacks are reported through [`tracing`]. No subscriber
//! is installed by this crate.

#![warn(missing_docs)]
// Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod aggregate;
mod config;
mod context;
mod detectors;
mod error;
mod facts;
mod raycast;
mod result;
mod run;

pub use aggregate::{
    AnalysisReport, NO_ISSUES_RECOMMENDATION, ProblemRegion, Rating, ScoreAggregator, ScoreReport,
    analyze, detect, inward_faces, penalty,
};
pub use config::{
    AnalysisConfig, AnalysisOptions, Calibration, ConfigWarning, CountPenalty,
    DEFAULT_DEEP_POCKET_THRESHOLD, DEFAULT_LARGE_MESH_FACES, DEFAULT_MIN_CHANNEL_WIDTH,
    DEFAULT_MIN_DEPTH, DEFAULT_MIN_TOOL_DIAMETER, DEFAULT_STEEP_ANGLE_THRESHOLD, PenaltyTable,
};
pub use context::{APPROACH_DIRECTIONS, FaceClassifier, FaceContext, FaceContextTable};
pub use detectors::{
    DeepPocketDetector, DeepPocketMethod, Detector, DetectorKind, InternalVolumeDetector,
    InternalVolumeStrategy, NarrowChannelDetector, NarrowChannelStrategy, SmallFeatureDetector,
    SmallFeatureStrategy, SteepWallDetector, SteepWallStrategy, UndercutDetector,
    UndercutStrategy, centroid_gaps, normal_depth, steep_normal_z,
};
pub use error::{MachinabilityError, MachinabilityResult};
pub use facts::MeshFacts;
pub use raycast::{RayCaster, RayHit};
pub use result::{
    CountTiers, DeepPocketFindings, DetectionResult, EdgeLengthStats, Findings,
    InternalVolumeFindings, NarrowChannelFindings, Severity, SmallFeatureFindings,
    SteepWallFindings, UndercutFindings,
};
pub use run::{AnalysisRun, Deadline};
