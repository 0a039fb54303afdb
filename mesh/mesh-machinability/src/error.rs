//! Error types for machinability analysis.

use thiserror::Error;

use crate::detectors::DetectorKind;

/// Result type alias for machinability operations.
pub type MachinabilityResult<T> = Result<T, MachinabilityError>;

/// Errors that can occur during machinability analysis.
///
/// None of these abort a full analysis: the aggregator records them against
/// the detector that produced them and keeps going.
#[derive(Debug, Error)]
pub enum MachinabilityError {
    /// Mesh has no vertices.
    #[error("mesh has no vertices")]
    EmptyMesh,

    /// Mesh has no faces.
    #[error("mesh has no faces")]
    NoFaces,

    /// A face references a vertex that does not exist.
    #[error("face {face} references a vertex outside the vertex array")]
    InvalidFaceIndex {
        /// Offending face index.
        face: usize,
    },

    /// Mesh has non-finite vertex coordinates.
    #[error("mesh has {count} vertices with non-finite coordinates")]
    NonFiniteVertices {
        /// Number of offending vertices.
        count: usize,
    },

    /// Operation needs a closed mesh.
    #[error("Mesh is not watertight")]
    NotWatertight,

    /// Convex hull construction failed.
    #[error("convex hull failed: {0}")]
    ConvexHull(String),

    /// Ray query could not be evaluated.
    #[error("ray cast failed: {0}")]
    RayCast(String),

    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A detector ran past the analysis time budget.
    #[error("{detector} exceeded the analysis time budget after {elapsed_ms} ms")]
    TimeBudgetExceeded {
        /// Detector that was aborted.
        detector: DetectorKind,
        /// Elapsed wall time when the budget check failed.
        elapsed_ms: u128,
    },

    /// A detector panicked; the panic was contained.
    #[error("{detector} panicked: {message}")]
    DetectorPanicked {
        /// Detector that panicked.
        detector: DetectorKind,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// A detector reported a failure.
    #[error("{detector} failed: {message}")]
    DetectorFailed {
        /// Detector that failed.
        detector: DetectorKind,
        /// Failure description.
        message: String,
    },
}

impl MachinabilityError {
    /// Create a convex hull error.
    #[must_use]
    pub fn convex_hull(details: impl Into<String>) -> Self {
        Self::ConvexHull(details.into())
    }

    /// Create a ray cast error.
    #[must_use]
    pub fn ray_cast(details: impl Into<String>) -> Self {
        Self::RayCast(details.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig(details.into())
    }

    /// Create a detector failure.
    #[must_use]
    pub fn detector_failed(detector: DetectorKind, message: impl Into<String>) -> Self {
        Self::DetectorFailed {
            detector,
            message: message.into(),
        }
    }
}
