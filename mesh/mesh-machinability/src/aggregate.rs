//! Running detectors and turning their results into a score.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use mesh_types::{IndexedMesh, MeshTopology};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, ConfigWarning, PenaltyTable};
use crate::detectors::{Detector, DetectorKind};
use crate::error::MachinabilityError;
use crate::facts::MeshFacts;
use crate::result::DetectionResult;
use crate::run::AnalysisRun;

/// Shown when no detector reports a problem.
pub const NO_ISSUES_RECOMMENDATION: &str =
    "No major manufacturability issues detected. Design is CNC-friendly.";

/// Verbal rating of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Rating {
    /// Score below 50.
    VeryDifficult,
    /// Score from 50.
    Difficult,
    /// Score from 70.
    Fair,
    /// Score from 80.
    Good,
    /// Score from 90.
    Excellent,
}

impl Rating {
    /// Rating for a 0-100 score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 80.0 {
            Self::Good
        } else if score >= 70.0 {
            Self::Fair
        } else if score >= 50.0 {
            Self::Difficult
        } else {
            Self::VeryDifficult
        }
    }

    /// One-line description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent - Perfect for standard CNC",
            Self::Good => "Good - Minor issues, easily machinable",
            Self::Fair => "Fair - Some challenges, may need special tools",
            Self::Difficult => "Difficult - Requires advanced CNC or redesign",
            Self::VeryDifficult => "Very Difficult - Major redesign recommended",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Faces to highlight for one detector.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProblemRegion {
    /// Detector that raised the problem.
    pub detector: DetectorKind,
    /// Display label, e.g. `"Steep Walls"`.
    pub label: String,
    /// Faces to highlight, sorted.
    pub faces: Vec<u32>,
}

/// Composite score for one mesh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoreReport {
    /// Score in `[0, 100]`; higher is easier to machine.
    pub score: f64,
    /// Deduction per detector that ran. Failed detectors deduct 0.
    pub penalty_breakdown: BTreeMap<DetectorKind, f64>,
    /// Regions of detectors with a problem, in reporting order.
    pub problem_regions: Vec<ProblemRegion>,
    recommendations: Vec<String>,
}

impl ScoreReport {
    /// Score the `results` of one run.
    ///
    /// `facts` is used for the internal volume display region and may be
    /// `None` when the mesh was rejected.
    #[must_use]
    pub fn from_results(
        results: &BTreeMap<DetectorKind, DetectionResult>,
        facts: Option<&MeshFacts>,
        config: &AnalysisConfig,
    ) -> Self {
        let penalty_breakdown: BTreeMap<DetectorKind, f64> = results
            .iter()
            .map(|(&kind, result)| (kind, penalty(result, &config.penalties)))
            .collect();
        let total: f64 = penalty_breakdown.values().sum();
        let score = (100.0 - total).clamp(0.0, 100.0);

        let problems = || results.values().filter(|r| r.has_problem);

        let problem_regions = problems()
            .map(|r| {
                let faces = match (r.detector, facts) {
                    (DetectorKind::InternalVolumes, Some(facts)) => {
                        inward_faces(facts, config.calibration.inward_alignment)
                    }
                    _ => r.faces().to_vec(),
                };
                ProblemRegion {
                    detector: r.detector,
                    label: r.detector.label().to_string(),
                    faces,
                }
            })
            .collect();

        let mut recommendations: Vec<String> =
            problems().map(|r| r.recommendation.clone()).collect();
        if recommendations.is_empty() {
            recommendations.push(NO_ISSUES_RECOMMENDATION.to_string());
        }

        Self {
            score,
            penalty_breakdown,
            problem_regions,
            recommendations,
        }
    }

    /// Verbal rating of the score.
    #[must_use]
    pub fn rating(&self) -> Rating {
        Rating::from_score(self.score)
    }

    /// Advice from every detector with a problem, or a single all-clear line.
    #[must_use]
    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }
}

/// Score deduction for one result.
#[must_use]
pub fn penalty(result: &DetectionResult, penalties: &PenaltyTable) -> f64 {
    if result.is_failed() {
        return 0.0;
    }
    penalties.count_penalty(result.detector).map_or_else(
        || {
            penalties
                .grade_penalty(result.detector, result.grade())
                .unwrap_or(0.0)
        },
        |p| p.apply(result.count()),
    )
}

/// Faces pointing back toward the vertex mean.
///
/// Internal volumes are graded for the whole part; this picks the faces to
/// show for it.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn inward_faces(facts: &MeshFacts, alignment: f64) -> Vec<u32> {
    let center = facts.vertex_mean();
    facts
        .centroids()
        .iter()
        .zip(facts.normals())
        .enumerate()
        .filter(|(_, (c, n))| {
            let outward = *c - center;
            let outward = outward / (outward.norm() + 1e-8);
            n.dot(&outward) < alignment
        })
        .map(|(face, _)| face as u32)
        .collect()
}

/// Everything one analysis produced.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisReport {
    /// One entry per enabled detector.
    pub results: BTreeMap<DetectorKind, DetectionResult>,
    /// Score, regions and advice.
    pub report: ScoreReport,
    /// Options that were invalid and ran with their defaults instead.
    pub config_warnings: Vec<ConfigWarning>,
}

impl AnalysisReport {
    /// Composite score.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.report.score
    }

    /// Result of one detector, if it was enabled.
    #[must_use]
    pub fn result(&self, kind: DetectorKind) -> Option<&DetectionResult> {
        self.results.get(&kind)
    }

    /// Detectors that failed or were inconclusive.
    pub fn failures(&self) -> impl Iterator<Item = &DetectionResult> {
        self.results.values().filter(|r| r.is_failed())
    }
}

/// Runs the enabled detectors over a mesh and scores the results.
///
/// A detector that returns an error or panics is recorded as failed and
/// deducts nothing; the others still run. Invalid options are replaced by
/// their defaults when the aggregator is created and reported on every
/// [`AnalysisReport`].
///
/// # Example
///
/// ```
/// use mesh_machinability::{AnalysisConfig, ScoreAggregator};
/// use mesh_types::{Point3, axis_box};
///
/// let block = axis_box(Point3::origin(), Point3::new(40.0, 40.0, 20.0));
/// let report = ScoreAggregator::new(AnalysisConfig::default()).analyze(&block);
/// assert!((report.score() - 100.0).abs() < f64::EPSILON);
/// ```
pub struct ScoreAggregator {
    config: AnalysisConfig,
    config_warnings: Vec<ConfigWarning>,
    overrides: BTreeMap<DetectorKind, Box<dyn Detector>>,
}

impl fmt::Debug for ScoreAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoreAggregator")
            .field("config", &self.config)
            .field("config_warnings", &self.config_warnings)
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScoreAggregator {
    /// Create an aggregator using the built-in detectors.
    ///
    /// Invalid options in `config` are replaced by their defaults, see
    /// [`AnalysisConfig::sanitized`].
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        let (config, config_warnings) = config.sanitized();
        Self {
            config,
            config_warnings,
            overrides: BTreeMap::new(),
        }
    }

    /// Replace the built-in detector for `detector.kind()`.
    #[must_use]
    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.overrides.insert(detector.kind(), detector);
        self
    }

    /// Configuration in use, after invalid options were replaced.
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Options that were replaced by their defaults.
    #[must_use]
    pub fn config_warnings(&self) -> &[ConfigWarning] {
        &self.config_warnings
    }

    /// Run every enabled detector and score the mesh.
    #[must_use]
    pub fn analyze(&self, mesh: &IndexedMesh) -> AnalysisReport {
        let started = Instant::now();
        info!(
            vertices = mesh.vertex_count(),
            faces = mesh.face_count(),
            detectors = self.config.enabled_detectors.len(),
            "Starting machinability analysis"
        );

        let facts = match MeshFacts::from_mesh(mesh) {
            Ok(facts) => facts,
            Err(err) => {
                warn!(error = %err, "Mesh rejected, no detector can run");
                let results = self
                    .config
                    .enabled_detectors
                    .iter()
                    .map(|&kind| (kind, DetectionResult::failed(kind, &err)))
                    .collect();
                return self.finish(results, None, started);
            }
        };

        let run = AnalysisRun::new(&facts, &self.config);
        let results = self
            .config
            .enabled_detectors
            .iter()
            .map(|&kind| (kind, self.run_detector(kind, &run)))
            .collect();
        debug!(
            classified = run.contexts().computed(),
            faces = facts.face_count(),
            "Face context cache"
        );

        self.finish(results, Some(&facts), started)
    }

    /// Run a single detector, enabled or not.
    #[must_use]
    pub fn detect(&self, kind: DetectorKind, mesh: &IndexedMesh) -> DetectionResult {
        match MeshFacts::from_mesh(mesh) {
            Ok(facts) => self.run_detector(kind, &AnalysisRun::new(&facts, &self.config)),
            Err(err) => DetectionResult::failed(kind, &err),
        }
    }

    fn run_detector(&self, kind: DetectorKind, run: &AnalysisRun<'_>) -> DetectionResult {
        let builtin;
        let detector: &dyn Detector = if let Some(custom) = self.overrides.get(&kind) {
            custom.as_ref()
        } else {
            builtin = kind.builtin(&self.config);
            builtin.as_ref()
        };

        let started = Instant::now();
        debug!(detector = %kind, "Running detector");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(run)));

        let result = match outcome {
            Ok(Ok(result)) => {
                if let Some(error) = &result.error {
                    warn!(detector = %kind, error = %error, "Detector was inconclusive");
                }
                result
            }
            Ok(Err(err)) => {
                warn!(detector = %kind, error = %err, "Detector failed");
                DetectionResult::failed(kind, &err)
            }
            Err(payload) => {
                let err = MachinabilityError::DetectorPanicked {
                    detector: kind,
                    message: panic_message(payload.as_ref()),
                };
                warn!(detector = %kind, error = %err, "Detector panicked");
                DetectionResult::failed(kind, &err)
            }
        };

        info!(
            detector = %kind,
            severity = %result.severity,
            count = result.count(),
            elapsed_ms = started.elapsed().as_millis(),
            "Detector finished"
        );
        result
    }

    fn finish(
        &self,
        results: BTreeMap<DetectorKind, DetectionResult>,
        facts: Option<&MeshFacts>,
        started: Instant,
    ) -> AnalysisReport {
        let report = ScoreReport::from_results(&results, facts, &self.config);
        info!(
            score = report.score,
            rating = %report.rating(),
            problems = report.problem_regions.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Machinability analysis complete"
        );
        AnalysisReport {
            results,
            report,
            config_warnings: self.config_warnings.clone(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Analyze `mesh` with the built-in detectors.
///
/// Never fails: problems with the mesh or with individual detectors are
/// reported as detector errors inside the report.
#[must_use]
pub fn analyze(mesh: &IndexedMesh, config: &AnalysisConfig) -> AnalysisReport {
    ScoreAggregator::new(config.clone()).analyze(mesh)
}

/// Run one built-in detector on `mesh`.
#[must_use]
pub fn detect(kind: DetectorKind, mesh: &IndexedMesh, config: &AnalysisConfig) -> DetectionResult {
    ScoreAggregator::new(config.clone()).detect(kind, mesh)
}
