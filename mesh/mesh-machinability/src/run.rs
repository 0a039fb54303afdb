//! State shared by all detectors during one analysis.

use std::time::{Duration, Instant};

use crate::config::AnalysisConfig;
use crate::context::{FaceClassifier, FaceContext, FaceContextTable};
use crate::detectors::DetectorKind;
use crate::error::{MachinabilityError, MachinabilityResult};
use crate::facts::MeshFacts;

/// Wall-clock limit for ray-casting detectors.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a deadline now.
    #[must_use]
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Time since the deadline started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the budget is spent.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.elapsed() > self.budget
    }
}

/// One analysis of one mesh: facts, configuration, memoized face contexts
/// and an optional deadline.
///
/// Detectors borrow the run immutably; everything inside is safe to read
/// from many threads.
#[derive(Debug)]
pub struct AnalysisRun<'a> {
    facts: &'a MeshFacts,
    config: &'a AnalysisConfig,
    contexts: FaceContextTable<'a>,
    deadline: Option<Deadline>,
}

impl<'a> AnalysisRun<'a> {
    /// Start a run.
    ///
    /// The configured time budget applies only when the mesh has at least
    /// `large_mesh_faces` faces.
    #[must_use]
    pub fn new(facts: &'a MeshFacts, config: &'a AnalysisConfig) -> Self {
        let deadline = config
            .time_budget
            .filter(|_| facts.face_count() >= config.large_mesh_faces)
            .map(Deadline::start);
        Self {
            facts,
            config,
            contexts: FaceContextTable::new(facts, FaceClassifier::from_config(config)),
            deadline,
        }
    }

    /// Replace the deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Mesh facts.
    #[must_use]
    pub const fn facts(&self) -> &'a MeshFacts {
        self.facts
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &'a AnalysisConfig {
        self.config
    }

    /// Memoized face contexts.
    #[must_use]
    pub const fn contexts(&self) -> &FaceContextTable<'a> {
        &self.contexts
    }

    /// Context of one face.
    #[must_use]
    pub fn context(&self, face: usize) -> FaceContext {
        self.contexts.get(face)
    }

    /// Active deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<&Deadline> {
        self.deadline.as_ref()
    }

    /// Fail if the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns [`MachinabilityError::TimeBudgetExceeded`] naming `detector`.
    pub fn check_deadline(&self, detector: DetectorKind) -> MachinabilityResult<()> {
        match self.deadline {
            Some(d) if d.is_expired() => Err(MachinabilityError::TimeBudgetExceeded {
                detector,
                elapsed_ms: d.elapsed().as_millis(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{Point3, axis_box};

    fn cube_facts() -> MeshFacts {
        match MeshFacts::from_mesh(&axis_box(Point3::origin(), Point3::new(20.0, 20.0, 20.0))) {
            Ok(f) => f,
            Err(err) => panic!("fixture should be valid: {err}"),
        }
    }

    #[test]
    fn test_small_mesh_has_no_deadline() {
        let facts = cube_facts();
        let config = AnalysisConfig::default();
        let run = AnalysisRun::new(&facts, &config);
        assert!(run.deadline().is_none());
        assert!(run.check_deadline(DetectorKind::Undercuts).is_ok());
    }

    #[test]
    fn test_large_mesh_threshold_enables_deadline() {
        let facts = cube_facts();
        let config = AnalysisConfig {
            large_mesh_faces: 10,
            ..AnalysisConfig::default()
        };
        let run = AnalysisRun::new(&facts, &config);
        assert!(run.deadline().is_some());
        assert!(run.check_deadline(DetectorKind::Undercuts).is_ok());
    }

    #[test]
    fn test_expired_deadline_names_detector() {
        let facts = cube_facts();
        let config = AnalysisConfig::default();
        let run = AnalysisRun::new(&facts, &config)
            .with_deadline(Some(Deadline::start(Duration::ZERO)));
        std::thread::sleep(Duration::from_millis(2));
        let err = run.check_deadline(DetectorKind::DeepPockets);
        assert!(matches!(
            err,
            Err(MachinabilityError::TimeBudgetExceeded {
                detector: DetectorKind::DeepPockets,
                ..
            })
        ));
    }
}
