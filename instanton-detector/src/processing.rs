use crate::{
    detection::{
        CandidateScanner, CurveFitter, EventFitter, EventTable, ExcitationEvent, FailureCount,
        FitError, FitOutcome, ScanOutcome, Smoother, TanhParameters,
    },
    error::DetectorResult,
    loader::load_xyz_file,
    parameters::DetectorParameters,
    trajectory::Trajectory,
};
use instanton_common::{
    FileId, ParticleIndex,
    metrics::{
        failures::{self, FailureKind},
        names::{EVENTS_DETECTED, FAILURES, FILES_PROCESSED, PARTICLES_PROCESSED},
        particles_processed::{self, ParticleKind},
    },
};
use metrics::counter;
use rayon::prelude::*;
use std::path::Path;
use tracing::{Span, field, info, instrument};

/// What happened to a single particle.
#[derive(Debug, Clone, PartialEq, strum::Display)]
pub enum ParticleOutcome {
    #[strum(to_string = "gated_out")]
    GatedOut,
    #[strum(to_string = "no_candidate")]
    NoCandidate,
    #[strum(to_string = "accepted")]
    Accepted(ExcitationEvent),
    #[strum(to_string = "fit_failed")]
    FitFailed(FitError),
    #[strum(to_string = "too_wide")]
    TooWide(TanhParameters),
}

impl ParticleOutcome {
    fn record_metrics(&self) {
        let kind = match self {
            Self::GatedOut => ParticleKind::GatedOut,
            Self::NoCandidate => ParticleKind::NoCandidate,
            _ => ParticleKind::Candidate,
        };
        counter!(PARTICLES_PROCESSED, &[particles_processed::get_label(kind)]).increment(1);

        match self {
            Self::Accepted(_) => counter!(EVENTS_DETECTED).increment(1),
            Self::FitFailed(_) => {
                counter!(FAILURES, &[failures::get_label(FailureKind::FitFailed)]).increment(1)
            }
            Self::TooWide(_) => {
                counter!(FAILURES, &[failures::get_label(FailureKind::TooWide)]).increment(1)
            }
            Self::GatedOut | Self::NoCandidate => {}
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub events: EventTable,
    pub failures: FailureCount,
}

impl DetectionResult {
    pub fn record(&mut self, outcome: ParticleOutcome) {
        match outcome {
            ParticleOutcome::Accepted(event) => self.events.push(event),
            ParticleOutcome::FitFailed(_) => self.failures.fit_failed += 1,
            ParticleOutcome::TooWide(_) => self.failures.too_wide += 1,
            ParticleOutcome::GatedOut | ParticleOutcome::NoCandidate => {}
        }
    }

    pub fn append(&mut self, mut other: DetectionResult) {
        self.events.append(&mut other.events);
        self.failures += other.failures;
    }
}

#[instrument(skip_all, level = "debug", fields(particle = particle, outcome = field::Empty))]
fn process_particle<S: Smoother, C: CurveFitter>(
    trajectory: &Trajectory,
    file_id: FileId,
    particle: ParticleIndex,
    scanner: &CandidateScanner,
    fitter: &EventFitter<S, C>,
) -> DetectorResult<ParticleOutcome> {
    let path = trajectory.path(particle);
    let outcome = match scanner.scan(particle, &path)? {
        ScanOutcome::GatedOut => ParticleOutcome::GatedOut,
        ScanOutcome::NoCandidate => ParticleOutcome::NoCandidate,
        ScanOutcome::Found(candidate) => match fitter.fit(&path, candidate.center)? {
            FitOutcome::Accepted(parameters) => {
                ParticleOutcome::Accepted(ExcitationEvent::new(file_id, particle, &parameters))
            }
            FitOutcome::TooWide(parameters) => ParticleOutcome::TooWide(parameters),
            FitOutcome::Failed(e) => ParticleOutcome::FitFailed(e),
        },
    };
    Span::current().record("outcome", field::display(&outcome));
    outcome.record_metrics();
    Ok(outcome)
}

/// Runs the scanner and fitter over every particle in parallel.
/// Events are returned in particle order.
pub fn detect_with<S, C>(
    trajectory: &Trajectory,
    file_id: FileId,
    scanner: &CandidateScanner,
    fitter: &EventFitter<S, C>,
) -> DetectorResult<DetectionResult>
where
    S: Smoother + Sync,
    C: CurveFitter + Sync,
{
    let outcomes = (0..trajectory.num_particles())
        .into_par_iter()
        .map(|particle| process_particle(trajectory, file_id, particle, scanner, fitter))
        .collect::<DetectorResult<Vec<_>>>()?;

    let mut result = DetectionResult::default();
    for outcome in outcomes {
        result.record(outcome);
    }
    Ok(result)
}

/// Validates `parameters` against the trajectory, then detects events with
/// the smoothing spline and Levenberg-Marquardt fitter they describe.
pub fn detect(
    trajectory: &Trajectory,
    file_id: FileId,
    parameters: &DetectorParameters,
) -> DetectorResult<DetectionResult> {
    parameters.validate(trajectory.num_frames())?;
    detect_with(trajectory, file_id, &parameters.scanner(), &parameters.fitter())
}

#[instrument(skip(path, parameters), fields(path = %path.display()))]
pub fn detect_file(
    path: &Path,
    file_id: FileId,
    num_frames: usize,
    num_particles: usize,
    parameters: &DetectorParameters,
    coarse_grain: Option<usize>,
) -> DetectorResult<DetectionResult> {
    let trajectory = load_xyz_file(path, num_frames, num_particles)?;
    let trajectory = match coarse_grain {
        Some(delta) if delta > 0 => trajectory.coarse_grain(delta, &parameters.periodic_box())?,
        _ => trajectory,
    };
    let result = detect(&trajectory, file_id, parameters)?;
    counter!(FILES_PROCESSED).increment(1);
    info!(
        events = result.events.len(),
        fit_failed = result.failures.fit_failed,
        too_wide = result.failures.too_wide,
        "Processed file"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detection::{Bounds, FitReport, InitialGuess, ParametricModel, SmoothingSpline},
        error::DetectorError,
        geometry::{PeriodicBox, Position},
        parameters::ParameterError,
    };
    use assert_approx_eq::assert_approx_eq;
    use instanton_common::Real;
    use std::fmt::Write;

    const FRAMES: usize = 100;

    fn stationary(_: usize) -> Position {
        [1.0, 2.0, 3.0]
    }

    fn excited(t: usize) -> Position {
        [2.0 + ((t as Real - 50.0) / 4.0).tanh(), 2.0, 3.0]
    }

    fn drifting(t: usize) -> Position {
        [-5.0 + 10.0 * t as Real / FRAMES as Real, 0.0, 0.0]
    }

    fn slow_drift(t: usize) -> Position {
        [0.03 * t as Real, 0.0, 0.0]
    }

    fn trajectory(particles: &[fn(usize) -> Position]) -> Trajectory {
        let paths: Vec<Vec<Position>> = particles
            .iter()
            .map(|f| (0..FRAMES).map(f).collect())
            .collect();
        Trajectory::from_paths(&paths).unwrap()
    }

    fn parameters() -> DetectorParameters {
        DetectorParameters::new(20, 1.0, 50.0).with_smoothing(1e-6)
    }

    #[test]
    fn batch_scenario() {
        let trajectory = trajectory(&[stationary, excited, drifting]);
        let result = detect(&trajectory, 0, &parameters()).unwrap();

        assert_eq!(result.events.len(), 1);
        let event = result.events.as_slice()[0];
        assert_eq!(event.file_id, 0);
        assert_eq!(event.particle_id, 1);
        assert_approx_eq!(event.t_0, 50.0, 0.05);
        assert_approx_eq!(event.deltat, 8.0, 0.08);
        assert_approx_eq!(event.amplitude, 2.0, 0.02);
        assert_eq!(result.failures.as_array(), [0, 1]);
    }

    #[test]
    fn default_smoothing_rejects_clean_excitation() {
        let trajectory = trajectory(&[stationary, excited, drifting]);
        let result = detect(&trajectory, 0, &DetectorParameters::new(20, 1.0, 50.0)).unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.failures.as_array(), [0, 2]);
    }

    #[test]
    fn slow_drift_produces_nothing() {
        let trajectory = trajectory(&[slow_drift]);
        let result = detect(&trajectory, 0, &parameters()).unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.failures.as_array(), [0, 0]);
    }

    #[test]
    fn stationary_particles_produce_nothing() {
        let trajectory = trajectory(&[stationary, stationary]);
        let result = detect(&trajectory, 0, &parameters()).unwrap();
        assert_eq!(result, DetectionResult::default());
    }

    #[test]
    fn events_follow_particle_order() {
        let trajectory = trajectory(&[excited, stationary, excited, excited]);
        let result = detect(&trajectory, 4, &parameters()).unwrap();
        let particles: Vec<_> = result.events.iter().map(|e| e.particle_id).collect();
        assert_eq!(particles, vec![0, 2, 3]);
        assert!(result.events.iter().all(|e| e.file_id == 4));
    }

    #[test]
    fn event_across_the_boundary() {
        let periodic_box = PeriodicBox::new(50.0);
        let path = (0..FRAMES)
            .map(|t| {
                let x = 24.5 + ((t as Real - 47.3) / 3.0).tanh() + 1.0;
                periodic_box.fold(&[x, 0.0, 0.0])
            })
            .collect();
        let trajectory = Trajectory::from_paths(&[path]).unwrap();
        let result = detect(&trajectory, 0, &parameters()).unwrap();

        assert_eq!(result.events.len(), 1);
        let event = result.events.as_slice()[0];
        assert_approx_eq!(event.t_0, 47.3, 0.05);
        assert_approx_eq!(event.deltat, 6.0, 0.06);
        assert_approx_eq!(event.amplitude, 2.0, 0.02);
        assert_eq!(result.failures.as_array(), [0, 0]);
    }

    struct Unfittable;

    impl CurveFitter for Unfittable {
        fn fit<M: ParametricModel>(
            &self,
            _: &M,
            _: &[Real],
            _: &[Real],
            _: &[Real],
            _: &Bounds,
        ) -> Result<FitReport, FitError> {
            Err(FitError::Singular)
        }
    }

    #[test]
    fn fit_failures_are_counted() {
        let trajectory = trajectory(&[excited, stationary]);
        let parameters = parameters();
        let fitter = EventFitter::new(
            SmoothingSpline::new(parameters.smoothing),
            Unfittable,
            parameters.time_window,
            parameters.periodic_box(),
            InitialGuess::default(),
        );
        let result = detect_with(&trajectory, 0, &parameters.scanner(), &fitter).unwrap();
        assert!(result.events.is_empty());
        assert_eq!(result.failures.as_array(), [1, 0]);
    }

    #[test]
    fn parameters_are_validated() {
        let trajectory = trajectory(&[excited]);
        let result = detect(&trajectory, 0, &DetectorParameters::new(50, 1.0, 50.0));
        assert!(matches!(
            result,
            Err(DetectorError::Parameter(ParameterError::TooFewFrames { .. }))
        ));
    }

    #[test]
    fn results_accumulate_across_files() {
        let mut total = DetectionResult::default();
        for file_id in 0..2 {
            let trajectory = trajectory(&[excited, drifting]);
            total.append(detect(&trajectory, file_id, &parameters()).unwrap());
        }
        let files: Vec<_> = total.events.iter().map(|e| e.file_id).collect();
        assert_eq!(files, vec![0, 1]);
        assert_eq!(total.failures.as_array(), [0, 2]);
    }

    #[test]
    fn detects_from_file() {
        let mut contents = String::new();
        for t in 0..FRAMES {
            writeln!(contents, "3\nAtoms. Timestep: {t}").unwrap();
            let particles: [(&str, fn(usize) -> Position); 3] =
                [("A", stationary), ("B", excited), ("C", drifting)];
            for (name, f) in particles {
                let [x, y, z] = f(t);
                writeln!(contents, "{name} {x} {y} {z}").unwrap();
            }
        }
        let path = std::env::temp_dir().join(format!("batch-{}.xyz", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        let result = detect_file(&path, 7, FRAMES, 3, &parameters(), None);
        std::fs::remove_file(&path).unwrap();

        let result = result.unwrap();
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events.as_slice()[0].file_id, 7);
        assert_eq!(result.events.as_slice()[0].particle_id, 1);
        assert_eq!(result.failures.as_array(), [0, 1]);
    }
}
