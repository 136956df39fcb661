use super::{
    fitting::{CurveFitter, FitError},
    model::{TanhModel, TanhParameters},
    smoothing::Smoother,
};
use crate::{
    geometry::{PeriodicBox, Position},
    trajectory::ParticlePath,
    window::{WindowError, average_position},
};
use instanton_common::{FrameIndex, Real};
use tracing::trace;

/// Starting point of the fit. The centre always starts at the candidate frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialGuess {
    pub amplitude: Real,
    /// `None` uses a twentieth of the time window.
    pub width: Option<Real>,
    pub offset: Real,
}

impl Default for InitialGuess {
    fn default() -> Self {
        Self {
            amplitude: 0.3,
            width: None,
            offset: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    Accepted(TanhParameters),
    /// The fitted transition lasts at least three quarters of the time window.
    TooWide(TanhParameters),
    Failed(FitError),
}

/// Refines a candidate centre into the parameters of a tanh-shaped transition.
#[derive(Debug, Clone)]
pub struct EventFitter<S, C> {
    smoother: S,
    curve_fitter: C,
    time_window: usize,
    periodic_box: PeriodicBox,
    initial_guess: InitialGuess,
}

impl<S: Smoother, C: CurveFitter> EventFitter<S, C> {
    pub fn new(
        smoother: S,
        curve_fitter: C,
        time_window: usize,
        periodic_box: PeriodicBox,
        initial_guess: InitialGuess,
    ) -> Self {
        Self {
            smoother,
            curve_fitter,
            time_window,
            periodic_box,
            initial_guess,
        }
    }

    pub fn max_duration(&self) -> Real {
        0.75 * self.time_window as Real
    }

    /// Mean position over the first half of the window preceding `center`.
    pub fn reference_position(
        &self,
        path: &ParticlePath,
        center: FrameIndex,
    ) -> Result<Position, WindowError> {
        let ta = self.time_window;
        average_position(
            path,
            center.saturating_sub(ta)..center.saturating_sub(ta.div_ceil(2)),
            &self.periodic_box,
        )
    }

    /// Frame times and distances from the reference position over
    /// `[center - ta, center + ta)`.
    pub fn signal(
        &self,
        path: &ParticlePath,
        center: FrameIndex,
    ) -> Result<(Vec<Real>, Vec<Real>), WindowError> {
        let reference = self.reference_position(path, center)?;
        let frames = center.saturating_sub(self.time_window)..(center + self.time_window);
        let distances = path.distance_series_to_point(&reference, &self.periodic_box);
        let local = distances
            .get(frames.clone())
            .ok_or_else(|| WindowError::OutOfBounds {
                range: frames.clone(),
                len: path.len(),
            })?
            .to_vec();
        Ok((frames.map(|frame| frame as Real).collect(), local))
    }

    fn initial_parameters(&self, center: FrameIndex) -> TanhParameters {
        TanhParameters {
            amplitude: self.initial_guess.amplitude,
            center: center as Real,
            width: self
                .initial_guess
                .width
                .unwrap_or(self.time_window as Real / 20.0),
            offset: self.initial_guess.offset,
        }
    }

    pub fn fit(&self, path: &ParticlePath, center: FrameIndex) -> Result<FitOutcome, WindowError> {
        let (times, distances) = self.signal(path, center)?;
        let fitted = self
            .smoother
            .smooth(&times, &distances)
            .map_err(FitError::from)
            .and_then(|target| {
                self.curve_fitter.fit(
                    &TanhModel,
                    &times,
                    &target,
                    &self.initial_parameters(center).to_array(),
                    &TanhModel::bounds(),
                )
            })
            .and_then(|report| {
                trace!(center, evaluations = report.evaluations, cost = report.cost, "Fitted");
                TanhParameters::from_slice(&report.parameters).ok_or(FitError::ParameterCount {
                    expected: 4,
                    actual: report.parameters.len(),
                })
            });

        Ok(match fitted {
            Ok(parameters) if parameters.duration() < self.max_duration() => {
                FitOutcome::Accepted(parameters)
            }
            Ok(parameters) => FitOutcome::TooWide(parameters),
            Err(e) => FitOutcome::Failed(e),
        })
    }
}
