use crate::{
    detection::{
        CandidateScanner, EventFitter, InitialGuess, LevenbergMarquardt, SmoothingSpline,
    },
    geometry::PeriodicBox,
};
use anyhow::{Error, anyhow};
use clap::Parser;
use instanton_common::Real;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Time window must be at least 2 frames, got {0}")]
    TimeWindowTooShort(usize),
    #[error("{num_frames} frames are too few for a time window of {time_window}")]
    TooFewFrames {
        num_frames: usize,
        time_window: usize,
    },
    #[error("Threshold must be positive, got {0}")]
    NonPositiveThreshold(Real),
    #[error("Box length must be positive, got {0}")]
    NonPositiveBoxLength(Real),
    #[error("Smoothing factor must be non-negative, got {0}")]
    NegativeSmoothing(Real),
    #[error("Maximum number of evaluations must be positive")]
    NoEvaluations,
    #[error("Coarse-graining over {delta} frames either side needs more than {num_frames} frames")]
    CoarseGrainTooLong { delta: usize, num_frames: usize },
}

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct InitialGuessWrapper(pub InitialGuess);

impl FromStr for InitialGuessWrapper {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let vals: Vec<_> = s.split(',').map(str::trim).collect();
        if vals.len() == 3 {
            Ok(InitialGuessWrapper(InitialGuess {
                amplitude: Real::from_str(vals[0])?,
                width: match vals[1] {
                    "auto" => None,
                    width => Some(Real::from_str(width)?),
                },
                offset: Real::from_str(vals[2])?,
            }))
        } else {
            Err(anyhow!(
                "Incorrect number of parameters in initial guess, expected pattern '*,*,*', got '{s}'"
            ))
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct DetectorParameters {
    /// Half-width, in frames, of the windows used for gating, scanning and fitting.
    #[clap(long, env = "INSTANTON_TIME_WINDOW")]
    pub time_window: usize,

    /// Displacement a particle must make to count as excited.
    #[clap(long, env = "INSTANTON_THRESHOLD")]
    pub threshold: Real,

    /// Edge length of the cubic periodic box.
    #[clap(long, env = "INSTANTON_BOX_LENGTH")]
    pub box_length: Real,

    /// Bound on the sum of squared residuals of the smoothing spline.
    #[clap(long, default_value = "1.0")]
    pub smoothing: Real,

    /// Starting amplitude, width and offset of the tanh fit, as 'c1,a,c2'.
    /// A width of 'auto' uses a twentieth of the time window.
    #[clap(long, default_value = "0.3,auto,0.5")]
    pub initial_guess: InitialGuessWrapper,

    #[clap(long, default_value = "400")]
    pub max_evaluations: usize,
}

impl DetectorParameters {
    pub fn new(time_window: usize, threshold: Real, box_length: Real) -> Self {
        Self {
            time_window,
            threshold,
            box_length,
            smoothing: 1.0,
            initial_guess: InitialGuessWrapper::default(),
            max_evaluations: LevenbergMarquardt::default().max_evaluations,
        }
    }

    pub fn with_smoothing(self, smoothing: Real) -> Self {
        Self { smoothing, ..self }
    }

    /// Checks the parameters can be applied to a trajectory of `num_frames` frames.
    pub fn validate(&self, num_frames: usize) -> Result<(), ParameterError> {
        if self.time_window < 2 {
            return Err(ParameterError::TimeWindowTooShort(self.time_window));
        }
        if num_frames <= 2 * self.time_window + 1 {
            return Err(ParameterError::TooFewFrames {
                num_frames,
                time_window: self.time_window,
            });
        }
        if self.threshold.is_nan() || self.threshold <= 0.0 {
            return Err(ParameterError::NonPositiveThreshold(self.threshold));
        }
        if self.box_length.is_nan() || self.box_length <= 0.0 {
            return Err(ParameterError::NonPositiveBoxLength(self.box_length));
        }
        if self.smoothing.is_nan() || self.smoothing < 0.0 {
            return Err(ParameterError::NegativeSmoothing(self.smoothing));
        }
        if self.max_evaluations == 0 {
            return Err(ParameterError::NoEvaluations);
        }
        Ok(())
    }

    pub fn periodic_box(&self) -> PeriodicBox {
        PeriodicBox::new(self.box_length)
    }

    pub fn scanner(&self) -> CandidateScanner {
        CandidateScanner::new(self.time_window, self.threshold, self.periodic_box())
    }

    pub fn fitter(&self) -> EventFitter<SmoothingSpline, LevenbergMarquardt> {
        EventFitter::new(
            SmoothingSpline::new(self.smoothing),
            LevenbergMarquardt::with_max_evaluations(self.max_evaluations),
            self.time_window,
            self.periodic_box(),
            self.initial_guess.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_initial_guess() {
        let guess = InitialGuessWrapper::from_str("0.3,auto,0.5").unwrap().0;
        assert_eq!(guess, InitialGuess::default());
        let guess = InitialGuessWrapper::from_str("1, 2.5, -1").unwrap().0;
        assert_eq!(guess.width, Some(2.5));
        assert_eq!(guess.offset, -1.0);
        assert!(InitialGuessWrapper::from_str("1,2").is_err());
        assert!(InitialGuessWrapper::from_str("1,wide,2").is_err());
    }

    #[test]
    fn parse_from_command_line() {
        let parameters = DetectorParameters::try_parse_from([
            "detector",
            "--time-window",
            "10",
            "--threshold",
            "1.5",
            "--box-length",
            "50",
        ])
        .unwrap();
        assert_eq!(parameters.time_window, 10);
        assert_eq!(parameters.smoothing, 1.0);
        assert_eq!(parameters.max_evaluations, 400);
        assert_eq!(parameters.initial_guess.0, InitialGuess::default());
    }

    #[test]
    fn validation() {
        let parameters = DetectorParameters::new(10, 1.0, 50.0);
        assert_eq!(parameters.validate(22), Ok(()));
        assert_eq!(
            parameters.validate(21),
            Err(ParameterError::TooFewFrames {
                num_frames: 21,
                time_window: 10
            })
        );
        assert_eq!(
            DetectorParameters::new(1, 1.0, 50.0).validate(100),
            Err(ParameterError::TimeWindowTooShort(1))
        );
        assert_eq!(
            DetectorParameters::new(10, 0.0, 50.0).validate(100),
            Err(ParameterError::NonPositiveThreshold(0.0))
        );
        assert_eq!(
            DetectorParameters::new(10, 1.0, -5.0).validate(100),
            Err(ParameterError::NonPositiveBoxLength(-5.0))
        );
        assert_eq!(
            parameters.with_smoothing(-1.0).validate(100),
            Err(ParameterError::NegativeSmoothing(-1.0))
        );
    }
}
