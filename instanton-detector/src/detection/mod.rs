//! The two stages applied to each particle: scanning for the most likely
//! event centre, then fitting a tanh transition around it.
pub mod events;
pub mod fitter;
pub mod fitting;
pub mod model;
pub mod scanner;
pub mod smoothing;

pub use events::{EventTable, ExcitationEvent, FailureCount};
pub use fitter::{EventFitter, FitOutcome, InitialGuess};
pub use fitting::{Bounds, CurveFitter, FitError, FitReport, LevenbergMarquardt, ParametricModel};
pub use model::{TanhModel, TanhParameters};
pub use scanner::{Candidate, CandidateScanner, ScanOutcome};
pub use smoothing::{CubicSpline, Smoother, SmoothingError, SmoothingSpline};
