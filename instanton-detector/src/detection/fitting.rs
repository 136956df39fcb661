use super::smoothing::SmoothingError;
use instanton_common::Real;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

const INITIAL_DAMPING: Real = 1e-3;
const MIN_DAMPING: Real = 1e-15;
const MIN_DIAGONAL: Real = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("Model takes {expected} parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },
    #[error("{times} sample times but {values} samples")]
    LengthMismatch { times: usize, values: usize },
    #[error("No samples to fit")]
    NoSamples,
    #[error("Cost is not finite at the initial parameters")]
    NonFinite,
    #[error("Normal equations could not be solved")]
    Singular,
    #[error("No convergence after {0} evaluations")]
    NotConverged(usize),
    #[error("{0}")]
    Smoothing(#[from] SmoothingError),
}

/// A function of time `f(t; p)` with an analytic gradient in `p`.
pub trait ParametricModel {
    fn num_parameters(&self) -> usize;
    fn evaluate(&self, t: Real, parameters: &[Real]) -> Real;
    /// Writes `∂f/∂pₖ` at `t` into `gradient[k]`.
    fn gradient(&self, t: Real, parameters: &[Real], gradient: &mut [Real]);
}

/// Box constraints on the parameters; infinite entries leave a side free.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<Real>,
    pub upper: Vec<Real>,
}

impl Bounds {
    pub fn unbounded(num_parameters: usize) -> Self {
        Self {
            lower: vec![Real::NEG_INFINITY; num_parameters],
            upper: vec![Real::INFINITY; num_parameters],
        }
    }

    pub fn clamp(&self, parameters: &mut [Real]) {
        for ((p, lower), upper) in parameters.iter_mut().zip(&self.lower).zip(&self.upper) {
            *p = p.max(*lower).min(*upper);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub parameters: Vec<Real>,
    /// Half the sum of squared residuals at `parameters`.
    pub cost: Real,
    pub evaluations: usize,
}

/// Bounded nonlinear least squares.
pub trait CurveFitter {
    fn fit<M: ParametricModel>(
        &self,
        model: &M,
        times: &[Real],
        values: &[Real],
        initial: &[Real],
        bounds: &Bounds,
    ) -> Result<FitReport, FitError>;
}

/// Levenberg-Marquardt with parameters projected onto the bounds after every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardt {
    pub max_evaluations: usize,
    /// Relative reduction in cost below which an accepted step ends the fit.
    pub ftol: Real,
    /// Relative step length below which the fit ends.
    pub xtol: Real,
    /// Largest gradient component below which the fit ends.
    pub gtol: Real,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_evaluations: 400,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
        }
    }
}

impl LevenbergMarquardt {
    pub fn with_max_evaluations(max_evaluations: usize) -> Self {
        Self {
            max_evaluations,
            ..Default::default()
        }
    }
}

fn cost<M: ParametricModel>(model: &M, times: &[Real], values: &[Real], parameters: &[Real]) -> Real {
    0.5 * times
        .iter()
        .zip(values)
        .map(|(&t, &y)| (model.evaluate(t, parameters) - y).powi(2))
        .sum::<Real>()
}

impl CurveFitter for LevenbergMarquardt {
    fn fit<M: ParametricModel>(
        &self,
        model: &M,
        times: &[Real],
        values: &[Real],
        initial: &[Real],
        bounds: &Bounds,
    ) -> Result<FitReport, FitError> {
        let n = model.num_parameters();
        for actual in [initial.len(), bounds.lower.len(), bounds.upper.len()] {
            if actual != n {
                return Err(FitError::ParameterCount { expected: n, actual });
            }
        }
        if times.len() != values.len() {
            return Err(FitError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        if times.is_empty() {
            return Err(FitError::NoSamples);
        }

        let mut parameters = DVector::from_column_slice(initial);
        bounds.clamp(parameters.as_mut_slice());
        let mut current = cost(model, times, values, parameters.as_slice());
        if !current.is_finite() {
            return Err(FitError::NonFinite);
        }

        let report = |parameters: &DVector<Real>, cost: Real, evaluations: usize| FitReport {
            parameters: parameters.as_slice().to_vec(),
            cost,
            evaluations,
        };

        let mut damping = INITIAL_DAMPING;
        let mut evaluations = 1;
        let mut jacobian = DMatrix::<Real>::zeros(times.len(), n);
        let mut residuals = DVector::<Real>::zeros(times.len());
        let mut row: Vec<Real> = vec![0.0; n];

        while evaluations < self.max_evaluations {
            for (i, (&t, &y)) in times.iter().zip(values).enumerate() {
                model.gradient(t, parameters.as_slice(), &mut row);
                for (k, derivative) in row.iter().enumerate() {
                    jacobian[(i, k)] = *derivative;
                }
                residuals[i] = model.evaluate(t, parameters.as_slice()) - y;
            }
            let gradient = jacobian.tr_mul(&residuals);
            if gradient.amax() <= self.gtol {
                return Ok(report(&parameters, current, evaluations));
            }
            let normal = jacobian.tr_mul(&jacobian);
            let descent = -gradient;

            loop {
                let mut damped = normal.clone();
                for k in 0..n {
                    damped[(k, k)] += damping * normal[(k, k)].max(MIN_DIAGONAL);
                }
                let Some(step) = damped.cholesky().map(|factor| factor.solve(&descent)) else {
                    damping *= 10.0;
                    evaluations += 1;
                    if !damping.is_finite() {
                        return Err(FitError::Singular);
                    }
                    if evaluations >= self.max_evaluations {
                        return Err(FitError::NotConverged(evaluations));
                    }
                    continue;
                };

                let mut trial = &parameters + step;
                bounds.clamp(trial.as_mut_slice());
                let step_length = (&trial - &parameters).norm();
                let small_step = step_length <= self.xtol * (parameters.norm() + self.xtol);
                let trial_cost = cost(model, times, values, trial.as_slice());
                evaluations += 1;

                if trial_cost.is_finite() && trial_cost < current {
                    let converged = current - trial_cost <= self.ftol * current || small_step;
                    parameters = trial;
                    current = trial_cost;
                    damping = (damping / 10.0).max(MIN_DAMPING);
                    if converged {
                        return Ok(report(&parameters, current, evaluations));
                    }
                    break;
                }

                damping *= 10.0;
                if small_step {
                    return Ok(report(&parameters, current, evaluations));
                }
                if evaluations >= self.max_evaluations {
                    return Err(FitError::NotConverged(evaluations));
                }
            }
        }
        Err(FitError::NotConverged(evaluations))
    }
}
