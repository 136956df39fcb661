//! Cubic smoothing splines in the formulation of Reinsch: the natural cubic
//! spline `g` minimising `∫g''²` subject to `Σ(y − g)² ≤ S`.
use instanton_common::Real;
use thiserror::Error;

const MAX_BRACKET_STEPS: usize = 60;
const MAX_BISECTIONS: usize = 100;
const BISECTION_RATIO: Real = 1.0 + 1e-10;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SmoothingError {
    #[error("{x} abscissae but {y} ordinates")]
    LengthMismatch { x: usize, y: usize },
    #[error("Abscissae must be strictly increasing (at index {0})")]
    KnotsNotIncreasing(usize),
    #[error("Input contains non-finite values")]
    NonFinite,
    #[error("Spline system is not positive definite at row {0}")]
    SingularSystem(usize),
}

/// Anything that can replace a noisy series by a smooth one sampled at the
/// same abscissae.
pub trait Smoother {
    fn smooth(&self, x: &[Real], y: &[Real]) -> Result<Vec<Real>, SmoothingError>;
}

/// A natural cubic spline through `(knots[i], values[i])`.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    knots: Vec<Real>,
    values: Vec<Real>,
    second_derivatives: Vec<Real>,
}

impl CubicSpline {
    fn piecewise_linear(knots: &[Real], values: Vec<Real>) -> Self {
        Self {
            knots: knots.to_vec(),
            second_derivatives: vec![0.0; values.len()],
            values,
        }
    }

    /// Evaluates the spline at `x`, extrapolating linearly past the ends.
    pub fn evaluate(&self, x: Real) -> Real {
        let n = self.knots.len();
        match n {
            0 => return Real::NAN,
            1 => return self.values[0],
            _ => {}
        }
        let k = self.knots[1..(n - 1)].partition_point(|&knot| knot <= x);
        let h = self.knots[k + 1] - self.knots[k];
        let a = (self.knots[k + 1] - x) / h;
        let b = 1.0 - a;
        let curvature = if (0.0..=1.0).contains(&a) {
            ((a.powi(3) - a) * self.second_derivatives[k]
                + (b.powi(3) - b) * self.second_derivatives[k + 1])
                * h
                * h
                / 6.0
        } else {
            0.0
        };
        a * self.values[k] + b * self.values[k + 1] + curvature
    }
}

/// Banded form of `(R + λQᵀQ)γ = Qᵀy` for fixed knots.
struct ReinschSystem<'a> {
    y: &'a [Real],
    q_lower: Vec<Real>,
    q_centre: Vec<Real>,
    q_upper: Vec<Real>,
    r_diagonal: Vec<Real>,
    r_off_diagonal: Vec<Real>,
    qtq_diagonal: Vec<Real>,
    qtq_first: Vec<Real>,
    qtq_second: Vec<Real>,
    qty: Vec<Real>,
}

struct ReinschSolution {
    gamma: Vec<Real>,
    values: Vec<Real>,
    residual: Real,
}

impl<'a> ReinschSystem<'a> {
    fn new(x: &[Real], y: &'a [Real]) -> Self {
        let h: Vec<Real> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let m = x.len() - 2;
        let q_lower: Vec<Real> = (0..m).map(|j| 1.0 / h[j]).collect();
        let q_centre: Vec<Real> = (0..m).map(|j| -1.0 / h[j] - 1.0 / h[j + 1]).collect();
        let q_upper: Vec<Real> = (0..m).map(|j| 1.0 / h[j + 1]).collect();

        let r_diagonal = (0..m).map(|j| (h[j] + h[j + 1]) / 3.0).collect();
        let r_off_diagonal = (0..m.saturating_sub(1)).map(|j| h[j + 1] / 6.0).collect();

        let qtq_diagonal = (0..m)
            .map(|j| q_lower[j].powi(2) + q_centre[j].powi(2) + q_upper[j].powi(2))
            .collect();
        let qtq_first = (0..m.saturating_sub(1))
            .map(|j| q_centre[j] * q_lower[j + 1] + q_upper[j] * q_centre[j + 1])
            .collect();
        let qtq_second = (0..m.saturating_sub(2))
            .map(|j| q_upper[j] * q_lower[j + 2])
            .collect();
        let qty = (0..m)
            .map(|j| q_lower[j] * y[j] + q_centre[j] * y[j + 1] + q_upper[j] * y[j + 2])
            .collect();

        Self {
            y,
            q_lower,
            q_centre,
            q_upper,
            r_diagonal,
            r_off_diagonal,
            qtq_diagonal,
            qtq_first,
            qtq_second,
            qty,
        }
    }

    fn solve(&self, lambda: Real) -> Result<ReinschSolution, SmoothingError> {
        let m = self.qty.len();
        let mut d: Vec<Real> = vec![0.0; m];
        let mut u: Vec<Real> = vec![0.0; m];
        let mut v: Vec<Real> = vec![0.0; m];

        // LDLᵀ factorisation of the pentadiagonal matrix
        for j in 0..m {
            let mut pivot = self.r_diagonal[j] + lambda * self.qtq_diagonal[j];
            if j >= 1 {
                pivot -= u[j - 1].powi(2) * d[j - 1];
            }
            if j >= 2 {
                pivot -= v[j - 2].powi(2) * d[j - 2];
            }
            if pivot.is_nan() || pivot <= 0.0 {
                return Err(SmoothingError::SingularSystem(j));
            }
            d[j] = pivot;
            if j + 1 < m {
                let mut coupling = self.r_off_diagonal[j] + lambda * self.qtq_first[j];
                if j >= 1 {
                    coupling -= v[j - 1] * u[j - 1] * d[j - 1];
                }
                u[j] = coupling / pivot;
            }
            if j + 2 < m {
                v[j] = lambda * self.qtq_second[j] / pivot;
            }
        }

        let mut gamma: Vec<Real> = vec![0.0; m];
        for j in 0..m {
            gamma[j] = self.qty[j];
            if j >= 1 {
                gamma[j] -= u[j - 1] * gamma[j - 1];
            }
            if j >= 2 {
                gamma[j] -= v[j - 2] * gamma[j - 2];
            }
        }
        for j in 0..m {
            gamma[j] /= d[j];
        }
        for j in (0..m).rev() {
            if j + 1 < m {
                gamma[j] -= u[j] * gamma[j + 1];
            }
            if j + 2 < m {
                gamma[j] -= v[j] * gamma[j + 2];
            }
        }

        let mut q_gamma: Vec<Real> = vec![0.0; self.y.len()];
        for j in 0..m {
            q_gamma[j] += self.q_lower[j] * gamma[j];
            q_gamma[j + 1] += self.q_centre[j] * gamma[j];
            q_gamma[j + 2] += self.q_upper[j] * gamma[j];
        }
        let values = self
            .y
            .iter()
            .zip(&q_gamma)
            .map(|(y, qg)| y - lambda * qg)
            .collect();
        let residual = q_gamma.iter().map(|qg| (lambda * qg).powi(2)).sum();

        Ok(ReinschSolution {
            gamma,
            values,
            residual,
        })
    }
}

fn least_squares_line(x: &[Real], y: &[Real]) -> Vec<Real> {
    let n = x.len() as Real;
    let x_mean = x.iter().sum::<Real>() / n;
    let y_mean = y.iter().sum::<Real>() / n;
    let sxx: Real = x.iter().map(|x| (x - x_mean).powi(2)).sum();
    let sxy: Real = x.iter().zip(y).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
    let slope = sxy / sxx;
    x.iter().map(|x| y_mean + slope * (x - x_mean)).collect()
}

fn squared_residual(a: &[Real], b: &[Real]) -> Real {
    a.iter().zip(b).map(|(a, b)| (a - b).powi(2)).sum()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingSpline {
    smoothing_factor: Real,
}

impl Default for SmoothingSpline {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl SmoothingSpline {
    /// `smoothing_factor` is the bound `S` on the sum of squared residuals.
    /// Zero gives the interpolating spline.
    pub fn new(smoothing_factor: Real) -> Self {
        Self { smoothing_factor }
    }

    fn validate(x: &[Real], y: &[Real]) -> Result<(), SmoothingError> {
        if x.len() != y.len() {
            return Err(SmoothingError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(SmoothingError::NonFinite);
        }
        match x.windows(2).position(|w| w[1] <= w[0]) {
            Some(index) => Err(SmoothingError::KnotsNotIncreasing(index + 1)),
            None => Ok(()),
        }
    }

    fn spline_at(
        system: &ReinschSystem,
        x: &[Real],
        lambda: Real,
    ) -> Result<CubicSpline, SmoothingError> {
        let solution = system.solve(lambda)?;
        let mut second_derivatives = Vec::with_capacity(x.len());
        second_derivatives.push(0.0);
        second_derivatives.extend(solution.gamma);
        second_derivatives.push(0.0);
        Ok(CubicSpline {
            knots: x.to_vec(),
            values: solution.values,
            second_derivatives,
        })
    }

    /// Finds the spline whose squared residual equals the smoothing factor,
    /// searching `λ` in log space.
    pub fn fit(&self, x: &[Real], y: &[Real]) -> Result<CubicSpline, SmoothingError> {
        Self::validate(x, y)?;
        if x.len() < 3 {
            return Ok(CubicSpline::piecewise_linear(x, y.to_vec()));
        }
        let system = ReinschSystem::new(x, y);
        let target = self.smoothing_factor;
        if target <= 0.0 {
            return Self::spline_at(&system, x, 0.0);
        }

        let line = least_squares_line(x, y);
        if squared_residual(&line, y) <= target {
            return Ok(CubicSpline::piecewise_linear(x, line));
        }

        let residual = |lambda: Real| system.solve(lambda).map(|solution| solution.residual);

        let mut lambda = 1.0;
        let (mut lower, mut upper) = if residual(lambda)? < target {
            let mut lower = lambda;
            loop {
                lambda *= 10.0;
                if residual(lambda)? >= target {
                    break (lower, lambda);
                }
                lower = lambda;
                if lambda > (10.0 as Real).powi(MAX_BRACKET_STEPS as i32) {
                    return Ok(CubicSpline::piecewise_linear(x, line));
                }
            }
        } else {
            let mut upper = lambda;
            loop {
                lambda /= 10.0;
                if residual(lambda)? <= target {
                    break (lambda, upper);
                }
                upper = lambda;
                if lambda < (10.0 as Real).powi(-(MAX_BRACKET_STEPS as i32)) {
                    return Self::spline_at(&system, x, 0.0);
                }
            }
        };

        for _ in 0..MAX_BISECTIONS {
            let middle = (lower * upper).sqrt();
            if residual(middle)? > target {
                upper = middle;
            } else {
                lower = middle;
            }
            if upper / lower < BISECTION_RATIO {
                break;
            }
        }
        Self::spline_at(&system, x, lower)
    }
}

impl Smoother for SmoothingSpline {
    fn smooth(&self, x: &[Real], y: &[Real]) -> Result<Vec<Real>, SmoothingError> {
        let spline = self.fit(x, y)?;
        Ok(x.iter().map(|&x| spline.evaluate(x)).collect())
    }
}
