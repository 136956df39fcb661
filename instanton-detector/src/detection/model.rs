use super::fitting::{Bounds, ParametricModel};
use instanton_common::Real;

/// `c1 · tanh((t − t0) / a) + c2`, parameters ordered `[c1, t0, a, c2]`.
#[derive(Default, Debug, Clone, Copy)]
pub struct TanhModel;

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct TanhParameters {
    /// Half the height of the transition, `c1`.
    pub amplitude: Real,
    /// `t0`
    pub center: Real,
    /// Half the duration of the transition, `a`.
    pub width: Real,
    /// `c2`
    pub offset: Real,
}

impl TanhParameters {
    pub fn to_array(&self) -> [Real; 4] {
        [self.amplitude, self.center, self.width, self.offset]
    }

    pub fn from_slice(parameters: &[Real]) -> Option<Self> {
        match *parameters {
            [amplitude, center, width, offset] => Some(Self {
                amplitude,
                center,
                width,
                offset,
            }),
            _ => None,
        }
    }

    /// Full duration of the transition, `2a`.
    pub fn duration(&self) -> Real {
        2.0 * self.width
    }

    /// Full height of the transition, `2c1`.
    pub fn height(&self) -> Real {
        2.0 * self.amplitude
    }
}

impl TanhModel {
    /// Free amplitude and offset, non-negative centre and width.
    pub fn bounds() -> Bounds {
        Bounds {
            lower: vec![Real::NEG_INFINITY, 0.0, 0.0, Real::NEG_INFINITY],
            upper: vec![Real::INFINITY; 4],
        }
    }
}

impl ParametricModel for TanhModel {
    fn num_parameters(&self) -> usize {
        4
    }

    fn evaluate(&self, t: Real, parameters: &[Real]) -> Real {
        let [c1, t0, a, c2] = [parameters[0], parameters[1], parameters[2], parameters[3]];
        c1 * ((t - t0) / a).tanh() + c2
    }

    fn gradient(&self, t: Real, parameters: &[Real], gradient: &mut [Real]) {
        let [c1, t0, a] = [parameters[0], parameters[1], parameters[2]];
        let u = (t - t0) / a;
        let tanh = u.tanh();
        let sech2 = 1.0 - tanh * tanh;
        gradient[0] = tanh;
        gradient[1] = -c1 * sech2 / a;
        gradient[2] = -c1 * sech2 * u / a;
        gradient[3] = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn gradient_matches_finite_differences() {
        let parameters = [1.5, 10.0, 3.0, -0.5];
        let mut gradient = [0.0; 4];
        TanhModel.gradient(11.0, &parameters, &mut gradient);
        for k in 0..4 {
            let mut shifted = parameters;
            shifted[k] += 1e-6;
            let numeric = (TanhModel.evaluate(11.0, &shifted)
                - TanhModel.evaluate(11.0, &parameters))
                / 1e-6;
            assert_approx_eq!(gradient[k], numeric, 1e-5);
        }
    }

    #[test]
    fn parameters_round_trip_through_slices() {
        let parameters = TanhParameters::from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(parameters.to_array(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(parameters.duration(), 6.0);
        assert_eq!(parameters.height(), 2.0);
        assert_eq!(TanhParameters::from_slice(&[1.0]), None);
    }
}
