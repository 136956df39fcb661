//! Minimum-image arithmetic in a cubic periodic box centred at the origin.
use instanton_common::Real;

pub const DIMENSIONS: usize = 3;

pub type Position = [Real; DIMENSIONS];

pub fn squared_norm(vector: &Position) -> Real {
    vector.iter().map(|x| x * x).sum()
}

pub fn difference(a: &Position, b: &Position) -> Position {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    length: Real,
}

impl PeriodicBox {
    pub fn new(length: Real) -> Self {
        Self { length }
    }

    /// Folds a single component into `[-L/2, L/2)`.
    ///
    /// Only one correction is applied, so the input must lie in `[-3L/2, 3L/2)`.
    pub fn fold_component(&self, x: Real) -> Real {
        let half = self.length / 2.0;
        if x >= half {
            x - self.length
        } else if x < -half {
            x + self.length
        } else {
            x
        }
    }

    /// Applies the minimum-image convention to each axis independently.
    pub fn fold(&self, vector: &Position) -> Position {
        vector.map(|x| self.fold_component(x))
    }

    /// Folded difference `a - b`.
    pub fn displacement(&self, a: &Position, b: &Position) -> Position {
        self.fold(&difference(a, b))
    }

    pub fn squared_distance_to_point(&self, point: &Position, reference: &Position) -> Real {
        squared_norm(&self.displacement(point, reference))
    }
}
