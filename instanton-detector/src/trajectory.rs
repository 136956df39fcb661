use crate::{
    error::{DetectorError, DetectorResult},
    geometry::{DIMENSIONS, PeriodicBox, Position},
    parameters::ParameterError,
};
use instanton_common::{FrameIndex, ParticleIndex, Real};
use ndarray::{Array3, ArrayView2, Axis};

/// Coordinates of every particle at every frame, stored as `(frames, particles, 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    coordinates: Array3<Real>,
}

impl Trajectory {
    pub fn new(coordinates: Array3<Real>) -> DetectorResult<Self> {
        if coordinates.shape()[2] != DIMENSIONS {
            return Err(DetectorError::TrajectoryShape(coordinates.shape().to_vec()));
        }
        Ok(Self { coordinates })
    }

    /// A trajectory with every particle at the origin in every frame.
    pub fn zeros(num_frames: usize, num_particles: usize) -> Self {
        Self {
            coordinates: Array3::zeros((num_frames, num_particles, DIMENSIONS)),
        }
    }

    pub(crate) fn set_position(
        &mut self,
        frame: FrameIndex,
        particle: ParticleIndex,
        position: &Position,
    ) {
        for (axis, &x) in position.iter().enumerate() {
            self.coordinates[[frame, particle, axis]] = x;
        }
    }

    /// Builds a trajectory from one position series per particle.
    pub fn from_paths(paths: &[Vec<Position>]) -> DetectorResult<Self> {
        let num_frames = paths.first().map(Vec::len).unwrap_or_default();
        if paths.iter().any(|path| path.len() != num_frames) {
            return Err(DetectorError::RaggedPaths);
        }
        let mut trajectory = Self::zeros(num_frames, paths.len());
        for (particle, path) in paths.iter().enumerate() {
            for (frame, position) in path.iter().enumerate() {
                trajectory.set_position(frame, particle, position);
            }
        }
        Ok(trajectory)
    }

    pub fn num_frames(&self) -> usize {
        self.coordinates.len_of(Axis(0))
    }

    pub fn num_particles(&self) -> usize {
        self.coordinates.len_of(Axis(1))
    }

    /// Borrowed view of one particle across all frames.
    ///
    /// # Panics
    /// If `particle` is not less than `num_particles()`.
    pub fn path(&self, particle: ParticleIndex) -> ParticlePath<'_> {
        ParticlePath {
            positions: self.coordinates.index_axis(Axis(1), particle),
        }
    }

    /// Replaces every position with its periodic-aware moving average over
    /// `2 * delta + 1` frames. The first and last `delta` frames are dropped.
    pub fn coarse_grain(&self, delta: usize, periodic_box: &PeriodicBox) -> DetectorResult<Self> {
        let num_frames = self.num_frames();
        if num_frames <= 2 * delta {
            return Err(ParameterError::CoarseGrainTooLong { delta, num_frames }.into());
        }
        let span = (2 * delta + 1) as Real;
        let mut coordinates =
            Array3::zeros((num_frames - 2 * delta, self.num_particles(), DIMENSIONS));

        for particle in 0..self.num_particles() {
            let path = self.path(particle);
            for frame in delta..(num_frames - delta) {
                let centre = path.position(frame);
                let mut total: Position = [0.0; DIMENSIONS];
                for neighbour in (frame - delta)..=(frame + delta) {
                    let step = periodic_box.displacement(&path.position(neighbour), &centre);
                    for axis in 0..DIMENSIONS {
                        total[axis] += step[axis];
                    }
                }
                for axis in 0..DIMENSIONS {
                    coordinates[[frame - delta, particle, axis]] = centre[axis] + total[axis] / span;
                }
            }
        }
        Ok(Self { coordinates })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParticlePath<'a> {
    positions: ArrayView2<'a, Real>,
}

impl ParticlePath<'_> {
    pub fn len(&self) -> usize {
        self.positions.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self, frame: FrameIndex) -> Position {
        let row = self.positions.row(frame);
        [row[0], row[1], row[2]]
    }

    /// Squared minimum-image distance between two frames of this path.
    pub fn squared_distance(&self, i: FrameIndex, j: FrameIndex, periodic_box: &PeriodicBox) -> Real {
        periodic_box.squared_distance_to_point(&self.position(i), &self.position(j))
    }

    /// Distance of every frame from the position held at `center`.
    pub fn displacement_series(&self, center: FrameIndex, periodic_box: &PeriodicBox) -> Vec<Real> {
        self.distance_series_to_point(&self.position(center), periodic_box)
    }

    /// Distance of every frame from an arbitrary reference point.
    pub fn distance_series_to_point(
        &self,
        reference: &Position,
        periodic_box: &PeriodicBox,
    ) -> Vec<Real> {
        (0..self.len())
            .map(|frame| {
                periodic_box
                    .squared_distance_to_point(&self.position(frame), reference)
                    .sqrt()
            })
            .collect()
    }
}
