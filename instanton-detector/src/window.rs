//! Averages of a particle path over windows of consecutive frames.
use crate::{
    geometry::{DIMENSIONS, PeriodicBox, Position, squared_norm},
    trajectory::ParticlePath,
};
use instanton_common::{FrameIndex, Real};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("Window {0:?} contains no frames")]
    Empty(Range<FrameIndex>),
    #[error("Window {range:?} exceeds path of {len} frames")]
    OutOfBounds {
        range: Range<FrameIndex>,
        len: usize,
    },
}

fn check_window(path: &ParticlePath, frames: &Range<FrameIndex>) -> Result<(), WindowError> {
    if frames.is_empty() {
        Err(WindowError::Empty(frames.clone()))
    } else if frames.end > path.len() {
        Err(WindowError::OutOfBounds {
            range: frames.clone(),
            len: path.len(),
        })
    } else {
        Ok(())
    }
}

fn mean_of<I: Iterator<Item = Position>>(vectors: I, count: usize) -> Position {
    let mut total: Position = [0.0; DIMENSIONS];
    for vector in vectors {
        for axis in 0..DIMENSIONS {
            total[axis] += vector[axis];
        }
    }
    total.map(|x| x / count as Real)
}

/// Mean of the folded positions in `frames`.
pub fn average_position(
    path: &ParticlePath,
    frames: Range<FrameIndex>,
    periodic_box: &PeriodicBox,
) -> Result<Position, WindowError> {
    check_window(path, &frames)?;
    let count = frames.len();
    Ok(mean_of(
        frames.map(|frame| periodic_box.fold(&path.position(frame))),
        count,
    ))
}

/// Squared norm of the (folded) difference between the mean displacements,
/// relative to the `reference` frame, of two windows.
pub fn average_displacement_between_windows(
    path: &ParticlePath,
    first: Range<FrameIndex>,
    second: Range<FrameIndex>,
    reference: FrameIndex,
    periodic_box: &PeriodicBox,
) -> Result<Real, WindowError> {
    check_window(path, &first)?;
    check_window(path, &second)?;
    check_window(path, &(reference..reference + 1))?;

    let origin = path.position(reference);
    let window_mean = |frames: Range<FrameIndex>| {
        let count = frames.len();
        periodic_box.fold(&mean_of(
            frames.map(|frame| periodic_box.displacement(&path.position(frame), &origin)),
            count,
        ))
    };
    let difference = periodic_box.displacement(&window_mean(first), &window_mean(second));
    Ok(squared_norm(&difference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::Trajectory;
    use assert_approx_eq::assert_approx_eq;

    fn step_trajectory() -> Trajectory {
        let path = (0..10)
            .map(|t| if t < 5 { [1.0, 1.0, 1.0] } else { [3.0, 1.0, 1.0] })
            .collect();
        Trajectory::from_paths(&[path]).unwrap()
    }

    #[test]
    fn average_of_stationary_window() {
        let trajectory = step_trajectory();
        let mean = average_position(&trajectory.path(0), 0..5, &PeriodicBox::new(20.0)).unwrap();
        assert_eq!(mean, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn average_across_step() {
        let trajectory = step_trajectory();
        let mean = average_position(&trajectory.path(0), 3..7, &PeriodicBox::new(20.0)).unwrap();
        assert_approx_eq!(mean[0], 2.0);
    }

    #[test]
    fn displacement_between_windows_of_step() {
        let trajectory = step_trajectory();
        let periodic_box = PeriodicBox::new(20.0);
        let path = trajectory.path(0);
        let jump = average_displacement_between_windows(&path, 0..5, 5..10, 5, &periodic_box);
        assert_approx_eq!(jump.unwrap(), 4.0);
        let flat = average_displacement_between_windows(&path, 0..3, 2..5, 0, &periodic_box);
        assert_approx_eq!(flat.unwrap(), 0.0);
    }

    #[test]
    fn displacement_between_windows_wraps() {
        let path = (0..4)
            .map(|t| if t < 2 { [4.9, 0.0, 0.0] } else { [-4.9, 0.0, 0.0] })
            .collect();
        let trajectory = Trajectory::from_paths(&[path]).unwrap();
        let jump = average_displacement_between_windows(
            &trajectory.path(0),
            0..2,
            2..4,
            0,
            &PeriodicBox::new(10.0),
        );
        assert_approx_eq!(jump.unwrap(), 0.04);
    }

    #[test]
    fn empty_window_is_an_error() {
        let trajectory = step_trajectory();
        let periodic_box = PeriodicBox::new(20.0);
        assert_eq!(
            average_position(&trajectory.path(0), 4..4, &periodic_box),
            Err(WindowError::Empty(4..4))
        );
        assert!(matches!(
            average_displacement_between_windows(&trajectory.path(0), 0..5, 8..12, 0, &periodic_box),
            Err(WindowError::OutOfBounds { len: 10, .. })
        ));
    }
}
