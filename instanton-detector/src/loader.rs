//! Reader for the XYZ-like text format written by the simulation.
//!
//! A line holding a single token (the particle count) starts a frame, lines
//! starting with `Atoms.` are comments, and every other non-blank line is
//! `name x y z` for the next particle of the current frame.
use crate::{geometry::Position, trajectory::Trajectory};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use thiserror::Error;
use tracing::{debug, instrument};

const COMMENT_MARKER: &str = "Atoms.";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO Error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Line {line}: particle given before the first frame header")]
    ParticleBeforeFrame { line: usize },
    #[error("Line {line}: frame {frame} has more than {num_particles} particles")]
    TooManyParticles {
        line: usize,
        frame: usize,
        num_particles: usize,
    },
    #[error("Line {line}: expected a name followed by three coordinates")]
    MissingCoordinates { line: usize },
    #[error("Line {line}: invalid coordinate '{token}'")]
    InvalidCoordinate { line: usize, token: String },
}

fn parse_position<'a, I: Iterator<Item = &'a str>>(
    mut tokens: I,
    line: usize,
) -> Result<Position, LoadError> {
    let mut position: Position = [0.0; 3];
    for x in position.iter_mut() {
        let token = tokens.next().ok_or(LoadError::MissingCoordinates { line })?;
        *x = token.parse().map_err(|_| LoadError::InvalidCoordinate {
            line,
            token: token.to_owned(),
        })?;
    }
    Ok(position)
}

/// Reads the first `num_frames` frames. Frames or particles missing from the
/// input are left at the origin.
pub fn read_xyz<R: BufRead>(
    reader: R,
    num_frames: usize,
    num_particles: usize,
) -> Result<Trajectory, LoadError> {
    let mut trajectory = Trajectory::zeros(num_frames, num_particles);
    let mut frame: Option<usize> = None;
    let mut particle = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        let mut tokens = line.split_whitespace().peekable();
        let Some(first) = tokens.next() else {
            continue;
        };
        if first == COMMENT_MARKER {
            continue;
        }
        if tokens.peek().is_none() {
            let next = frame.map_or(0, |frame| frame + 1);
            if next == num_frames {
                break;
            }
            frame = Some(next);
            particle = 0;
            continue;
        }

        let current = frame.ok_or(LoadError::ParticleBeforeFrame { line: line_number })?;
        if particle == num_particles {
            return Err(LoadError::TooManyParticles {
                line: line_number,
                frame: current,
                num_particles,
            });
        }
        let position = parse_position(tokens, line_number)?;
        trajectory.set_position(current, particle, &position);
        particle += 1;
    }
    debug!(frames = frame.map_or(0, |frame| frame + 1), "Read trajectory");
    Ok(trajectory)
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_xyz_file(
    path: &Path,
    num_frames: usize,
    num_particles: usize,
) -> Result<Trajectory, LoadError> {
    read_xyz(BufReader::new(File::open(path)?), num_frames, num_particles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TWO_FRAMES: &str = "2
Atoms. Timestep: 0
A 1.0 2.0 3.0
B -1.5 0.0 2.5
2
Atoms. Timestep: 1

A 1.5 2.0 3.0
B -1.0 0.5 2.5
2
Atoms. Timestep: 2
A 9.0 9.0 9.0
B 9.0 9.0 9.0
";

    #[test]
    fn reads_requested_frames() {
        let trajectory = read_xyz(Cursor::new(TWO_FRAMES), 2, 2).unwrap();
        assert_eq!(trajectory.num_frames(), 2);
        assert_eq!(trajectory.num_particles(), 2);
        assert_eq!(trajectory.path(0).position(0), [1.0, 2.0, 3.0]);
        assert_eq!(trajectory.path(1).position(0), [-1.5, 0.0, 2.5]);
        assert_eq!(trajectory.path(0).position(1), [1.5, 2.0, 3.0]);
        assert_eq!(trajectory.path(1).position(1), [-1.0, 0.5, 2.5]);
    }

    #[test]
    fn missing_frames_stay_at_origin() {
        let trajectory = read_xyz(Cursor::new(TWO_FRAMES), 5, 2).unwrap();
        assert_eq!(trajectory.path(0).position(2), [9.0, 9.0, 9.0]);
        assert_eq!(trajectory.path(0).position(4), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn malformed_lines() {
        assert!(matches!(
            read_xyz(Cursor::new("A 1.0 2.0 3.0\n"), 1, 1),
            Err(LoadError::ParticleBeforeFrame { line: 1 })
        ));
        assert!(matches!(
            read_xyz(Cursor::new("1\nA 1.0 2.0\n"), 1, 1),
            Err(LoadError::MissingCoordinates { line: 2 })
        ));
        assert!(matches!(
            read_xyz(Cursor::new("1\nA 1.0 two 3.0\n"), 1, 1),
            Err(LoadError::InvalidCoordinate { line: 2, .. })
        ));
        assert!(matches!(
            read_xyz(Cursor::new("1\nA 1.0 2.0 3.0\nB 1.0 2.0 3.0\n"), 1, 1),
            Err(LoadError::TooManyParticles { line: 3, frame: 0, .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("trajectory-{}.xyz", std::process::id()));
        std::fs::write(&path, TWO_FRAMES).unwrap();
        let trajectory = load_xyz_file(&path, 3, 2);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(trajectory.unwrap().num_frames(), 3);
        assert!(load_xyz_file(&path, 3, 2).is_err());
    }
}
