use crate::{
    loader::LoadError,
    parameters::ParameterError,
    window::WindowError,
};
use glob::{GlobError, PatternError};
use thiserror::Error;

pub type DetectorResult<T> = Result<T, DetectorError>;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Parameter Error: {0}")]
    Parameter(#[from] ParameterError),
    #[error("Load Error: {0}")]
    Load(#[from] LoadError),
    #[error("Window Error: {0}")]
    Window(#[from] WindowError),
    #[error("Trajectory shape {0:?} is not (frames, particles, 3)")]
    TrajectoryShape(Vec<usize>),
    #[error("Particle paths have differing numbers of frames")]
    RaggedPaths,
    #[error("Glob Pattern Error: {0}")]
    GlobPattern(#[from] PatternError),
    #[error("Glob Error: {0}")]
    Glob(#[from] GlobError),
}
