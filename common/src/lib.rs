pub mod metrics;
pub mod tracer;

/// Scalar type used for coordinates, times and fit parameters.
pub type Real = f64;

pub type FrameIndex = usize;
pub type ParticleIndex = usize;

/// Identifies an input file by its position in the (sorted) input list.
pub type FileId = u32;
