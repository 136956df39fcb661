//! Detection of instantons: short-lived, localised large displacements of
//! individual particles in a trajectory simulated inside a cubic periodic box.
//!
//! Typical usage, for a trajectory already held in memory:
//! ```ignore
//! let parameters = DetectorParameters::new(20, 1.0, 50.0);
//! let result = detect(&trajectory, file_id, &parameters)?;
//! for event in result.events.iter() {
//!     println!("{event}");
//! }
//! ```
pub mod detection;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod parameters;
pub mod processing;
pub mod save_to_file;
pub mod trajectory;
pub mod window;

pub use detection::{EventTable, ExcitationEvent, FailureCount};
pub use error::{DetectorError, DetectorResult};
pub use geometry::{PeriodicBox, Position};
pub use parameters::DetectorParameters;
pub use processing::{DetectionResult, ParticleOutcome, detect, detect_file, detect_with};
pub use trajectory::{ParticlePath, Trajectory};
