mod tracer_engine;

pub use tracer_engine::{TracerEngine, TracerOptions};

/// Should be called at the start of each component.
/// The binary name is used as the service name attached to the engine.
#[macro_export]
macro_rules! init_tracer {
    ($options:expr) => {{ $crate::tracer::TracerEngine::new($options, env!("CARGO_BIN_NAME")) }};
}
