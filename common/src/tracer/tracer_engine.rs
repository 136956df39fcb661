use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

pub struct TracerOptions {
    /// Level used when `RUST_LOG` is not set.
    pub default_level: LevelFilter,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            default_level: LevelFilter::INFO,
        }
    }
}

/// This object initialises the stdout tracer, given a TracerOptions struct.
pub struct TracerEngine {
    service_name: String,
}

impl TracerEngine {
    /// Initialises the stdout tracer for the crate
    /// #Arguments
    /// * `options` - The caller-specified instance of TracerOptions.
    /// * `service_name` - The name of the component owning the tracer.
    /// #Returns
    /// An instance of TracerEngine
    pub fn new(options: TracerOptions, service_name: &str) -> Self {
        let stdout_tracer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false);

        // This filter is applied to the stdout tracer
        let log_filter = EnvFilter::builder()
            .with_default_directive(options.default_level.into())
            .from_env_lossy();

        let subscriber =
            tracing_subscriber::Registry::default().with(stdout_tracer.with_filter(log_filter));

        // Ignored if a global subscriber already exists
        let _ = tracing::subscriber::set_global_default(subscriber);

        Self {
            service_name: service_name.to_owned(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}
