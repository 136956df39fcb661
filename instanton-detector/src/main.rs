use anyhow::Result;
use clap::Parser;
use instanton_common::{
    FileId, init_tracer,
    metrics::{
        component_info_metric,
        failures::{self, FailureKind},
        names::{EVENTS_DETECTED, FAILURES, FILES_PROCESSED, PARTICLES_PROCESSED},
    },
    tracer::TracerOptions,
};
use instanton_detector::{
    DetectionResult, DetectorError, DetectorParameters, DetectorResult, detect_file,
    save_to_file::SaveToFileFilter,
};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};

// cargo run --bin instanton-detector -- --frames 1000 --particles 500 --time-window 20 --threshold 1.0 --box-length 12.5 "runs/*.xyz"

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Trajectory files or glob patterns. Files are numbered in sorted order, from 0.
    #[clap(required = true)]
    inputs: Vec<String>,

    /// Number of frames to read from each file.
    #[clap(long)]
    frames: usize,

    /// Number of particles in each frame.
    #[clap(long)]
    particles: usize,

    #[clap(flatten)]
    parameters: DetectorParameters,

    /// If set, each position is replaced by its average over this many frames either side.
    #[clap(long)]
    coarse_grain: Option<usize>,

    #[clap(long, default_value = "instantons.csv")]
    output: PathBuf,

    #[clap(long, default_value = "failures.csv")]
    failures_output: PathBuf,

    /// If set, Prometheus metrics are served on this address.
    #[clap(long, env)]
    observability_address: Option<SocketAddr>,

    /// Used when RUST_LOG is not set.
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

/// Expands each pattern, keeping patterns that match nothing as literal paths.
fn expand_inputs(inputs: &[String]) -> DetectorResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in inputs {
        let matches = glob::glob(pattern)?.collect::<Result<Vec<_>, _>>()?;
        if matches.is_empty() {
            files.push(PathBuf::from(pattern));
        } else {
            files.extend(matches);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn describe_metrics() {
    metrics::describe_counter!(
        FILES_PROCESSED,
        metrics::Unit::Count,
        "Number of trajectory files processed"
    );
    metrics::describe_counter!(
        PARTICLES_PROCESSED,
        metrics::Unit::Count,
        "Number of particles scanned for instantons"
    );
    metrics::describe_counter!(
        EVENTS_DETECTED,
        metrics::Unit::Count,
        "Number of instantons detected"
    );
    metrics::describe_counter!(
        FAILURES,
        metrics::Unit::Count,
        "Number of failures encountered"
    );
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let tracer = init_tracer!(TracerOptions {
        default_level: args.log_level,
    });

    if let Some(address) = args.observability_address {
        PrometheusBuilder::new()
            .with_http_listener(address)
            .install()?;
    }
    component_info_metric("instanton-detector");
    describe_metrics();

    let delta = args.coarse_grain.unwrap_or_default();
    args.parameters
        .validate(args.frames.saturating_sub(2 * delta))?;

    let files = expand_inputs(&args.inputs)?;
    info!(service = tracer.service_name(), files = files.len(), "Starting detection");

    let mut total = DetectionResult::default();
    for (index, path) in files.iter().enumerate() {
        let file_id = FileId::try_from(index)?;
        match detect_file(
            path,
            file_id,
            args.frames,
            args.particles,
            &args.parameters,
            args.coarse_grain,
        ) {
            Ok(result) => total.append(result),
            Err(DetectorError::Load(e)) => {
                warn!("Skipping {}: {e}", path.display());
                counter!(FAILURES, &[failures::get_label(FailureKind::FileReadFailed)])
                    .increment(1);
            }
            Err(e) => return Err(e.into()),
        }
    }

    total.events.iter().save_to_file(&args.output)?;
    std::iter::once(total.failures).save_to_file(&args.failures_output)?;
    info!(
        events = total.events.len(),
        fit_failed = total.failures.fit_failed,
        too_wide = total.failures.too_wide,
        output = %args.output.display(),
        "Finished"
    );
    Ok(())
}
