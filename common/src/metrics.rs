use metrics::{describe_gauge, gauge};

pub fn component_info_metric(name: &'static str) {
    static NAME: &str = "instanton_detector_component_info";

    describe_gauge!(NAME, "Basic information about the component");

    let git_rev = option_env!("GIT_VERSION").unwrap_or("unknown");
    gauge!(NAME, "component" => name, "git_version" => git_rev).set(1);
}

pub mod names {
    use const_format::concatcp;

    pub const METRIC_NAME_PREFIX: &str = "instanton_detector_";

    pub const FAILURES: &str = concatcp!(METRIC_NAME_PREFIX, "failures");
    pub const FILES_PROCESSED: &str = concatcp!(METRIC_NAME_PREFIX, "files_processed");
    pub const PARTICLES_PROCESSED: &str = concatcp!(METRIC_NAME_PREFIX, "particles_processed");
    pub const EVENTS_DETECTED: &str = concatcp!(METRIC_NAME_PREFIX, "events_detected");
}

pub mod particles_processed {
    #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
    pub enum ParticleKind {
        GatedOut,
        NoCandidate,
        Candidate,
    }

    // Label building function
    pub fn get_label(particle_kind: ParticleKind) -> (&'static str, &'static str) {
        (
            "particle_kind",
            match particle_kind {
                ParticleKind::GatedOut => "gated_out",
                ParticleKind::NoCandidate => "no_candidate",
                ParticleKind::Candidate => "candidate",
            },
        )
    }
}

pub mod failures {
    #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
    pub enum FailureKind {
        FitFailed,
        TooWide,
        FileReadFailed,
    }

    // Label building function
    pub fn get_label(failure_kind: FailureKind) -> (&'static str, &'static str) {
        (
            "failure_kind",
            match failure_kind {
                FailureKind::FitFailed => "fit_failed",
                FailureKind::TooWide => "too_wide",
                FailureKind::FileReadFailed => "file_read_failed",
            },
        )
    }
}
