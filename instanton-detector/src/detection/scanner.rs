use crate::{
    geometry::PeriodicBox,
    trajectory::ParticlePath,
    window::{WindowError, average_displacement_between_windows},
};
use instanton_common::{FrameIndex, ParticleIndex, Real};
use tracing::trace;

/// The most likely midpoint of an excitation, together with the estimated
/// number of frames the particle spent away from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub particle: ParticleIndex,
    pub center: FrameIndex,
    pub delta: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The particle ends up where it started.
    GatedOut,
    NoCandidate,
    Found(Candidate),
}

/// Spread of the frames within half a threshold of the window centre.
///
/// Index 0 is always counted as a crossing, but never as the first one.
/// Returns `None` when no other index lies below `half_threshold`.
pub(crate) fn half_threshold_spread(local: &[Real], half_threshold: Real) -> Option<usize> {
    let crossings = local
        .iter()
        .enumerate()
        .filter(|&(_, &distance)| distance < half_threshold)
        .map(|(index, _)| index);

    let last = crossings.clone().max().unwrap_or_default() + 1;
    let first = crossings.filter(|&index| index != 0).min()?;
    Some(last - first)
}

#[derive(Default, Debug, Clone)]
pub struct CandidateScanner {
    time_window: usize,
    threshold: Real,
    periodic_box: PeriodicBox,
}

impl CandidateScanner {
    pub fn new(time_window: usize, threshold: Real, periodic_box: PeriodicBox) -> Self {
        Self {
            time_window,
            threshold,
            periodic_box,
        }
    }

    /// True if the first and last windows of the path are further than the
    /// threshold apart.
    pub fn passes_gate(&self, path: &ParticlePath) -> Result<bool, WindowError> {
        let ta = self.time_window;
        let end = path.len().saturating_sub(1);
        let jump = average_displacement_between_windows(
            path,
            0..ta,
            end.saturating_sub(ta)..end,
            0,
            &self.periodic_box,
        )?;
        Ok(jump > self.threshold * self.threshold)
    }

    /// The delta estimate at `frame`, or `None` if the windows either side
    /// of it do not differ by more than the threshold.
    pub fn candidate_at(
        &self,
        path: &ParticlePath,
        frame: FrameIndex,
    ) -> Result<Option<usize>, WindowError> {
        let ta = self.time_window;
        let jump = average_displacement_between_windows(
            path,
            frame.saturating_sub(ta)..frame,
            frame..(frame + ta),
            frame,
            &self.periodic_box,
        )?;
        if jump <= self.threshold * self.threshold {
            return Ok(None);
        }
        let series = path.displacement_series(frame, &self.periodic_box);
        Ok(series
            .get(frame.saturating_sub(ta)..(frame + ta))
            .and_then(|local| half_threshold_spread(local, self.threshold / 2.0)))
    }

    /// Finds the candidate with the smallest delta estimate; ties keep the
    /// earliest frame.
    pub fn scan(
        &self,
        particle: ParticleIndex,
        path: &ParticlePath,
    ) -> Result<ScanOutcome, WindowError> {
        if !self.passes_gate(path)? {
            return Ok(ScanOutcome::GatedOut);
        }

        let ta = self.time_window;
        let mut best: Option<Candidate> = None;
        for center in ta..path.len().saturating_sub(ta) {
            let Some(delta) = self.candidate_at(path, center)? else {
                continue;
            };
            if best.is_none_or(|best| delta < best.delta) {
                trace!(particle, center, delta, "Improved candidate");
                best = Some(Candidate {
                    particle,
                    center,
                    delta,
                });
            }
        }
        Ok(best.map_or(ScanOutcome::NoCandidate, ScanOutcome::Found))
    }
}
