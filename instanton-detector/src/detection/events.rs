use super::model::TanhParameters;
use instanton_common::{FileId, ParticleIndex, Real};
use std::{
    fmt::{Display, Formatter},
    ops::AddAssign,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExcitationEvent {
    pub file_id: FileId,
    pub particle_id: ParticleIndex,
    /// Fitted centre of the transition, in frames.
    pub t_0: Real,
    /// Fitted duration, twice the tanh width.
    pub deltat: Real,
    /// Fitted height, twice the tanh amplitude.
    pub amplitude: Real,
}

impl ExcitationEvent {
    pub fn new(file_id: FileId, particle_id: ParticleIndex, parameters: &TanhParameters) -> Self {
        Self {
            file_id,
            particle_id,
            t_0: parameters.center,
            deltat: parameters.duration(),
            amplitude: parameters.height(),
        }
    }
}

impl Display for ExcitationEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{0},{1},{2},{3},{4}",
            self.file_id, self.particle_id, self.t_0, self.deltat, self.amplitude
        )
    }
}

/// Events in the order they were detected.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct EventTable {
    events: Vec<ExcitationEvent>,
}

impl EventTable {
    pub fn push(&mut self, event: ExcitationEvent) {
        self.events.push(event);
    }

    pub fn append(&mut self, other: &mut EventTable) {
        self.events.append(&mut other.events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExcitationEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[ExcitationEvent] {
        &self.events
    }
}

impl<'a> IntoIterator for &'a EventTable {
    type Item = &'a ExcitationEvent;
    type IntoIter = std::slice::Iter<'a, ExcitationEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<ExcitationEvent> for EventTable {
    fn from_iter<T: IntoIterator<Item = ExcitationEvent>>(iter: T) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

/// Candidates which did not become events.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCount {
    pub fit_failed: usize,
    pub too_wide: usize,
}

impl FailureCount {
    pub fn as_array(&self) -> [usize; 2] {
        [self.fit_failed, self.too_wide]
    }
}

impl AddAssign for FailureCount {
    fn add_assign(&mut self, rhs: Self) {
        self.fit_failed += rhs.fit_failed;
        self.too_wide += rhs.too_wide;
    }
}

impl Display for FailureCount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0},{1}", self.fit_failed, self.too_wide)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(particle_id: ParticleIndex) -> ExcitationEvent {
        ExcitationEvent::new(
            3,
            particle_id,
            &TanhParameters {
                amplitude: 1.25,
                center: 50.5,
                width: 4.0,
                offset: 0.0,
            },
        )
    }

    #[test]
    fn event_row() {
        assert_eq!(event(7).to_string(), "3,7,50.5,8,2.5");
    }

    #[test]
    fn tables_append_in_order() {
        let mut table: EventTable = [event(0), event(2)].into_iter().collect();
        let mut other = EventTable::default();
        other.push(event(1));
        table.append(&mut other);
        assert!(other.is_empty());
        let particles: Vec<_> = table.iter().map(|e| e.particle_id).collect();
        assert_eq!(particles, vec![0, 2, 1]);
    }

    #[test]
    fn failures_accumulate() {
        let mut failures = FailureCount {
            fit_failed: 1,
            too_wide: 0,
        };
        failures += FailureCount {
            fit_failed: 2,
            too_wide: 5,
        };
        assert_eq!(failures.as_array(), [3, 5]);
        assert_eq!(failures.to_string(), "3,5");
    }
}
