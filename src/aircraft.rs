use crate::flight::{FlightDirection, Phase};
use crate::limits::SpeedLimits;
use crate::time::Time;
use crate::violation::{FineSchedule, Violation};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tabled::Tabled;

pub type AircraftId = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AircraftClass {
    Commercial,
    Cargo,
    Emergency,
}

impl AircraftClass {
    /// Runway priority, lower is served first.
    pub fn priority(self) -> u32 {
        match self {
            AircraftClass::Emergency => 0,
            AircraftClass::Commercial => 1,
            AircraftClass::Cargo => 2,
        }
    }
}

impl fmt::Display for AircraftClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AircraftClass::Commercial => write!(f, "COMMERCIAL"),
            AircraftClass::Cargo => write!(f, "CARGO"),
            AircraftClass::Emergency => write!(f, "EMERGENCY"),
        }
    }
}

#[derive(Debug)]
struct AircraftState {
    phase: Phase,
    speed: u32,
    active: bool,
    violation_issued: bool,
    completed: usize,
    history: Vec<Phase>,
}

/// One aircraft. Identity is immutable; everything else sits behind a single
/// lock so a reader never sees a phase paired with another phase's speed.
#[derive(Debug)]
pub struct Aircraft {
    pub id: AircraftId,
    pub class: AircraftClass,
    pub direction: FlightDirection,
    state: Mutex<AircraftState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct AircraftSnapshot {
    #[tabled(rename = "Flight")]
    pub id: AircraftId,
    #[tabled(rename = "Class")]
    pub class: AircraftClass,
    #[tabled(rename = "Direction")]
    pub direction: FlightDirection,
    #[tabled(rename = "Phase")]
    pub phase: Phase,
    #[tabled(rename = "Speed (km/h)")]
    pub speed: u32,
    #[tabled(rename = "Progress")]
    pub progress: usize,
    #[tabled(rename = "Active")]
    pub active: bool,
    #[tabled(rename = "AVN")]
    pub violation_issued: bool,
}

impl Aircraft {
    pub fn new(id: AircraftId, class: AircraftClass, direction: FlightDirection) -> Self {
        Aircraft {
            id,
            class,
            direction,
            state: Mutex::new(AircraftState {
                phase: direction.phases()[0],
                speed: 0,
                active: true,
                violation_issued: false,
                completed: 0,
                history: Vec::with_capacity(direction.phases().len()),
            }),
        }
    }

    /// Enters the next phase of the sequence with a speed drawn by `sample`
    /// while the lock is held. Returns `None` once the sequence is exhausted.
    pub fn advance<F>(&self, sample: F) -> Option<(Phase, u32)>
    where
        F: FnOnce(FlightDirection, Phase) -> u32,
    {
        let mut state = self.state.lock();
        let phase = *self.direction.phases().get(state.history.len())?;
        let speed = sample(self.direction, phase);
        state.phase = phase;
        state.speed = speed;
        state.history.push(phase);
        Some((phase, speed))
    }

    pub fn complete_phase(&self) {
        let mut state = self.state.lock();
        state.completed = state.history.len();
    }

    /// Marks the aircraft terminal. Nothing is audited afterwards.
    pub fn retire(&self) {
        self.state.lock().active = false;
    }

    /// Checks the current speed against its legal band and, on the first
    /// excursion, flips the violation flag and returns the event.
    ///
    /// Check and flag update happen under the same lock the flight actor
    /// writes with, so at most one event is ever produced per aircraft.
    pub fn audit(&self, limits: &SpeedLimits, fines: &FineSchedule, at: Time) -> Option<Violation> {
        let mut state = self.state.lock();
        if state.violation_issued || !state.active || state.history.is_empty() {
            return None;
        }
        let band = limits.band(self.direction, state.phase)?;
        if band.contains(state.speed) {
            return None;
        }
        state.violation_issued = true;
        Some(Violation {
            id: self.id.clone(),
            class: self.class,
            phase: state.phase,
            speed: state.speed,
            reason: format!(
                "Speed violation in phase {}: {} km/h outside {}",
                state.phase, state.speed, band
            ),
            fine: fines.fine_for(self.class),
            at,
        })
    }

    pub fn snapshot(&self) -> AircraftSnapshot {
        let state = self.state.lock();
        AircraftSnapshot {
            id: self.id.clone(),
            class: self.class,
            direction: self.direction,
            phase: state.phase,
            speed: state.speed,
            progress: state.completed,
            active: state.active,
            violation_issued: state.violation_issued,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    #[cfg(test)]
    pub fn violation_issued(&self) -> bool {
        self.state.lock().violation_issued
    }

    pub fn entered(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Phases entered so far, in order.
    #[cfg(test)]
    pub fn history(&self) -> Vec<Phase> {
        self.state.lock().history.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::FlightDirection::{Arrival, Departure};
    use crate::flight::Phase::{Approach, Gate, Holding};

    fn aircraft(class: AircraftClass, direction: FlightDirection) -> Aircraft {
        Aircraft::new(Arc::from("PK303"), class, direction)
    }

    #[test]
    fn test_priority_order() {
        assert!(AircraftClass::Emergency.priority() < AircraftClass::Commercial.priority());
        assert!(AircraftClass::Commercial.priority() < AircraftClass::Cargo.priority());
    }

    #[test]
    fn test_initial_state() {
        let ac = aircraft(AircraftClass::Cargo, Departure);
        let snapshot = ac.snapshot();
        assert_eq!(Gate, snapshot.phase);
        assert_eq!(0, snapshot.speed);
        assert!(snapshot.active);
        assert!(!snapshot.violation_issued);
        assert!(ac.history().is_empty());
    }

    #[test]
    fn test_advance_walks_sequence_then_stops() {
        let ac = aircraft(AircraftClass::Commercial, Arrival);
        let mut seen = vec![];
        while let Some((phase, _)) = ac.advance(|_, _| 10) {
            ac.complete_phase();
            seen.push(phase);
        }
        assert_eq!(Arrival.phases(), seen.as_slice());
        assert_eq!(Arrival.phases(), ac.history().as_slice());
        assert_eq!(5, ac.snapshot().progress);
        assert_eq!(None, ac.advance(|_, _| 10));
    }

    #[test]
    fn test_not_audited_before_first_phase() {
        let ac = aircraft(AircraftClass::Commercial, Arrival);
        let limits = SpeedLimits::default();
        assert_eq!(None, ac.audit(&limits, &FineSchedule::default(), Time(0)));
    }

    #[test]
    fn test_audit_fires_once() {
        let ac = aircraft(AircraftClass::Commercial, Arrival);
        let limits = SpeedLimits::default();
        let fines = FineSchedule::default();

        ac.advance(|_, _| 650);
        let violation = ac.audit(&limits, &fines, Time(10)).unwrap();
        assert_eq!(Holding, violation.phase);
        assert_eq!(650, violation.speed);
        assert_eq!(5000, violation.fine);
        assert!(violation.reason.contains("Holding"));
        assert!(ac.violation_issued());

        assert_eq!(None, ac.audit(&limits, &fines, Time(20)));
        ac.advance(|_, _| 999);
        assert_eq!(Some(Approach), ac.history().last().copied());
        assert_eq!(None, ac.audit(&limits, &fines, Time(30)));
    }

    #[test]
    fn test_retired_aircraft_is_not_audited() {
        let ac = aircraft(AircraftClass::Emergency, Departure);
        ac.advance(|_, _| 50);
        ac.retire();
        assert_eq!(None, ac.audit(&SpeedLimits::default(), &FineSchedule::default(), Time(0)));
        assert!(!ac.violation_issued());
    }
}
