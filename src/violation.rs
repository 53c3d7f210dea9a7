use crate::aircraft::{AircraftClass, AircraftId};
use crate::flight::Phase;
use crate::time::Time;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabled::Tabled;

/// Airspace violation notice (AVN) raised by the radar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct Violation {
    #[tabled(rename = "Flight")]
    pub id: AircraftId,
    #[tabled(rename = "Class")]
    pub class: AircraftClass,
    #[tabled(rename = "Phase")]
    pub phase: Phase,
    #[tabled(rename = "Speed (km/h)")]
    pub speed: u32,
    #[tabled(rename = "Reason")]
    pub reason: String,
    #[tabled(rename = "Fine ($)")]
    pub fine: u32,
    #[tabled(rename = "At")]
    pub at: Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FineSchedule {
    pub commercial: u32,
    pub cargo: u32,
    pub emergency: u32,
}

impl FineSchedule {
    pub fn fine_for(&self, class: AircraftClass) -> u32 {
        match class {
            AircraftClass::Commercial => self.commercial,
            AircraftClass::Cargo => self.cargo,
            AircraftClass::Emergency => self.emergency,
        }
    }
}

impl Default for FineSchedule {
    fn default() -> Self {
        FineSchedule {
            commercial: 5000,
            cargo: 3000,
            emergency: 1000,
        }
    }
}

/// Receives each violation exactly once, as soon as it is raised.
pub trait ViolationSink: Send + Sync {
    fn record(&self, violation: &Violation);
}

/// Append-only in-memory record of every violation of a run.
#[derive(Debug, Clone, Default)]
pub struct ViolationLog {
    records: Arc<Mutex<Vec<Violation>>>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn records(&self) -> Vec<Violation> {
        self.records.lock().clone()
    }
}

impl ViolationSink for ViolationLog {
    fn record(&self, violation: &Violation) {
        self.records.lock().push(violation.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fine_schedule_order() {
        let fines = FineSchedule::default();
        assert_eq!(5000, fines.fine_for(AircraftClass::Commercial));
        assert_eq!(3000, fines.fine_for(AircraftClass::Cargo));
        assert_eq!(1000, fines.fine_for(AircraftClass::Emergency));
    }

    #[test]
    fn test_partial_schedule_keeps_defaults() {
        let fines: FineSchedule = serde_json::from_str(r#"{"cargo": 4200}"#).unwrap();
        assert_eq!(4200, fines.cargo);
        assert_eq!(5000, fines.commercial);
    }

    #[test]
    fn test_log_is_shared_between_clones() {
        let log = ViolationLog::new();
        let writer = log.clone();
        writer.record(&Violation {
            id: Arc::from("FX101"),
            class: AircraftClass::Cargo,
            phase: Phase::Taxi,
            speed: 45,
            reason: "Speed violation in phase Taxi".to_string(),
            fine: 3000,
            at: Time(1500),
        });
        assert_eq!(1, log.len());
        assert_eq!("FX101", &*log.records()[0].id);
    }
}
