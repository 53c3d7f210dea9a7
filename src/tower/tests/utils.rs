use crate::aircraft::{Aircraft, AircraftClass};
use crate::airport::{Airport, Backoff};
use crate::config::{RosterEntry, SimulationConfig};
use crate::flight::FlightDirection;
use crate::signal::Shutdown;
use crate::time::Clock;
use std::sync::Arc;
use std::time::Duration;

pub fn id(s: &str) -> Arc<str> {
    Arc::from(s)
}

pub fn runway_names(count: usize) -> Vec<String> {
    ["RWY-A", "RWY-B", "RWY-C", "RWY-D"]
        .iter()
        .take(count)
        .map(|n| n.to_string())
        .collect()
}

pub fn backoff(emergency_ms: u64, base_ms: u64, step_ms: u64) -> Backoff {
    Backoff {
        emergency_ms,
        base_ms,
        step_ms,
        jitter_ms: 0,
    }
}

pub fn airport(runways: usize, occupancy_ms: u64, backoff: Backoff) -> (Airport, Arc<Shutdown>) {
    let shutdown = Arc::new(Shutdown::new());
    let airport = Airport::new(
        &runway_names(runways),
        backoff,
        Duration::from_millis(occupancy_ms),
        Duration::from_millis(5),
        Clock::new(),
        shutdown.clone(),
    );
    (airport, shutdown)
}

pub fn add_aircraft(
    fleet: &mut Vec<Aircraft>,
    designator: &str,
    class: AircraftClass,
    direction: FlightDirection,
) {
    fleet.push(Aircraft::new(id(designator), class, direction));
}

pub fn entry(designator: &str, class: AircraftClass, direction: FlightDirection) -> RosterEntry {
    RosterEntry::new(designator, class, direction)
}

/// Millisecond-scale scenario so a whole run fits in a test.
pub fn fast_config(roster: Vec<RosterEntry>) -> SimulationConfig {
    SimulationConfig {
        roster,
        duration_ms: 600,
        sampling_interval_ms: 5,
        dwell_ms: 20,
        occupancy_ms: 20,
        backoff: backoff(5, 10, 5),
        seed: Some(42),
        ..SimulationConfig::default()
    }
}

pub fn mixed_roster() -> Vec<RosterEntry> {
    use AircraftClass::{Cargo, Commercial, Emergency};
    use FlightDirection::{Arrival, Departure};
    vec![
        entry("PK303", Commercial, Arrival),
        entry("FX101", Cargo, Arrival),
        entry("ED220", Commercial, Departure),
        entry("AF001", Emergency, Departure),
        entry("BD321", Cargo, Arrival),
        entry("AK911", Emergency, Departure),
    ]
}
