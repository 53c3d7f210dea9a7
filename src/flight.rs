use crate::aircraft::Aircraft;
use crate::airport::Airport;
use crate::limits::SpeedLimits;
use crate::signal::Shutdown;
use crate::time::Clock;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightDirection {
    Arrival,
    Departure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Holding,
    Approach,
    Landing,
    Taxi,
    Gate,
    Takeoff,
    Climb,
    Cruise,
}

const ARRIVAL_PHASES: [Phase; 5] = [
    Phase::Holding,
    Phase::Approach,
    Phase::Landing,
    Phase::Taxi,
    Phase::Gate,
];

const DEPARTURE_PHASES: [Phase; 5] = [
    Phase::Gate,
    Phase::Taxi,
    Phase::Takeoff,
    Phase::Climb,
    Phase::Cruise,
];

impl FlightDirection {
    /// Canonical phase sequence flown in this direction.
    pub fn phases(self) -> &'static [Phase] {
        match self {
            FlightDirection::Arrival => &ARRIVAL_PHASES,
            FlightDirection::Departure => &DEPARTURE_PHASES,
        }
    }

    /// The phase that needs a runway.
    pub fn runway_phase(self) -> Phase {
        match self {
            FlightDirection::Arrival => Phase::Landing,
            FlightDirection::Departure => Phase::Takeoff,
        }
    }
}

impl fmt::Display for FlightDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightDirection::Arrival => write!(f, "ARRIVAL"),
            FlightDirection::Departure => write!(f, "DEPARTURE"),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Holding => "Holding",
            Phase::Approach => "Approach",
            Phase::Landing => "Landing",
            Phase::Taxi => "Taxi",
            Phase::Gate => "Gate",
            Phase::Takeoff => "Takeoff",
            Phase::Climb => "Climb",
            Phase::Cruise => "Cruise",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightOutcome {
    /// Every phase of the sequence was flown.
    Completed,
    /// Shutdown was observed after this many phases were entered.
    Cut { entered: usize },
}

/// Shared, read-only surroundings of a flight actor.
pub struct Airspace<'a> {
    pub airport: &'a Airport,
    pub limits: &'a SpeedLimits,
    pub speed_margin: u32,
    pub dwell: Duration,
    pub clock: &'a Clock,
    pub shutdown: &'a Shutdown,
}

/// Drives one aircraft through its phase sequence on the calling thread.
pub struct Flight<'a> {
    aircraft: &'a Aircraft,
    airspace: &'a Airspace<'a>,
    rng: StdRng,
}

impl<'a> Flight<'a> {
    pub fn new(aircraft: &'a Aircraft, airspace: &'a Airspace<'a>, rng: StdRng) -> Self {
        Flight {
            aircraft,
            airspace,
            rng,
        }
    }

    pub fn fly(mut self) -> FlightOutcome {
        let Airspace {
            airport,
            limits,
            speed_margin,
            dwell,
            clock,
            shutdown,
        } = *self.airspace;
        let aircraft = self.aircraft;

        let outcome = loop {
            let entered = aircraft.entered();
            if shutdown.is_triggered() && entered < aircraft.direction.phases().len() {
                break FlightOutcome::Cut { entered };
            }

            let next = aircraft.advance(|direction, phase| {
                limits
                    .band(direction, phase)
                    .map(|band| band.sample(&mut self.rng, speed_margin))
                    .unwrap_or(0)
            });
            let Some((phase, speed)) = next else {
                break FlightOutcome::Completed;
            };
            info!(
                flight = %aircraft.id,
                direction = %aircraft.direction,
                "Phase: {}, Speed: {} km/h",
                phase,
                speed
            );

            let flown = if phase == aircraft.direction.runway_phase() {
                match airport.request_runway(&aircraft.id, aircraft.class) {
                    Some(handle) => {
                        debug!(flight = %aircraft.id, %phase, waited_ms = handle.grant().waited_ms, "cleared for runway");
                        airport.occupy(handle);
                        true
                    }
                    None => {
                        debug!(flight = %aircraft.id, %phase, "runway request abandoned, phase skipped");
                        false
                    }
                }
            } else {
                clock.sleep(dwell);
                true
            };

            if flown {
                aircraft.complete_phase();
            }
        };

        aircraft.retire();
        outcome
    }
}
