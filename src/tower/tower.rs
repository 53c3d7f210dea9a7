use crate::aircraft::{Aircraft, AircraftClass, AircraftId, AircraftSnapshot};
use crate::airport::{Airport, Grant, RunwaySnapshot};
use crate::config::{ConfigError, SimulationConfig};
use crate::flight::{Airspace, Flight, FlightOutcome};
use crate::radar::Radar;
use crate::signal::Shutdown;
use crate::time::{Clock, Time};
use crate::violation::{Violation, ViolationSink};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::thread::{self, Scope, ScopedJoinHandle};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TowerState {
    Initializing,
    Running,
    Draining,
    Complete,
}

#[derive(Debug, thiserror::Error)]
pub enum TowerError {
    #[error("invalid scenario: {0}")]
    Config(#[from] ConfigError),

    #[error("the tower cannot run again, it is {0:?}")]
    AlreadyStarted(TowerState),

    #[error("failed to spawn {actor}: {source}")]
    Spawn {
        actor: String,
        source: std::io::Error,
    },

    #[error("{0} panicked")]
    ActorPanicked(String),
}

/// Everything left once a run has drained.
#[derive(Debug, Clone)]
pub struct TowerReport {
    pub violations: Vec<Violation>,
    pub flights: Vec<AircraftSnapshot>,
    pub runways: Vec<RunwaySnapshot>,
    pub grants: Vec<Grant>,
    pub outcomes: Vec<(AircraftId, FlightOutcome)>,
    pub elapsed: Time,
}

impl TowerReport {
    pub fn total_fines(&self) -> u64 {
        self.violations.iter().map(|v| u64::from(v.fine)).sum()
    }

    /// Mean runway wait in milliseconds for one class, if it was granted any.
    pub fn mean_wait(&self, class: AircraftClass) -> Option<f64> {
        let waits = self
            .grants
            .iter()
            .filter(|g| g.class == class)
            .map(|g| g.waited_ms as f64)
            .collect::<Vec<_>>();
        if waits.is_empty() {
            None
        } else {
            Some(waits.iter().sum::<f64>() / waits.len() as f64)
        }
    }
}

struct Actors<'scope> {
    radar: ScopedJoinHandle<'scope, ()>,
    flights: Vec<(AircraftId, ScopedJoinHandle<'scope, FlightOutcome>)>,
    timer: ScopedJoinHandle<'scope, ()>,
}

/// Runs the fleet, the radar and the run timer, then drains them.
pub struct Tower {
    config: SimulationConfig,
    fleet: Vec<Aircraft>,
    airport: Airport,
    radar: Radar,
    clock: Clock,
    shutdown: Arc<Shutdown>,
    state: Mutex<TowerState>,
}

impl Tower {
    pub fn new(config: SimulationConfig) -> Result<Self, TowerError> {
        config.validate()?;

        let clock = Clock::scaled(config.time_scale);
        let shutdown = Arc::new(Shutdown::new());
        let fleet = config
            .roster
            .iter()
            .map(|e| Aircraft::new(Arc::from(e.designator.as_str()), e.class, e.direction))
            .collect::<Vec<_>>();
        let airport = Airport::new(
            &config.runways,
            config.backoff,
            config.occupancy(),
            config.sampling_interval(),
            clock,
            shutdown.clone(),
        );
        let radar = Radar::new(
            config.speed_limits.clone(),
            config.fines,
            config.sampling_interval(),
            clock,
        );
        info!(flights = fleet.len(), runways = %airport, "tower initialized");

        Ok(Tower {
            config,
            fleet,
            airport,
            radar,
            clock,
            shutdown,
            state: Mutex::new(TowerState::Initializing),
        })
    }

    /// Streams every violation to `sink` while the run is in progress.
    pub fn with_relay(mut self, sink: Arc<dyn ViolationSink>) -> Self {
        self.radar.relay_to(sink);
        self
    }

    pub fn run(&self) -> Result<TowerReport, TowerError> {
        {
            let mut state = self.state.lock();
            if *state != TowerState::Initializing {
                return Err(TowerError::AlreadyStarted(*state));
            }
            *state = TowerState::Running;
        }
        let started = self.clock.now();
        let airspace = Airspace {
            airport: &self.airport,
            limits: self.radar.limits(),
            speed_margin: self.config.speed_margin,
            dwell: self.config.dwell(),
            clock: &self.clock,
            shutdown: &self.shutdown,
        };

        let outcomes = thread::scope(|scope| {
            let actors = match self.launch(scope, &airspace) {
                Ok(actors) => actors,
                Err(e) => {
                    self.shutdown.trigger();
                    return Err(e);
                }
            };
            self.drain(actors)
        })?;

        *self.state.lock() = TowerState::Complete;
        let report = TowerReport {
            violations: self.radar.log().records(),
            flights: self.flight_board(),
            runways: self.runway_board(),
            grants: self.airport.grants(),
            outcomes,
            elapsed: self.clock.now() - started,
        };
        info!(
            elapsed = %report.elapsed,
            violations = report.violations.len(),
            "Simulation complete. All aircraft have completed their operations."
        );
        Ok(report)
    }

    fn launch<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        airspace: &'env Airspace<'env>,
    ) -> Result<Actors<'scope>, TowerError> {
        let radar = spawn(scope, "radar".to_string(), || {
            self.radar.watch(&self.fleet, &self.shutdown)
        })?;

        let mut flights = Vec::with_capacity(self.fleet.len());
        for (index, aircraft) in self.fleet.iter().enumerate() {
            let rng = self.flight_rng(index);
            let handle = spawn(scope, format!("flight-{}", aircraft.id), move || {
                Flight::new(aircraft, airspace, rng).fly()
            })?;
            flights.push((aircraft.id.clone(), handle));
        }

        let timer = spawn(scope, "timer".to_string(), || self.countdown())?;
        Ok(Actors {
            radar,
            flights,
            timer,
        })
    }

    fn drain(&self, actors: Actors<'_>) -> Result<Vec<(AircraftId, FlightOutcome)>, TowerError> {
        let mut failure = actors
            .timer
            .join()
            .err()
            .map(|_| TowerError::ActorPanicked("timer".to_string()));
        self.shutdown.trigger();
        *self.state.lock() = TowerState::Draining;
        debug!("draining actors");

        let mut outcomes = Vec::with_capacity(actors.flights.len());
        for (id, handle) in actors.flights {
            match handle.join() {
                Ok(outcome) => {
                    debug!(flight = %id, ?outcome, "flight landed in terminal state");
                    outcomes.push((id, outcome));
                }
                Err(_) => {
                    failure.get_or_insert(TowerError::ActorPanicked(format!("flight {}", id)));
                }
            }
        }
        if actors.radar.join().is_err() {
            failure.get_or_insert(TowerError::ActorPanicked("radar".to_string()));
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    fn countdown(&self) {
        self.clock.sleep_unless(
            self.config.duration(),
            self.config.sampling_interval(),
            &self.shutdown,
        );
        if self.shutdown.trigger() {
            info!("Simulation Time Ended.");
        }
    }

    fn flight_rng(&self, index: usize) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        }
    }

    /// Ends the run early. Actors wind down exactly as on timer expiry.
    pub fn stop(&self) {
        if self.shutdown.trigger() {
            info!("shutdown requested");
        }
    }

    /// The "simulation active" signal: false forever once shutdown is set.
    pub fn is_active(&self) -> bool {
        self.shutdown.is_active()
    }

    pub fn state(&self) -> TowerState {
        *self.state.lock()
    }

    pub fn fleet(&self) -> &[Aircraft] {
        &self.fleet
    }

    pub fn airport(&self) -> &Airport {
        &self.airport
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.radar.log().records()
    }

    pub fn flight_board(&self) -> Vec<AircraftSnapshot> {
        self.fleet.iter().map(Aircraft::snapshot).collect()
    }

    pub fn runway_board(&self) -> Vec<RunwaySnapshot> {
        self.airport.runway_board()
    }
}

fn spawn<'scope, 'env, T, F>(
    scope: &'scope Scope<'scope, 'env>,
    name: String,
    f: F,
) -> Result<ScopedJoinHandle<'scope, T>, TowerError>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn_scoped(scope, f)
        .map_err(|source| TowerError::Spawn {
            actor: name,
            source,
        })
}
