use crate::aircraft::{AircraftClass, AircraftId};
use crate::signal::Shutdown;
use crate::time::Clock;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Formatter;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tracing::{debug, info};

pub type RunwayName = Arc<str>;

/// Retry delay after a denied runway request, in milliseconds.
///
/// Emergencies retry after `emergency_ms`; everyone else waits
/// `base_ms + priority * step_ms`, so lower classes poll less often.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub emergency_ms: u64,
    pub base_ms: u64,
    pub step_ms: u64,
    pub jitter_ms: u64,
}

impl Backoff {
    pub fn delay_for(&self, class: AircraftClass) -> Duration {
        let millis = match class {
            AircraftClass::Emergency => self.emergency_ms,
            _ => self
                .base_ms
                .saturating_add(u64::from(class.priority()).saturating_mul(self.step_ms)),
        };
        Duration::from_millis(millis)
    }

    fn next_delay(&self, class: AircraftClass) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        self.delay_for(class).saturating_add(Duration::from_millis(jitter))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            emergency_ms: 1000,
            base_ms: 2000,
            step_ms: 1000,
            jitter_ms: 0,
        }
    }
}

#[derive(Debug)]
struct Runway {
    name: RunwayName,
    occupant: Mutex<Option<AircraftId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct RunwaySnapshot {
    #[tabled(rename = "Runway")]
    pub name: RunwayName,
    #[tabled(rename = "In use")]
    pub in_use: bool,
    #[tabled(rename = "Occupant")]
    pub occupant: String,
}

/// A granted runway request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct Grant {
    #[tabled(rename = "Flight")]
    pub flight: AircraftId,
    #[tabled(rename = "Class")]
    pub class: AircraftClass,
    #[tabled(rename = "Runway")]
    pub runway: RunwayName,
    #[tabled(rename = "Attempts")]
    pub attempts: u32,
    #[tabled(rename = "Waited (ms)")]
    pub waited_ms: u64,
}

/// Exclusive hold on one runway. Dropping it vacates the runway, so every
/// exit path releases what it acquired.
#[derive(Debug)]
pub struct RunwayHandle<'a> {
    airport: &'a Airport,
    index: usize,
    grant: Grant,
}

impl RunwayHandle<'_> {
    pub fn runway(&self) -> &RunwayName {
        &self.grant.runway
    }

    pub fn grant(&self) -> &Grant {
        &self.grant
    }
}

impl Drop for RunwayHandle<'_> {
    fn drop(&mut self) {
        self.airport.vacate(self.index);
    }
}

/// Runway pool shared by every flight.
#[derive(Debug)]
pub struct Airport {
    runways: Vec<Runway>,
    allocation: Mutex<()>,
    grants: Mutex<Vec<Grant>>,
    backoff: Backoff,
    occupancy: Duration,
    tick: Duration,
    clock: Clock,
    shutdown: Arc<Shutdown>,
}

impl Airport {
    pub fn new(
        names: &[String],
        backoff: Backoff,
        occupancy: Duration,
        tick: Duration,
        clock: Clock,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let runways = names
            .iter()
            .map(|name| Runway {
                name: Arc::from(name.as_str()),
                occupant: Mutex::new(None),
            })
            .collect();
        Airport {
            runways,
            allocation: Mutex::new(()),
            grants: Mutex::new(vec![]),
            backoff,
            occupancy,
            tick,
            clock,
            shutdown,
        }
    }

    /// Polls for a free runway until one is granted or shutdown is signaled.
    /// Backoff sleeps wake every `tick` to look at the shutdown signal.
    ///
    /// Priority only shapes the retry delay: the scan itself runs under the
    /// allocation lock and hands out the first free runway to whoever holds it.
    pub fn request_runway(&self, flight: &AircraftId, class: AircraftClass) -> Option<RunwayHandle<'_>> {
        let requested_at = self.clock.now();
        let mut attempts = 0;

        while self.shutdown.is_active() {
            attempts += 1;
            if let Some(index) = self.try_assign(flight) {
                let grant = Grant {
                    flight: flight.clone(),
                    class,
                    runway: self.runways[index].name.clone(),
                    attempts,
                    waited_ms: (self.clock.now() - requested_at).0,
                };
                info!(%flight, runway = %grant.runway, attempts, "[Runway Assigned] {} is using {}", flight, grant.runway);
                self.grants.lock().push(grant.clone());
                return Some(RunwayHandle {
                    airport: self,
                    index,
                    grant,
                });
            }

            let delay = self.backoff.next_delay(class);
            debug!(%flight, %class, attempts, ?delay, "all runways busy, backing off");
            self.clock.sleep_unless(delay, self.tick, &self.shutdown);
        }
        None
    }

    fn try_assign(&self, flight: &AircraftId) -> Option<usize> {
        let _allocation = self.allocation.lock();
        self.runways.iter().position(|runway| {
            let mut occupant = runway.occupant.lock();
            if occupant.is_none() {
                *occupant = Some(flight.clone());
                true
            } else {
                false
            }
        })
    }

    pub fn release_runway(&self, handle: RunwayHandle<'_>) {
        info!(flight = %handle.grant.flight, runway = %handle.runway(), "[Runway Released] Runway {} is now available.", handle.runway());
        drop(handle);
    }

    /// Holds the runway for the fixed occupancy time, then releases it.
    pub fn occupy(&self, handle: RunwayHandle<'_>) {
        self.clock.sleep(self.occupancy);
        self.release_runway(handle);
    }

    fn vacate(&self, index: usize) {
        if let Some(runway) = self.runways.get(index) {
            runway.occupant.lock().take();
        }
    }

    pub fn runway_board(&self) -> Vec<RunwaySnapshot> {
        self.runways
            .iter()
            .map(|runway| {
                let occupant = runway.occupant.lock();
                RunwaySnapshot {
                    name: runway.name.clone(),
                    in_use: occupant.is_some(),
                    occupant: occupant.as_deref().unwrap_or("-").to_string(),
                }
            })
            .collect()
    }

    pub fn in_use(&self) -> usize {
        self.runways
            .iter()
            .filter(|runway| runway.occupant.lock().is_some())
            .count()
    }

    pub fn grants(&self) -> Vec<Grant> {
        self.grants.lock().clone()
    }
}

impl fmt::Display for Airport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let names = self
            .runways
            .iter()
            .map(|r| r.name.as_ref())
            .collect::<Vec<_>>();
        write!(f, "{}", names.join(", "))
    }
}
