use crate::aircraft::Aircraft;
use crate::limits::SpeedLimits;
use crate::signal::Shutdown;
use crate::time::Clock;
use crate::violation::{FineSchedule, Violation, ViolationLog, ViolationSink};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Periodic speed audit over the whole fleet.
pub struct Radar {
    limits: SpeedLimits,
    fines: FineSchedule,
    interval: Duration,
    clock: Clock,
    log: ViolationLog,
    relay: Option<Arc<dyn ViolationSink>>,
}

impl Radar {
    pub fn new(limits: SpeedLimits, fines: FineSchedule, interval: Duration, clock: Clock) -> Self {
        Radar {
            limits,
            fines,
            interval,
            clock,
            log: ViolationLog::new(),
            relay: None,
        }
    }

    /// Forwards every violation to `sink` as well as to the run's own log.
    pub fn relay_to(&mut self, sink: Arc<dyn ViolationSink>) {
        self.relay = Some(sink);
    }

    pub fn log(&self) -> &ViolationLog {
        &self.log
    }

    pub fn limits(&self) -> &SpeedLimits {
        &self.limits
    }

    /// Sweeps until shutdown is signaled.
    pub fn watch(&self, fleet: &[Aircraft], shutdown: &Shutdown) {
        let mut sweeps = 0u64;
        while shutdown.is_active() {
            self.sweep(fleet, shutdown);
            sweeps += 1;
            self.clock.sleep(self.interval);
        }
        debug!(sweeps, "radar stopped");
    }

    /// One pass over the fleet. Returns the number of violations raised.
    pub fn sweep(&self, fleet: &[Aircraft], shutdown: &Shutdown) -> usize {
        let mut raised = 0;
        for aircraft in fleet {
            if shutdown.is_triggered() {
                break;
            }
            if let Some(violation) = aircraft.audit(&self.limits, &self.fines, self.clock.now()) {
                self.issue(&violation);
                raised += 1;
            }
        }
        raised
    }

    fn issue(&self, violation: &Violation) {
        warn!(
            flight = %violation.id,
            class = %violation.class,
            phase = %violation.phase,
            fine = violation.fine,
            "[AVN] Violation by Flight {} - {} - Fine: ${}",
            violation.id,
            violation.reason,
            violation.fine
        );
        self.log.record(violation);
        if let Some(relay) = &self.relay {
            relay.record(violation);
        }
    }
}
