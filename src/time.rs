use crate::signal::Shutdown;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::thread;
use std::time::{Duration, Instant};

/// Simulation timestamp in milliseconds since the clock's epoch.
#[derive(Debug, Clone, Copy, Ord, Eq, PartialEq, Serialize, Deserialize, PartialOrd, Default)]
pub struct Time(pub u64);

impl Time {
    #[cfg(test)]
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mins = self.0 / 60_000;
        let secs = (self.0 % 60_000) / 1000;
        let millis = self.0 % 1000;
        write!(f, "T+{:02}:{:02}.{:03}", mins, secs, millis)
    }
}

impl Add<u64> for Time {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Time(self.0 + rhs)
    }
}

impl Sub<Time> for Time {
    type Output = Self;

    fn sub(self, rhs: Time) -> Self::Output {
        Time(self.0.saturating_sub(rhs.0))
    }
}

/// Monotonic clock shared by every actor of a run.
///
/// `scale` compresses simulated time: with a scale of 10 a three second
/// dwell sleeps for 300 ms of wall time and `now` advances ten times faster.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
    scale: f64,
}

impl Clock {
    pub fn new() -> Self {
        Self::scaled(1.0)
    }

    pub fn scaled(scale: f64) -> Self {
        Clock {
            epoch: Instant::now(),
            scale,
        }
    }

    pub fn now(&self) -> Time {
        let elapsed = Duration::try_from_secs_f64(self.epoch.elapsed().as_secs_f64() * self.scale)
            .unwrap_or(Duration::MAX);
        Time(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let scaled = Duration::try_from_secs_f64(duration.as_secs_f64() / self.scale).unwrap_or(Duration::MAX);
        thread::sleep(scaled);
    }

    /// Sleeps for `duration` in slices of at most `tick`, giving up as soon as
    /// `shutdown` is triggered. Returns `false` if the sleep was cut short.
    pub fn sleep_unless(&self, duration: Duration, tick: Duration, shutdown: &Shutdown) -> bool {
        let tick = tick.max(Duration::from_millis(1));
        let mut remaining = duration;
        while !remaining.is_zero() {
            if shutdown.is_triggered() {
                return false;
            }
            let slice = remaining.min(tick);
            self.sleep(slice);
            remaining -= slice;
        }
        shutdown.is_active()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
