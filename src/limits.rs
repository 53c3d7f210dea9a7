use crate::flight::FlightDirection::{self, Arrival, Departure};
use crate::flight::Phase::{self, Approach, Climb, Cruise, Gate, Holding, Landing, Takeoff, Taxi};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Closed interval of legal speeds in km/h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedBand {
    pub min: u32,
    pub max: u32,
}

impl SpeedBand {
    pub const fn new(min: u32, max: u32) -> Self {
        SpeedBand { min, max }
    }

    pub fn contains(&self, speed: u32) -> bool {
        (self.min..=self.max).contains(&speed)
    }

    /// Draws uniformly from `[min, max + margin]`, so a sample lands past the
    /// legal maximum with probability `margin / (max - min + margin + 1)`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, margin: u32) -> u32 {
        rng.gen_range(self.min..=self.max.saturating_add(margin))
    }
}

impl fmt::Display for SpeedBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] km/h", self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedLimit {
    pub direction: FlightDirection,
    pub phase: Phase,
    pub min: u32,
    pub max: u32,
}

/// Legal band per (direction, phase) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SpeedLimit>", into = "Vec<SpeedLimit>")]
pub struct SpeedLimits {
    bands: HashMap<(FlightDirection, Phase), SpeedBand>,
}

impl SpeedLimits {
    pub fn band(&self, direction: FlightDirection, phase: Phase) -> Option<SpeedBand> {
        self.bands.get(&(direction, phase)).copied()
    }

    #[cfg(test)]
    pub fn set(&mut self, direction: FlightDirection, phase: Phase, band: SpeedBand) {
        self.bands.insert((direction, phase), band);
    }
}

impl Default for SpeedLimits {
    fn default() -> Self {
        let bands = [
            (Arrival, Holding, 400, 600),
            (Arrival, Approach, 240, 290),
            (Arrival, Landing, 30, 240),
            (Arrival, Taxi, 15, 30),
            (Arrival, Gate, 0, 5),
            (Departure, Gate, 0, 5),
            (Departure, Taxi, 15, 30),
            (Departure, Takeoff, 0, 290),
            (Departure, Climb, 250, 463),
            (Departure, Cruise, 800, 900),
        ]
        .into_iter()
        .map(|(direction, phase, min, max)| ((direction, phase), SpeedBand::new(min, max)))
        .collect();
        SpeedLimits { bands }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("speed limit for {direction} {phase} is declared more than once")]
pub struct DuplicateSpeedLimit {
    pub direction: FlightDirection,
    pub phase: Phase,
}

impl TryFrom<Vec<SpeedLimit>> for SpeedLimits {
    type Error = DuplicateSpeedLimit;

    fn try_from(entries: Vec<SpeedLimit>) -> Result<Self, Self::Error> {
        let mut bands = HashMap::with_capacity(entries.len());
        for l in entries {
            if bands
                .insert((l.direction, l.phase), SpeedBand::new(l.min, l.max))
                .is_some()
            {
                return Err(DuplicateSpeedLimit {
                    direction: l.direction,
                    phase: l.phase,
                });
            }
        }
        Ok(SpeedLimits { bands })
    }
}

impl From<SpeedLimits> for Vec<SpeedLimit> {
    fn from(limits: SpeedLimits) -> Self {
        let mut entries = limits
            .bands
            .into_iter()
            .map(|((direction, phase), band)| SpeedLimit {
                direction,
                phase,
                min: band.min,
                max: band.max,
            })
            .collect::<Vec<_>>();
        entries.sort_by_key(|l| (l.direction, l.phase));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_band_bounds_are_inclusive() {
        let band = SpeedBand::new(400, 600);
        assert!(band.contains(400));
        assert!(band.contains(600));
        assert!(!band.contains(399));
        assert!(!band.contains(601));
        assert!(!band.contains(650));
    }

    #[test]
    fn test_every_phase_of_both_sequences_has_a_band() {
        let limits = SpeedLimits::default();
        for direction in [Arrival, Departure] {
            for phase in direction.phases() {
                assert!(limits.band(direction, *phase).is_some(), "{direction} {phase}");
            }
        }
    }

    #[test]
    fn test_gate_band_differs_from_cruise() {
        let limits = SpeedLimits::default();
        assert_eq!(Some(SpeedBand::new(0, 5)), limits.band(Departure, Gate));
        assert_eq!(Some(SpeedBand::new(800, 900)), limits.band(Departure, Cruise));
        assert_eq!(None, limits.band(Arrival, Cruise));
    }

    #[test]
    fn test_json_entries() {
        let json = r#"[{"direction":"ARRIVAL","phase":"HOLDING","min":100,"max":200}]"#;
        let limits: SpeedLimits = serde_json::from_str(json).unwrap();
        assert_eq!(Some(SpeedBand::new(100, 200)), limits.band(Arrival, Holding));
        assert_eq!(None, limits.band(Arrival, Approach));
    }

    #[test]
    fn test_duplicate_entries_are_rejected() {
        let json = r#"[
            {"direction": "DEPARTURE", "phase": "CLIMB", "min": 250, "max": 463},
            {"direction": "DEPARTURE", "phase": "CLIMB", "min": 0, "max": 9999}
        ]"#;
        let err = serde_json::from_str::<SpeedLimits>(json).unwrap_err();
        assert!(err.to_string().contains("DEPARTURE Climb is declared more than once"));
    }

    #[test]
    fn test_zero_margin_never_violates() {
        let mut rng = StdRng::seed_from_u64(7);
        let band = SpeedBand::new(15, 30);
        assert!((0..1000).all(|_| band.contains(band.sample(&mut rng, 0))));
    }

    proptest! {
        #[test]
        fn test_sample_stays_within_margin(
            min in 0..1000u32,
            width in 0..500u32,
            margin in 0..100u32,
            seed in any::<u64>(),
        ) {
            let band = SpeedBand::new(min, min + width);
            let mut rng = StdRng::seed_from_u64(seed);
            let speed = band.sample(&mut rng, margin);
            prop_assert!(speed >= band.min);
            prop_assert!(speed <= band.max + margin);
        }
    }
}
