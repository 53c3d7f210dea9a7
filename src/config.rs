use crate::aircraft::AircraftClass;
use crate::airport::Backoff;
use crate::flight::{FlightDirection, Phase};
use crate::limits::SpeedLimits;
use crate::violation::FineSchedule;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest duration any timing field may hold: one simulated day.
pub const MAX_DURATION_MS: u64 = 86_400_000;

pub const TIME_SCALE_RANGE: RangeInclusive<f64> = 0.01..=1000.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("the roster is empty, nothing to simulate")]
    EmptyRoster,

    #[error("flight '{0}' appears more than once in the roster")]
    DuplicateFlight(String),

    #[error("at least one runway is required")]
    NoRunways,

    #[error("runway '{0}' is declared more than once")]
    DuplicateRunway(String),

    #[error("{field} must be positive")]
    NonPositive { field: &'static str },

    #[error("{field} of {value_ms} ms is longer than one day")]
    TooLong { field: &'static str, value_ms: u64 },

    #[error("time scale {0} is outside 0.01..=1000")]
    TimeScaleOutOfRange(f64),

    #[error("no speed band for {direction} {phase}")]
    MissingSpeedBand {
        direction: FlightDirection,
        phase: Phase,
    },

    #[error("speed band for {direction} {phase} is inverted: min {min} > max {max}")]
    InvertedSpeedBand {
        direction: FlightDirection,
        phase: Phase,
        min: u32,
        max: u32,
    },

    #[error("sampling interval {interval_ms} ms must be shorter than the shortest phase ({shortest_ms} ms)")]
    SamplingTooSlow { interval_ms: u64, shortest_ms: u64 },

    #[error("backoff must not shrink as priority drops")]
    InvertedBackoff,

    #[error("cannot read scenario {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse scenario {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub designator: String,
    pub class: AircraftClass,
    pub direction: FlightDirection,
}

impl RosterEntry {
    pub fn new(designator: &str, class: AircraftClass, direction: FlightDirection) -> Self {
        RosterEntry {
            designator: designator.to_string(),
            class,
            direction,
        }
    }
}

/// Scenario for one run. Every field falls back to the stock tower setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub roster: Vec<RosterEntry>,
    pub runways: Vec<String>,
    pub duration_ms: u64,
    pub sampling_interval_ms: u64,
    pub dwell_ms: u64,
    pub occupancy_ms: u64,
    pub speed_margin: u32,
    pub speed_limits: SpeedLimits,
    pub backoff: Backoff,
    pub fines: FineSchedule,
    pub seed: Option<u64>,
    pub time_scale: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        use AircraftClass::{Cargo, Commercial, Emergency};
        use FlightDirection::{Arrival, Departure};

        SimulationConfig {
            roster: vec![
                RosterEntry::new("PK303", Commercial, Arrival),
                RosterEntry::new("FX101", Cargo, Arrival),
                RosterEntry::new("ED220", Commercial, Departure),
                RosterEntry::new("AF001", Emergency, Departure),
                RosterEntry::new("BD321", Cargo, Arrival),
                RosterEntry::new("AK911", Emergency, Departure),
            ],
            runways: vec!["RWY-A".to_string(), "RWY-B".to_string(), "RWY-C".to_string()],
            duration_ms: 50_000,
            sampling_interval_ms: 500,
            dwell_ms: 3000,
            occupancy_ms: 3000,
            speed_margin: 20,
            speed_limits: SpeedLimits::default(),
            backoff: Backoff::default(),
            fines: FineSchedule::default(),
            seed: None,
            time_scale: 1.0,
        }
    }
}

impl SimulationConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SimulationConfig = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roster.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.roster.iter().find(|e| !seen.insert(e.designator.as_str())) {
            return Err(ConfigError::DuplicateFlight(dup.designator.clone()));
        }

        if self.runways.is_empty() {
            return Err(ConfigError::NoRunways);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.runways.iter().find(|r| !seen.insert(r.as_str())) {
            return Err(ConfigError::DuplicateRunway(dup.clone()));
        }

        for (field, value) in [
            ("duration_ms", self.duration_ms),
            ("sampling_interval_ms", self.sampling_interval_ms),
            ("dwell_ms", self.dwell_ms),
            ("occupancy_ms", self.occupancy_ms),
            ("backoff.emergency_ms", self.backoff.emergency_ms),
            ("backoff.base_ms", self.backoff.base_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }
        for (field, value_ms) in [
            ("duration_ms", self.duration_ms),
            ("dwell_ms", self.dwell_ms),
            ("occupancy_ms", self.occupancy_ms),
            ("backoff.emergency_ms", self.backoff.emergency_ms),
            ("backoff.base_ms", self.backoff.base_ms),
            ("backoff.step_ms", self.backoff.step_ms),
            ("backoff.jitter_ms", self.backoff.jitter_ms),
        ] {
            if value_ms > MAX_DURATION_MS {
                return Err(ConfigError::TooLong { field, value_ms });
            }
        }
        if !TIME_SCALE_RANGE.contains(&self.time_scale) {
            return Err(ConfigError::TimeScaleOutOfRange(self.time_scale));
        }

        let shortest_ms = self.dwell_ms.min(self.occupancy_ms);
        if self.sampling_interval_ms >= shortest_ms {
            return Err(ConfigError::SamplingTooSlow {
                interval_ms: self.sampling_interval_ms,
                shortest_ms,
            });
        }

        let [emergency, commercial, cargo] = [
            AircraftClass::Emergency,
            AircraftClass::Commercial,
            AircraftClass::Cargo,
        ]
        .map(|class| self.backoff.delay_for(class));
        if emergency > commercial || commercial > cargo {
            return Err(ConfigError::InvertedBackoff);
        }

        for direction in [FlightDirection::Arrival, FlightDirection::Departure] {
            for &phase in direction.phases() {
                let band = self
                    .speed_limits
                    .band(direction, phase)
                    .ok_or(ConfigError::MissingSpeedBand { direction, phase })?;
                if band.min > band.max {
                    return Err(ConfigError::InvertedSpeedBand {
                        direction,
                        phase,
                        min: band.min,
                        max: band.max,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn occupancy(&self) -> Duration {
        Duration::from_millis(self.occupancy_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::SpeedBand;

    #[test]
    fn test_default_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(6, config.roster.len());
        assert_eq!(3, config.runways.len());
    }

    #[test]
    fn test_empty_roster_is_rejected() {
        let config = SimulationConfig {
            roster: vec![],
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRoster)));
    }

    #[test]
    fn test_zero_runways_is_rejected() {
        let config = SimulationConfig {
            runways: vec![],
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoRunways)));
    }

    #[test]
    fn test_zero_duration_is_rejected() {
        let config = SimulationConfig {
            duration_ms: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "duration_ms" })
        ));
    }

    #[test]
    fn test_time_scale_must_be_sane() {
        for time_scale in [1e-20, 0.0, -1.0, f64::NAN, f64::INFINITY, 1e9] {
            let config = SimulationConfig {
                time_scale,
                ..SimulationConfig::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::TimeScaleOutOfRange(_))));
        }
        let config = SimulationConfig {
            time_scale: 100.0,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_timings_are_rejected() {
        let config = SimulationConfig {
            duration_ms: u64::MAX,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooLong { field: "duration_ms", .. })
        ));

        let mut config = SimulationConfig::default();
        config.backoff.step_ms = u64::MAX / 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooLong { field: "backoff.step_ms", .. })
        ));
    }

    #[test]
    fn test_duplicate_flight_is_rejected() {
        let mut config = SimulationConfig::default();
        config.roster.push(config.roster[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateFlight(id)) if id == "PK303"));
    }

    #[test]
    fn test_sampling_must_beat_dwell() {
        let config = SimulationConfig {
            sampling_interval_ms: 3000,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::SamplingTooSlow { .. })));
    }

    #[test]
    fn test_inverted_band_is_rejected() {
        let mut config = SimulationConfig::default();
        config
            .speed_limits
            .set(FlightDirection::Departure, Phase::Climb, SpeedBand::new(500, 400));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedSpeedBand { phase: Phase::Climb, .. })
        ));
    }

    #[test]
    fn test_missing_band_is_rejected() {
        let config: SimulationConfig = serde_json::from_str(
            r#"{"speed_limits": [{"direction": "ARRIVAL", "phase": "HOLDING", "min": 400, "max": 600}]}"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingSpeedBand { .. })));
    }

    #[test]
    fn test_inverted_backoff_is_rejected() {
        let mut config = SimulationConfig::default();
        config.backoff.emergency_ms = 10_000;
        assert!(matches!(config.validate(), Err(ConfigError::InvertedBackoff)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimulationConfig = serde_json::from_str(
            r#"{"duration_ms": 1000, "roster": [{"designator": "AK911", "class": "EMERGENCY", "direction": "DEPARTURE"}]}"#,
        )
        .unwrap();
        assert_eq!(Duration::from_secs(1), config.duration());
        assert_eq!(1, config.roster.len());
        assert_eq!(3, config.runways.len());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bundled_scenario_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/default.json");
        let config = SimulationConfig::load_from_file(&path).unwrap();
        assert_eq!(SimulationConfig::default().roster, config.roster);
        assert_eq!(SimulationConfig::default().speed_limits, config.speed_limits);
    }

    #[test]
    fn test_duplicate_speed_limit_fails_to_load() {
        let path = std::env::temp_dir().join(format!("aircontrolx-dup-limits-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"speed_limits": [
                {"direction": "ARRIVAL", "phase": "HOLDING", "min": 400, "max": 600},
                {"direction": "ARRIVAL", "phase": "HOLDING", "min": 0, "max": 900}
            ]}"#,
        )
        .unwrap();
        let result = SimulationConfig::load_from_file(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = SimulationConfig::load_from_file(Path::new("no/such/scenario.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
