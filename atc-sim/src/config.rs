//! Run configuration for the control tower.
//!
//! Every value has a default; an INI file only needs the keys it changes.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use ini::{Ini, Properties};
use thiserror::Error;

use crate::types::aircraft::Direction;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// One value per direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerDirection<T> {
    pub north: T,
    pub south: T,
    pub east: T,
    pub west: T,
}

impl<T: Copy> PerDirection<T> {
    pub fn get(&self, direction: Direction) -> T {
        match direction {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    /// Real seconds the driver runs before shutting down.
    pub duration_secs: u64,
    /// Simulated seconds per real second.
    pub time_scale: f64,
    /// Real milliseconds between clock ticks.
    pub clock_tick_ms: u64,
}

/// Real-time sleep between iterations of each loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub generator_interval_ms: u64,
    pub dispatcher_interval_ms: u64,
    pub radar_interval_ms: u64,
    pub display_interval_ms: u64,
}

impl LoopSettings {
    pub fn generator(&self) -> StdDuration {
        StdDuration::from_millis(self.generator_interval_ms)
    }

    pub fn dispatcher(&self) -> StdDuration {
        StdDuration::from_millis(self.dispatcher_interval_ms)
    }

    pub fn radar(&self) -> StdDuration {
        StdDuration::from_millis(self.radar_interval_ms)
    }

    pub fn display(&self) -> StdDuration {
        StdDuration::from_millis(self.display_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    /// Simulated seconds between new flights, per direction.
    pub cadence_secs: PerDirection<u64>,
    /// Chance a new flight is created as an emergency.
    pub emergency_probability: PerDirection<f64>,
    /// Chance a flight is escalated on each escalation round.
    pub escalation_probability: PerDirection<f64>,
    /// Simulated seconds between escalation rounds.
    pub escalation_interval_secs: u64,
}

impl GeneratorSettings {
    pub fn cadence(&self, direction: Direction) -> Duration {
        Duration::seconds(self.cadence_secs.get(direction) as i64)
    }

    pub fn escalation_interval(&self) -> Duration {
        Duration::seconds(self.escalation_interval_secs as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlightSettings {
    pub overshoot_probability: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherSettings {
    /// Simulated seconds a terminal flight lingers before retirement.
    pub retire_grace_secs: u64,
}

impl DispatcherSettings {
    pub fn retire_grace(&self) -> Duration {
        Duration::seconds(self.retire_grace_secs as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub directory: PathBuf,
    pub console: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub simulation: SimulationSettings,
    pub loops: LoopSettings,
    pub generator: GeneratorSettings,
    pub flights: FlightSettings,
    pub dispatcher: DispatcherSettings,
    pub log: LogSettings,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            simulation: SimulationSettings {
                duration_secs: 300,
                time_scale: 60.0,
                clock_tick_ms: 250,
            },
            loops: LoopSettings {
                generator_interval_ms: 500,
                dispatcher_interval_ms: 1000,
                radar_interval_ms: 200,
                display_interval_ms: 2000,
            },
            generator: GeneratorSettings {
                cadence_secs: PerDirection {
                    north: 180,
                    south: 120,
                    east: 150,
                    west: 240,
                },
                emergency_probability: PerDirection {
                    north: 0.10,
                    south: 0.05,
                    east: 0.15,
                    west: 0.20,
                },
                escalation_probability: PerDirection {
                    north: 0.01,
                    south: 0.005,
                    east: 0.015,
                    west: 0.02,
                },
                escalation_interval_secs: 30,
            },
            flights: FlightSettings {
                overshoot_probability: 0.05,
            },
            dispatcher: DispatcherSettings {
                retire_grace_secs: 600,
            },
            log: LogSettings {
                directory: PathBuf::from("./logs"),
                console: true,
            },
        }
    }
}

impl SimConfig {
    /// Loads `path`, overlaying its keys on the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(ini::Error::Parse)?;
        parse_ini(&ini)
    }
}

/// Starts from `SimConfig::default()` and overlays any values found in the INI.
fn parse_ini(ini: &Ini) -> Result<SimConfig, ConfigError> {
    let mut config = SimConfig::default();

    // [simulation] section
    if let Some(section) = ini.section(Some("simulation")) {
        let s = Section::new("simulation", section);
        s.positive("duration_secs", &mut config.simulation.duration_secs)?;
        s.positive("clock_tick_ms", &mut config.simulation.clock_tick_ms)?;
        if let Some(v) = s.number::<f64>("time_scale", "must be a positive number")? {
            if !(v > 0.0 && v.is_finite()) {
                return Err(s.invalid("time_scale", &v.to_string(), "must be a positive number"));
            }
            config.simulation.time_scale = v;
        }
    }

    // [loops] section
    if let Some(section) = ini.section(Some("loops")) {
        let s = Section::new("loops", section);
        s.positive("generator_interval_ms", &mut config.loops.generator_interval_ms)?;
        s.positive("dispatcher_interval_ms", &mut config.loops.dispatcher_interval_ms)?;
        s.positive("radar_interval_ms", &mut config.loops.radar_interval_ms)?;
        s.positive("display_interval_ms", &mut config.loops.display_interval_ms)?;
    }

    // [generator] section
    if let Some(section) = ini.section(Some("generator")) {
        let s = Section::new("generator", section);
        let g = &mut config.generator;
        s.positive("north_cadence_secs", &mut g.cadence_secs.north)?;
        s.positive("south_cadence_secs", &mut g.cadence_secs.south)?;
        s.positive("east_cadence_secs", &mut g.cadence_secs.east)?;
        s.positive("west_cadence_secs", &mut g.cadence_secs.west)?;
        s.positive("escalation_interval_secs", &mut g.escalation_interval_secs)?;
        s.probability("north_emergency", &mut g.emergency_probability.north)?;
        s.probability("south_emergency", &mut g.emergency_probability.south)?;
        s.probability("east_emergency", &mut g.emergency_probability.east)?;
        s.probability("west_emergency", &mut g.emergency_probability.west)?;
        s.probability("north_escalation", &mut g.escalation_probability.north)?;
        s.probability("south_escalation", &mut g.escalation_probability.south)?;
        s.probability("east_escalation", &mut g.escalation_probability.east)?;
        s.probability("west_escalation", &mut g.escalation_probability.west)?;
    }

    // [flights] section
    if let Some(section) = ini.section(Some("flights")) {
        let s = Section::new("flights", section);
        s.probability("overshoot_probability", &mut config.flights.overshoot_probability)?;
    }

    // [dispatcher] section
    if let Some(section) = ini.section(Some("dispatcher")) {
        let s = Section::new("dispatcher", section);
        s.positive("retire_grace_secs", &mut config.dispatcher.retire_grace_secs)?;
    }

    // [log] section
    if let Some(section) = ini.section(Some("log")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.log.directory = PathBuf::from(v);
            }
        }
        if let Some(v) = section.get("console") {
            config.log.console = parse_bool(v);
        }
    }

    Ok(config)
}

struct Section<'a> {
    name: &'static str,
    properties: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, properties: &'a Properties) -> Self {
        Section { name, properties }
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn number<T: FromStr>(&self, key: &str, reason: &str) -> Result<Option<T>, ConfigError> {
        match self.properties.get(key) {
            Some(v) => v
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(key, v, reason)),
            None => Ok(None),
        }
    }

    fn positive(&self, key: &str, target: &mut u64) -> Result<(), ConfigError> {
        const REASON: &str = "must be a positive integer";
        if let Some(v) = self.number::<u64>(key, REASON)? {
            if v == 0 {
                return Err(self.invalid(key, "0", REASON));
            }
            *target = v;
        }
        Ok(())
    }

    fn probability(&self, key: &str, target: &mut f64) -> Result<(), ConfigError> {
        const REASON: &str = "must be a number between 0 and 1";
        if let Some(v) = self.number::<f64>(key, REASON)? {
            if !(0.0..=1.0).contains(&v) {
                return Err(self.invalid(key, &v.to_string(), REASON));
            }
            *target = v;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}
