//! Configuration model.
//!
//! Declared outputs and their daily schedules, plus the engine's runtime
//! settings.  A [`Config`] is only handed to the engine after
//! [`Config::validate`] has accepted it; nothing in it changes afterwards.
//!
//! Two document shapes are accepted (YAML by default, JSON by extension):
//!
//! ```yaml
//! # bare list
//! - name: day-light
//!   pin: 7
//!   class: light
//!   active: true
//!   start: "08:00"
//!   end: "20:00"
//!
//! # or with engine settings
//! engine:
//!   polarity: active_low
//! outputs:
//!   - name: fogger
//!     pin: 11
//!     class: fogging
//!     active: true
//!     hours:
//!       - { hour: "12:00", elapsed_time: 5 }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use embedded_hal::digital::PinState;
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;
use crate::pins::PinNumbering;

// ═══════════════════════════════════════════════════════════════
//  Time of day
// ═══════════════════════════════════════════════════════════════

/// A wall-clock time of day with minute precision (`HH:MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Build from hour (0–23) and minute (0–59).
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Parse a strict two-digit `HH:MM` string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTime(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(h) || !two_digits(m) {
            return Err(invalid());
        }
        let hour = h.parse().map_err(|_| invalid())?;
        let minute = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }

    pub fn hour(self) -> u32 {
        self.0.hour()
    }

    pub fn minute(self) -> u32 {
        self.0.minute()
    }

    /// This time of day on the given calendar date.
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Schedules
// ═══════════════════════════════════════════════════════════════

/// Daily on/off window of a light output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightSchedule {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

/// A single timed activation of a fogging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pulse {
    #[serde(rename = "hour")]
    pub at: TimeOfDay,
    #[serde(rename = "elapsed_time")]
    pub duration_secs: u32,
}

impl Pulse {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_secs))
    }
}

/// Ordered daily pulses of a fogging output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FoggingSchedule {
    #[serde(rename = "hours", default)]
    pub pulses: Vec<Pulse>,
}

/// Class-specific schedule, tagged by the `class` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum Schedule {
    Light(LightSchedule),
    Fogging(FoggingSchedule),
}

/// Output class without the schedule payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputClass {
    Light,
    Fogging,
}

impl fmt::Display for OutputClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Fogging => write!(f, "fogging"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Output declarations
// ═══════════════════════════════════════════════════════════════

/// One declared output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDecl {
    /// Unique human-readable name.
    pub name: String,
    /// Pin number, interpreted through [`EngineConfig::numbering`].
    pub pin: u8,
    /// Only active outputs are claimed and scheduled.
    pub active: bool,
    #[serde(flatten)]
    pub schedule: Schedule,
}

impl OutputDecl {
    pub fn class(&self) -> OutputClass {
        match self.schedule {
            Schedule::Light(_) => OutputClass::Light,
            Schedule::Fogging(_) => OutputClass::Fogging,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Engine settings
// ═══════════════════════════════════════════════════════════════

/// Which pin level energises the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// LOW = active (relay energised), HIGH = inactive.
    #[default]
    ActiveLow,
    /// HIGH = active, LOW = inactive.
    ActiveHigh,
}

impl Polarity {
    /// Pin level that represents `active`.
    pub fn level(self, active: bool) -> PinState {
        match (self, active) {
            (Self::ActiveLow, true) | (Self::ActiveHigh, false) => PinState::Low,
            (Self::ActiveLow, false) | (Self::ActiveHigh, true) => PinState::High,
        }
    }

    /// Whether a pin whose level is LOW (`is_low`) counts as active.
    pub fn is_active(self, is_low: bool) -> bool {
        match self {
            Self::ActiveLow => is_low,
            Self::ActiveHigh => !is_low,
        }
    }
}

/// Runtime settings of the actuation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tick period of the scheduler loop.
    pub tick_interval_ms: u64,
    /// How far back the first tick after boot looks for due triggers.
    pub catch_up_secs: u32,
    pub polarity: Polarity,
    pub numbering: PinNumbering,
    /// Root of the sysfs GPIO tree.
    pub gpio_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            catch_up_secs: 60,
            polarity: Polarity::ActiveLow,
            numbering: PinNumbering::Board,
            gpio_root: PathBuf::from("/sys/class/gpio"),
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=60_000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::InvalidSetting(
                "tick_interval_ms must be within 1..=60000",
            ));
        }
        if !(1..=3600).contains(&self.catch_up_secs) {
            return Err(ConfigError::InvalidSetting(
                "catch_up_secs must be within 1..=3600",
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Top-level configuration
// ═══════════════════════════════════════════════════════════════

/// Complete configuration: engine settings plus output declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    pub outputs: Vec<OutputDecl>,
}

impl Config {
    pub fn new(engine: EngineConfig, outputs: Vec<OutputDecl>) -> Self {
        Self { engine, outputs }
    }

    /// Read, parse, and validate a configuration file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading config from {}", path.display());
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let parse_err = |e: serde_yaml::Error| ConfigError::Parse(e.to_string());
        let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(parse_err)?;
        let config = if value.is_sequence() {
            Self::new(
                EngineConfig::default(),
                serde_yaml::from_value(value).map_err(parse_err)?,
            )
        } else {
            serde_yaml::from_value(value).map_err(parse_err)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let parse_err = |e: serde_json::Error| ConfigError::Parse(e.to_string());
        let value: serde_json::Value = serde_json::from_str(text).map_err(parse_err)?;
        let config = if value.is_array() {
            Self::new(
                EngineConfig::default(),
                serde_json::from_value(value).map_err(parse_err)?,
            )
        } else {
            serde_json::from_value(value).map_err(parse_err)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        if self.outputs.is_empty() {
            return Err(ConfigError::NoOutputs);
        }

        let mut names: HashSet<&str> = HashSet::new();
        let mut pins: HashMap<u8, &str> = HashMap::new();
        for output in &self.outputs {
            if !names.insert(output.name.as_str()) {
                return Err(ConfigError::DuplicateName(output.name.clone()));
            }
            if let Some(first) = pins.insert(output.pin, output.name.as_str()) {
                return Err(ConfigError::DuplicatePin {
                    pin: output.pin,
                    first: first.to_string(),
                    second: output.name.clone(),
                });
            }
            if self.engine.numbering.resolve(output.pin).is_none() {
                return Err(ConfigError::UnmappedPin {
                    output: output.name.clone(),
                    pin: output.pin,
                });
            }
            if let Schedule::Fogging(fog) = &output.schedule {
                if let Some(pulse) = fog.pulses.iter().find(|p| p.duration_secs == 0) {
                    return Err(ConfigError::ZeroDuration {
                        output: output.name.clone(),
                        at: pulse.at.to_string(),
                    });
                }
                if fog.pulses.is_empty() {
                    warn!("Fogging output '{}' declares no pulses", output.name);
                }
            }
        }
        Ok(())
    }

    /// Outputs flagged `active`, in declaration order.
    pub fn active_outputs(&self) -> impl Iterator<Item = &OutputDecl> {
        self.outputs.iter().filter(|o| o.active)
    }
}
