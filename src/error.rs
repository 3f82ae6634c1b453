//! Unified error types for the actuation engine.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! startup path's error handling uniform.  Configuration errors and
//! hardware claim errors are fatal at startup; hardware write errors are
//! reported per output and never stop the tick loop.

use core::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the engine funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration is missing, malformed, or violates an invariant.
    Config(ConfigError),
    /// A GPIO claim, write, or read failed.
    Hardware(HardwareError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file does not exist.
    Missing(PathBuf),
    /// The configuration file exists but could not be read.
    Io { path: PathBuf, reason: String },
    /// The document could not be deserialised.
    Parse(String),
    /// A time-of-day string is not a valid `HH:MM` value.
    InvalidTime(String),
    /// No outputs are declared at all.
    NoOutputs,
    /// Two outputs share a name.
    DuplicateName(String),
    /// Two outputs share a physical pin.
    DuplicatePin { pin: u8, first: String, second: String },
    /// The pin cannot be addressed under the selected numbering scheme.
    UnmappedPin { output: String, pin: u8 },
    /// A fogging pulse has a zero duration.
    ZeroDuration { output: String, at: String },
    /// An engine setting is out of range.
    InvalidSetting(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(path) => write!(f, "file not found: {}", path.display()),
            Self::Io { path, reason } => write!(f, "cannot read {}: {reason}", path.display()),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::InvalidTime(s) => write!(f, "invalid time of day '{s}' (expected HH:MM)"),
            Self::NoOutputs => write!(f, "no outputs declared"),
            Self::DuplicateName(name) => write!(f, "output name '{name}' declared twice"),
            Self::DuplicatePin { pin, first, second } => {
                write!(f, "pin {pin} used by both '{first}' and '{second}'")
            }
            Self::UnmappedPin { output, pin } => {
                write!(f, "output '{output}': pin {pin} is not a GPIO pin")
            }
            Self::ZeroDuration { output, at } => {
                write!(f, "output '{output}': pulse at {at} has zero duration")
            }
            Self::InvalidSetting(msg) => write!(f, "engine setting: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// The pin could not be claimed as an output.
    Claim { pin: u8, reason: String },
    /// Writing a level to the pin failed.
    Write { pin: u8, reason: String },
    /// Reading the pin level back failed.
    Read { pin: u8, reason: String },
}

impl HardwareError {
    /// Pin the error refers to.
    pub fn pin(&self) -> u8 {
        match self {
            Self::Claim { pin, .. } | Self::Write { pin, .. } | Self::Read { pin, .. } => *pin,
        }
    }
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claim { pin, reason } => write!(f, "claim pin {pin} failed: {reason}"),
            Self::Write { pin, reason } => write!(f, "write pin {pin} failed: {reason}"),
            Self::Read { pin, reason } => write!(f, "read pin {pin} failed: {reason}"),
        }
    }
}

impl std::error::Error for HardwareError {}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
