//! Linux sysfs GPIO adapter.
//!
//! Drives relay pins through `/sys/class/gpio`:
//!
//! | File                 | Use                                         |
//! |----------------------|---------------------------------------------|
//! | `export`             | make line `N` appear as `gpioN/`            |
//! | `gpioN/direction`    | `high` / `low` = output with initial level  |
//! | `gpioN/value`        | `0` / `1` write and read-back               |
//!
//! Writing `high` or `low` to `direction` switches the line to output and
//! sets its level in one step, so a relay never sees a glitch at claim time.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin, PinState, StatefulOutputPin};
use log::{debug, info, warn};

use crate::app::ports::GpioPort;
use crate::error::HardwareError;
use crate::pins::PinNumbering;

/// Attempts to open `direction` after export while udev fixes permissions.
const EXPORT_SETTLE_ATTEMPTS: u32 = 20;
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// I/O failure on a sysfs GPIO file.
#[derive(Debug)]
pub struct SysfsPinError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl digital::Error for SysfsPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Write `value` to a sysfs attribute.
fn write_attr(path: &Path, value: &str) -> Result<(), SysfsPinError> {
    fs::write(path, value).map_err(|source| SysfsPinError {
        path: path.to_path_buf(),
        source,
    })
}

fn claim_error(pin: u8, reason: impl Into<String>) -> HardwareError {
    HardwareError::Claim {
        pin,
        reason: reason.into(),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Port
// ═══════════════════════════════════════════════════════════════

/// GPIO port backed by the sysfs tree rooted at `root`.
pub struct SysfsGpio {
    root: PathBuf,
    numbering: PinNumbering,
    claimed: BTreeSet<u8>,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>, numbering: PinNumbering) -> Self {
        Self {
            root: root.into(),
            numbering,
            claimed: BTreeSet::new(),
        }
    }

    fn line_dir(&self, line: u8) -> PathBuf {
        self.root.join(format!("gpio{line}"))
    }

    /// Export `line` unless a previous run left it exported.
    fn export(&self, pin: u8, line: u8) -> Result<(), HardwareError> {
        if self.line_dir(line).exists() {
            warn!(
                "sysfs-gpio: line {} (pin {}) already exported, reusing it",
                line, pin
            );
            return Ok(());
        }
        write_attr(&self.root.join("export"), &line.to_string())
            .map_err(|e| claim_error(pin, format!("export line {line}: {}", e.source)))
    }

    /// Set direction and initial level, retrying while the attribute is
    /// still owned by root right after export.
    fn set_direction(&self, pin: u8, line: u8, initial: PinState) -> Result<(), HardwareError> {
        let path = self.line_dir(line).join("direction");
        let direction = match initial {
            PinState::High => "high",
            PinState::Low => "low",
        };

        let mut attempt = 0;
        loop {
            match write_attr(&path, direction) {
                Ok(()) => return Ok(()),
                Err(e)
                    if attempt + 1 < EXPORT_SETTLE_ATTEMPTS
                        && matches!(
                            e.source.kind(),
                            io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
                        ) =>
                {
                    attempt += 1;
                    debug!(
                        "sysfs-gpio: {} not ready ({}), retry {}",
                        path.display(),
                        e.source,
                        attempt
                    );
                    std::thread::sleep(EXPORT_SETTLE_DELAY);
                }
                Err(e) => {
                    return Err(claim_error(
                        pin,
                        format!("{}: {}", e.path.display(), e.source),
                    ));
                }
            }
        }
    }
}

impl GpioPort for SysfsGpio {
    type Pin = SysfsPin;

    fn claim(&mut self, pin: u8, initial: PinState) -> Result<SysfsPin, HardwareError> {
        let line = self
            .numbering
            .resolve(pin)
            .ok_or_else(|| claim_error(pin, format!("not a GPIO pin under {:?} numbering", self.numbering)))?;
        if self.claimed.contains(&line) {
            return Err(claim_error(pin, format!("line {line} already claimed")));
        }

        self.export(pin, line)?;
        self.set_direction(pin, line, initial)?;
        self.claimed.insert(line);

        info!(
            "sysfs-gpio: pin {} (line {}) claimed as output, initial {:?}",
            pin, line, initial
        );
        Ok(SysfsPin {
            line,
            value_path: self.line_dir(line).join("value"),
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Pin
// ═══════════════════════════════════════════════════════════════

/// A claimed sysfs GPIO line.
#[derive(Debug)]
pub struct SysfsPin {
    line: u8,
    value_path: PathBuf,
}

impl SysfsPin {
    pub fn line(&self) -> u8 {
        self.line
    }

    fn read_level(&self) -> Result<PinState, SysfsPinError> {
        let content = fs::read_to_string(&self.value_path).map_err(|source| SysfsPinError {
            path: self.value_path.clone(),
            source,
        })?;
        match content.trim() {
            "0" => Ok(PinState::Low),
            "1" => Ok(PinState::High),
            other => Err(SysfsPinError {
                path: self.value_path.clone(),
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected value '{other}'"),
                ),
            }),
        }
    }
}

impl ErrorType for SysfsPin {
    type Error = SysfsPinError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), SysfsPinError> {
        write_attr(&self.value_path, "0")
    }

    fn set_high(&mut self) -> Result<(), SysfsPinError> {
        write_attr(&self.value_path, "1")
    }
}

impl StatefulOutputPin for SysfsPin {
    fn is_set_high(&mut self) -> Result<bool, SysfsPinError> {
        Ok(self.read_level()? == PinState::High)
    }

    fn is_set_low(&mut self) -> Result<bool, SysfsPinError> {
        Ok(self.read_level()? == PinState::Low)
    }
}
