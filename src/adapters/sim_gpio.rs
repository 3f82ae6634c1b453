//! In-memory GPIO board.
//!
//! Backs `--simulate` dry runs on machines without a GPIO header and the
//! crate's own unit tests.  Cloned handles share one board, so a test can
//! keep a handle and inspect levels while the engine drives the pins.
//! Failures can be injected per pin.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin, PinState, StatefulOutputPin};
use log::info;

use crate::app::ports::GpioPort;
use crate::error::HardwareError;

/// Error returned by a [`SimPin`] with injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPinError;

impl digital::Error for SimPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Default)]
struct SimBoard {
    levels: BTreeMap<u8, PinState>,
    claims: Vec<u8>,
    writes: Vec<(u8, PinState)>,
    failing_writes: BTreeSet<u8>,
    failing_claims: BTreeSet<u8>,
}

/// Shared handle to a simulated board.
#[derive(Debug, Clone, Default)]
pub struct SimGpio {
    board: Arc<Mutex<SimBoard>>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn board(&self) -> MutexGuard<'_, SimBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current level of `pin`, `None` if never claimed.
    pub fn level(&self, pin: u8) -> Option<PinState> {
        self.board().levels.get(&pin).copied()
    }

    /// Pins in claim order.
    pub fn claims(&self) -> Vec<u8> {
        self.board().claims.clone()
    }

    /// Every successful write in order (claims excluded).
    pub fn writes(&self) -> Vec<(u8, PinState)> {
        self.board().writes.clone()
    }

    /// Make writes to `pin` fail (or succeed again).
    pub fn fail_writes(&self, pin: u8, fail: bool) {
        let mut board = self.board();
        if fail {
            board.failing_writes.insert(pin);
        } else {
            board.failing_writes.remove(&pin);
        }
    }

    /// Make claiming `pin` fail.
    pub fn fail_claim(&self, pin: u8) {
        self.board().failing_claims.insert(pin);
    }
}

impl GpioPort for SimGpio {
    type Pin = SimPin;

    fn claim(&mut self, pin: u8, initial: PinState) -> Result<SimPin, HardwareError> {
        let mut board = self.board();
        if board.failing_claims.contains(&pin) {
            return Err(HardwareError::Claim {
                pin,
                reason: "simulated claim failure".into(),
            });
        }
        if board.claims.contains(&pin) {
            return Err(HardwareError::Claim {
                pin,
                reason: "already claimed".into(),
            });
        }
        board.claims.push(pin);
        board.levels.insert(pin, initial);
        info!("sim-gpio: pin {} claimed as output ({:?})", pin, initial);
        Ok(SimPin {
            pin,
            board: Arc::clone(&self.board),
        })
    }
}

/// A claimed simulated pin.
#[derive(Debug)]
pub struct SimPin {
    pin: u8,
    board: Arc<Mutex<SimBoard>>,
}

impl SimPin {
    fn write(&mut self, level: PinState) -> Result<(), SimPinError> {
        let mut board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
        if board.failing_writes.contains(&self.pin) {
            return Err(SimPinError);
        }
        board.levels.insert(self.pin, level);
        board.writes.push((self.pin, level));
        Ok(())
    }

    fn read(&self) -> PinState {
        let board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
        board.levels.get(&self.pin).copied().unwrap_or(PinState::High)
    }
}

impl ErrorType for SimPin {
    type Error = SimPinError;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), SimPinError> {
        self.write(PinState::Low)
    }

    fn set_high(&mut self) -> Result<(), SimPinError> {
        self.write(PinState::High)
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, SimPinError> {
        Ok(self.read() == PinState::High)
    }

    fn is_set_low(&mut self) -> Result<bool, SimPinError> {
        Ok(self.read() == PinState::Low)
    }
}
