//! Relay output controller.
//!
//! Each [`OutputController`] exclusively owns one claimed pin.  Every write
//! reads the level back first so the emitted event records the observed
//! before/after states.
//!
//! ## Safety contract
//!
//! The [`OutputBank`] holding all controllers is shared between the engine
//! thread and the termination path.  Once [`OutputBank::deactivate_all`]
//! has run the bank is sealed: every later write is refused, so the tail of
//! an interrupted pulse can never re-energise a relay after shutdown.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::digital::StatefulOutputPin;
use log::debug;

use crate::app::events::EngineEvent;
use crate::app::ports::{EventSink, GpioPort};
use crate::config::{OutputDecl, Polarity};
use crate::error::HardwareError;

// ═══════════════════════════════════════════════════════════════
//  Single output
// ═══════════════════════════════════════════════════════════════

pub struct OutputController<P> {
    name: String,
    pin_id: u8,
    polarity: Polarity,
    pin: P,
}

impl<P: StatefulOutputPin> OutputController<P> {
    /// Claim the output's pin, driven inactive from the first instant.
    pub fn init<G>(gpio: &mut G, decl: &OutputDecl, polarity: Polarity) -> Result<Self, HardwareError>
    where
        G: GpioPort<Pin = P>,
    {
        let pin = gpio.claim(decl.pin, polarity.level(false))?;
        debug!("Output '{}' claimed pin {} ({:?})", decl.name, decl.pin, polarity);
        Ok(Self {
            name: decl.name.clone(),
            pin_id: decl.pin,
            polarity,
            pin,
        })
    }

    /// Read the pin back and map it through the polarity.
    pub fn is_active(&mut self) -> Result<bool, HardwareError> {
        let polarity = self.polarity;
        self.pin
            .is_set_low()
            .map(|low| polarity.is_active(low))
            .map_err(|e| HardwareError::Read {
                pin: self.pin_id,
                reason: format!("{e:?}"),
            })
    }

    /// Drive the output to `active` and emit the transition.
    pub fn set_active(&mut self, active: bool, sink: &dyn EventSink) -> Result<(), HardwareError> {
        let previous = self.is_active().ok();
        let level = self.polarity.level(active);

        match self.pin.set_state(level) {
            Ok(()) => {
                sink.emit(&EngineEvent::OutputSwitched {
                    name: self.name.clone(),
                    pin: self.pin_id,
                    previous,
                    active,
                });
                Ok(())
            }
            Err(e) => {
                let reason = format!("{e:?}");
                sink.emit(&EngineEvent::WriteFailed {
                    name: self.name.clone(),
                    pin: self.pin_id,
                    active,
                    reason: reason.clone(),
                });
                Err(HardwareError::Write {
                    pin: self.pin_id,
                    reason,
                })
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Output bank
// ═══════════════════════════════════════════════════════════════

/// Outcome of a bank write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The bank was already shut down.
    Refused,
}

/// Result of [`OutputBank::deactivate_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub deactivated: usize,
    pub failed: usize,
}

/// Every claimed output, indexed in claim order.
pub struct OutputBank<P> {
    outputs: Vec<OutputController<P>>,
    sealed: bool,
}

/// Bank shared between the engine thread and the termination path.
pub type SharedBank<P> = Arc<Mutex<OutputBank<P>>>;

/// Lock a shared bank.  A panic while holding the lock cannot leave a pin
/// handle half-updated, so poisoning is ignored.
pub fn lock_bank<P>(bank: &SharedBank<P>) -> MutexGuard<'_, OutputBank<P>> {
    bank.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P> Default for OutputBank<P> {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            sealed: false,
        }
    }
}

impl<P: StatefulOutputPin> OutputBank<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a controller; returns its index.
    pub fn push(&mut self, output: OutputController<P>) -> usize {
        self.outputs.push(output);
        self.outputs.len() - 1
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Index of the output called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name == name)
    }

    /// Read back whether output `index` is active.
    pub fn is_active(&mut self, index: usize) -> Option<Result<bool, HardwareError>> {
        self.outputs.get_mut(index).map(OutputController::is_active)
    }

    /// Drive output `index`, unless the bank has been shut down.
    pub fn set_active(
        &mut self,
        index: usize,
        active: bool,
        sink: &dyn EventSink,
    ) -> Result<WriteOutcome, HardwareError> {
        let Some(output) = self.outputs.get_mut(index) else {
            debug_assert!(false, "no output at index {index}");
            return Ok(WriteOutcome::Refused);
        };
        if self.sealed {
            sink.emit(&EngineEvent::WriteRefused {
                name: output.name.clone(),
                active,
            });
            return Ok(WriteOutcome::Refused);
        }
        output.set_active(active, sink)?;
        Ok(WriteOutcome::Applied)
    }

    /// Drive every output inactive exactly once and seal the bank.
    ///
    /// Returns `None` if the bank was already sealed.
    pub fn deactivate_all(&mut self, sink: &dyn EventSink) -> Option<ShutdownReport> {
        if self.sealed {
            return None;
        }
        self.sealed = true;

        let mut report = ShutdownReport {
            deactivated: 0,
            failed: 0,
        };
        for output in &mut self.outputs {
            match output.set_active(false, sink) {
                Ok(()) => report.deactivated += 1,
                Err(_) => report.failed += 1,
            }
        }
        Some(report)
    }
}
