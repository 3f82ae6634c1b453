//! Port traits: the boundary between the actuation engine and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ActuationEngine (domain)
//! ```
//!
//! The GPIO driver, the wall clock, and the diagnostics sink are all
//! injected through these traits, so the engine never touches hardware,
//! the system clock, or a logger directly and is fully testable with mocks.

use std::time::Duration;

use chrono::NaiveDateTime;
use embedded_hal::digital::{PinState, StatefulOutputPin};

use crate::error::HardwareError;

// ───────────────────────────────────────────────────────────────
// GPIO port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Digital-output capability of the board.
///
/// `claim` hands out an exclusively owned pin; writes and reads then go
/// through the `embedded-hal` [`StatefulOutputPin`] methods of that pin.
pub trait GpioPort {
    /// Pin handle.  Must be `Send` because the termination path may drive
    /// it from the signal-handling thread.
    type Pin: StatefulOutputPin + Send + 'static;

    /// Claim `pin` as an output driven to `initial` from the first instant.
    ///
    /// Fails if the pin is already claimed or the hardware refuses it.
    fn claim(&mut self, pin: u8, initial: PinState) -> Result<Self::Pin, HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Local wall-clock time and blocking waits.
pub trait Clock {
    /// Current local time, no timezone attached.
    fn now(&self) -> NaiveDateTime;

    /// Block the calling thread for `duration`.
    fn sleep(&mut self, duration: Duration);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The engine emits structured [`EngineEvent`](super::events::EngineEvent)s
/// through this port.  It takes `&self` and is `Send + Sync` because the
/// shutdown path emits from the signal-handling thread as well.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &super::events::EngineEvent);
}
