//! Application core: scheduling and actuation logic, zero direct I/O.
//!
//! The engine talks to GPIO, the clock, and diagnostics only through the
//! **port traits** in [`ports`], so it is fully testable without real
//! hardware.

pub mod events;
pub mod ports;
pub mod service;
