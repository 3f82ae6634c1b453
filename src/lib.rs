//! Vivarium actuation library.
//!
//! Schedules grow-light relays and fogger solenoids from a declarative
//! config: daily triggers, boot reconciliation of light windows, blocking
//! fog pulses, and a shutdown path that always leaves every relay off.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod reconcile;
pub mod safety;
pub mod scheduler;

pub use error::{ConfigError, Error, HardwareError, Result};
