//! Output drivers.

pub mod output;
