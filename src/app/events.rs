//! Outbound engine events.
//!
//! The [`ActuationEngine`](super::service::ActuationEngine) and the output
//! controllers emit these through the [`EventSink`](super::ports::EventSink)
//! port.  Each event knows its component and severity; the sink adds the
//! timestamp.

use core::fmt;

use log::Level;

use crate::config::{OutputClass, TimeOfDay};
use crate::reconcile::WindowPosition;
use crate::scheduler::TriggerAction;

/// What asked the engine to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSource {
    /// OS termination signal (SIGINT / SIGTERM).
    Signal,
    /// The tick loop observed the shutdown flag.
    Cooperative,
}

/// Structured events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// An output's pin was claimed and driven inactive.
    OutputClaimed {
        name: String,
        pin: u8,
        class: OutputClass,
    },

    /// A level was written.  `previous` is the state read back just before
    /// the write, `None` when the read failed.
    OutputSwitched {
        name: String,
        pin: u8,
        previous: Option<bool>,
        active: bool,
    },

    /// A pin write failed; the output keeps its stale state.
    WriteFailed {
        name: String,
        pin: u8,
        active: bool,
        reason: String,
    },

    /// A write was refused because the outputs were already shut down.
    WriteRefused { name: String, active: bool },

    /// A daily trigger was added to the registry.
    TriggerRegistered {
        name: String,
        at: TimeOfDay,
        action: TriggerAction,
    },

    /// A daily trigger came due and its action is about to run.
    TriggerFired {
        name: String,
        at: TimeOfDay,
        action: TriggerAction,
    },

    /// A pulse activated its output and is holding.
    PulseStarted { name: String, secs: u32 },

    /// A pulse finished holding; `elapsed_secs` is the measured hold.
    PulseFinished {
        name: String,
        secs: u32,
        elapsed_secs: i64,
    },

    /// Boot reconciliation decided a light's state.
    BootReconciled {
        name: String,
        position: WindowPosition,
        active: bool,
    },

    /// Startup finished; the engine is running.
    Started { outputs: usize, triggers: usize },

    /// A termination request was received.
    ShutdownRequested { source: ShutdownSource },

    /// Every claimed output has been driven inactive.
    ShutdownComplete { deactivated: usize, failed: usize },
}

impl EngineEvent {
    /// Component that produced the event.
    pub fn component(&self) -> &'static str {
        match self {
            Self::OutputClaimed { .. }
            | Self::OutputSwitched { .. }
            | Self::WriteFailed { .. }
            | Self::WriteRefused { .. } => "output",
            Self::TriggerRegistered { .. } | Self::TriggerFired { .. } => "registry",
            Self::PulseStarted { .. } | Self::PulseFinished { .. } => "pulse",
            Self::BootReconciled { .. } => "reconciler",
            Self::Started { .. }
            | Self::ShutdownRequested { .. }
            | Self::ShutdownComplete { .. } => "engine",
        }
    }

    /// Severity of the event.
    pub fn level(&self) -> Level {
        match self {
            Self::WriteFailed { .. } => Level::Error,
            Self::ShutdownComplete { failed, .. } if *failed > 0 => Level::Error,
            Self::WriteRefused { .. } | Self::ShutdownRequested { .. } => Level::Warn,
            Self::TriggerRegistered { .. } => Level::Debug,
            _ => Level::Info,
        }
    }
}

fn on_off(active: bool) -> &'static str {
    if active { "ON" } else { "OFF" }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputClaimed { name, pin, class } => {
                write!(f, "{name} ({class}) claimed pin {pin}, initial OFF")
            }
            Self::OutputSwitched {
                name,
                pin,
                previous,
                active,
            } => {
                let prev = previous.map_or("UNKNOWN", on_off);
                write!(f, "{name} pin {pin}: {prev} -> {}", on_off(*active))
            }
            Self::WriteFailed {
                name,
                pin,
                active,
                reason,
            } => write!(
                f,
                "{name} pin {pin}: switching {} failed, state stale ({reason})",
                on_off(*active)
            ),
            Self::WriteRefused { name, active } => write!(
                f,
                "{name}: switching {} refused after shutdown",
                on_off(*active)
            ),
            Self::TriggerRegistered { name, at, action } => {
                write!(f, "{name}: daily {action} at {at}")
            }
            Self::TriggerFired { name, at, action } => write!(f, "{name}: {action} due at {at}"),
            Self::PulseStarted { name, secs } => write!(f, "{name} ON for {secs} seconds"),
            Self::PulseFinished {
                name,
                secs,
                elapsed_secs,
            } => write!(f, "{name} OFF after {elapsed_secs}s (pulse {secs}s)"),
            Self::BootReconciled {
                name,
                position,
                active,
            } => write!(f, "{name}: boot {position}, forcing {}", on_off(*active)),
            Self::Started { outputs, triggers } => {
                write!(f, "running with {outputs} outputs and {triggers} triggers")
            }
            Self::ShutdownRequested { source } => write!(f, "shutdown requested ({source:?})"),
            Self::ShutdownComplete {
                deactivated,
                failed,
            } => write!(
                f,
                "all outputs OFF ({deactivated} deactivated, {failed} failed)"
            ),
        }
    }
}
