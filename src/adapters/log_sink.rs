//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering every [`EngineEvent`] through the
//! `log` facade.  The event's component becomes the log target, so the
//! binary's formatter prints it as `[component]` and `RUST_LOG` can filter
//! per component (e.g. `RUST_LOG=info,registry=debug`).

use log::log;

use crate::app::events::EngineEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`EngineEvent`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &EngineEvent) {
        log!(target: event.component(), event.level(), "{}", event);
    }
}
