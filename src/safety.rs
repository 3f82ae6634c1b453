//! Shutdown supervisor.
//!
//! Two ways to stop the engine, both ending in "every claimed output
//! inactive exactly once":
//!
//! 1. **Cooperative** – someone raises the [`ShutdownFlag`]; the tick loop
//!    notices it between triggers or at the end of a tick and runs the
//!    shutdown itself.
//! 2. **Signal** – the termination handler runs [`ShutdownHandle::execute`]
//!    directly from its own thread, even while the engine thread is blocked
//!    inside a pulse.  The engine thread never holds the output bank lock
//!    while sleeping, so the handler is not delayed by a long pulse.
//!
//! Whichever path locks the bank first seals it.  The other path then finds
//! it sealed and does nothing, and the interrupted pulse's final write is
//! refused.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embedded_hal::digital::StatefulOutputPin;
use log::{info, warn};

use crate::app::events::{EngineEvent, ShutdownSource};
use crate::app::ports::EventSink;
use crate::drivers::output::{lock_bank, SharedBank, ShutdownReport};

/// Cooperative shutdown request, shared across threads.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the engine to stop.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything the termination path needs to switch the outputs off.
pub struct ShutdownHandle<P> {
    flag: ShutdownFlag,
    bank: SharedBank<P>,
    sink: Arc<dyn EventSink>,
}

impl<P> Clone for ShutdownHandle<P> {
    fn clone(&self) -> Self {
        Self {
            flag: self.flag.clone(),
            bank: Arc::clone(&self.bank),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<P: StatefulOutputPin> ShutdownHandle<P> {
    pub fn new(flag: ShutdownFlag, bank: SharedBank<P>, sink: Arc<dyn EventSink>) -> Self {
        Self { flag, bank, sink }
    }

    /// Raise the cooperative flag without touching the outputs.
    pub fn request(&self) {
        self.flag.request();
    }

    pub fn is_requested(&self) -> bool {
        self.flag.is_requested()
    }

    /// Drive every output inactive and seal the bank.
    ///
    /// Idempotent: returns `None` if another path already shut down.
    pub fn execute(&self, source: ShutdownSource) -> Option<ShutdownReport> {
        self.flag.request();
        let mut bank = lock_bank(&self.bank);
        if bank.is_sealed() {
            return None;
        }

        self.sink.emit(&EngineEvent::ShutdownRequested { source });
        let report = bank.deactivate_all(self.sink.as_ref())?;
        self.sink.emit(&EngineEvent::ShutdownComplete {
            deactivated: report.deactivated,
            failed: report.failed,
        });

        if report.failed > 0 {
            warn!(
                "Shutdown: {} of {} outputs could not be switched off",
                report.failed,
                bank.len()
            );
        } else {
            info!("Shutdown: {} outputs safe", report.deactivated);
        }
        Some(report)
    }
}
