//! Actuation engine, the hexagonal core.
//!
//! [`ActuationEngine`] owns the output bank, the trigger registry, and the
//! shutdown handle.  All I/O flows through port traits injected at
//! construction, making the whole engine testable with mock adapters.
//!
//! ```text
//!  GpioPort ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!               │       ActuationEngine       │
//!     Clock ──▶ │ Registry · Bank · Reconcile │
//!               └─────────────────────────────┘
//!                              ▲
//!               ShutdownHandle ┘ (signal thread)
//! ```
//!
//! ## Lifecycle
//!
//! `start` validates the config, claims every active output (inactive
//! level), registers triggers, and boot-reconciles lights before returning
//! a `Running` engine.  `run` then ticks until the shutdown flag is raised;
//! the final transition to `ShuttingDown` drives every output inactive.
//!
//! Pulses block the tick loop for their whole duration.  The bank lock is
//! released while holding, so the signal path can shut down mid-pulse; the
//! pulse's own deactivation is then refused by the sealed bank.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use embedded_hal::digital::StatefulOutputPin;
use log::{debug, info, warn};

use crate::config::{Config, Schedule};
use crate::drivers::output::{
    lock_bank, OutputBank, OutputController, SharedBank, ShutdownReport, WriteOutcome,
};
use crate::error::Result;
use crate::reconcile::window_position;
use crate::safety::{ShutdownFlag, ShutdownHandle};
use crate::scheduler::{Trigger, TriggerAction, TriggerRegistry};

use super::events::{EngineEvent, ShutdownSource};
use super::ports::{Clock, EventSink, GpioPort};

/// Operational state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    /// Terminal.
    ShuttingDown,
}

// ───────────────────────────────────────────────────────────────
// ActuationEngine
// ───────────────────────────────────────────────────────────────

pub struct ActuationEngine<P, C> {
    bank: SharedBank<P>,
    registry: TriggerRegistry,
    clock: C,
    sink: Arc<dyn EventSink>,
    handle: ShutdownHandle<P>,
    state: EngineState,
    tick_interval: Duration,
    tick_count: u64,
}

impl<P, C> ActuationEngine<P, C>
where
    P: StatefulOutputPin,
    C: Clock,
{
    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring the engine up in `Running`.
    ///
    /// Any error here is fatal: no output has been driven active yet, and
    /// every pin claimed so far sits at its inactive level.
    pub fn start<G>(
        config: &Config,
        gpio: &mut G,
        clock: C,
        sink: Arc<dyn EventSink>,
        flag: ShutdownFlag,
    ) -> Result<Self>
    where
        G: GpioPort<Pin = P>,
    {
        config.validate()?;
        let polarity = config.engine.polarity;

        // 1. Claim active outputs only.
        let active: Vec<_> = config.active_outputs().collect();
        let mut bank = OutputBank::new();
        for decl in &active {
            let output = OutputController::init(gpio, decl, polarity)?;
            sink.emit(&EngineEvent::OutputClaimed {
                name: decl.name.clone(),
                pin: decl.pin,
                class: decl.class(),
            });
            bank.push(output);
        }
        let skipped = config.outputs.len() - active.len();
        if skipped > 0 {
            info!("Engine: {} inactive outputs left unclaimed", skipped);
        }

        // 2. Register triggers.  Bank index == position in `active`.
        let mut registry = TriggerRegistry::new(config.engine.catch_up_secs);
        for (index, decl) in active.iter().enumerate() {
            match &decl.schedule {
                Schedule::Light(light) => registry.register_light(index, &decl.name, light),
                Schedule::Fogging(fog) => registry.register_fogging(index, &decl.name, fog),
            }
        }
        for trigger in registry.triggers() {
            sink.emit(&EngineEvent::TriggerRegistered {
                name: trigger.name.clone(),
                at: trigger.at,
                action: trigger.action,
            });
        }

        let bank = Arc::new(Mutex::new(bank));
        let handle = ShutdownHandle::new(flag, Arc::clone(&bank), Arc::clone(&sink));
        let mut engine = Self {
            bank,
            registry,
            clock,
            sink,
            handle,
            state: EngineState::Running,
            tick_interval: config.engine.tick_interval(),
            tick_count: 0,
        };

        // 3. Boot-reconcile lights.
        let now = engine.clock.now();
        for (index, decl) in active.iter().enumerate() {
            if let Schedule::Light(light) = &decl.schedule {
                let position = window_position(now, light);
                let target = position.should_be_active();
                engine.sink.emit(&EngineEvent::BootReconciled {
                    name: decl.name.clone(),
                    position,
                    active: target,
                });
                engine.drive(index, target);
            }
        }

        engine.sink.emit(&EngineEvent::Started {
            outputs: active.len(),
            triggers: engine.registry.len(),
        });
        Ok(engine)
    }

    /// Tick until shutdown is requested, then drive every output inactive.
    ///
    /// Returns `None` when the signal path already performed the shutdown.
    pub fn run(&mut self) -> Option<ShutdownReport> {
        info!("Engine: ticking every {:?}", self.tick_interval);
        loop {
            if self.handle.is_requested() {
                return self.shutdown(ShutdownSource::Cooperative);
            }
            self.tick();
            if !self.handle.is_requested() {
                self.clock.sleep(self.tick_interval);
            }
        }
    }

    /// Enter `ShuttingDown` and switch every output off.
    pub fn shutdown(&mut self, source: ShutdownSource) -> Option<ShutdownReport> {
        self.state = EngineState::ShuttingDown;
        self.handle.execute(source)
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run every trigger that came due since the previous tick, oldest first.
    ///
    /// Returns the number of actions executed.  Stops early once shutdown
    /// has been requested.
    pub fn tick(&mut self) -> usize {
        if self.state == EngineState::ShuttingDown {
            return 0;
        }
        self.tick_count += 1;

        let due = self.registry.due(self.clock.now());
        let mut executed = 0;
        for trigger in &due {
            if self.handle.is_requested() {
                debug!("Engine: shutdown pending, dropping '{}' {}", trigger.name, trigger.action);
                break;
            }
            self.sink.emit(&EngineEvent::TriggerFired {
                name: trigger.name.clone(),
                at: trigger.at,
                action: trigger.action,
            });
            self.execute(trigger);
            executed += 1;
        }
        executed
    }

    fn execute(&mut self, trigger: &Trigger) {
        match trigger.action {
            TriggerAction::Activate => {
                self.drive(trigger.output, true);
            }
            TriggerAction::Deactivate => {
                self.drive(trigger.output, false);
            }
            TriggerAction::Pulse { secs } => self.pulse(trigger, secs),
        }
    }

    /// On, hold `secs`, off.  Blocks the caller for the whole hold.
    fn pulse(&mut self, trigger: &Trigger, secs: u32) {
        let started = self.clock.now();
        let activated = self.drive(trigger.output, true);
        if activated {
            self.sink.emit(&EngineEvent::PulseStarted {
                name: trigger.name.clone(),
                secs,
            });
            self.clock.sleep(Duration::from_secs(u64::from(secs)));
        } else {
            warn!("Engine: '{}' did not switch on, skipping {}s hold", trigger.name, secs);
        }

        let deactivated = self.drive(trigger.output, false);
        if activated && deactivated {
            let elapsed = self.clock.now() - started;
            self.sink.emit(&EngineEvent::PulseFinished {
                name: trigger.name.clone(),
                secs,
                elapsed_secs: elapsed.num_seconds(),
            });
        }
    }

    /// Write one output.  The bank lock is held only for the write.
    ///
    /// Failures are already reported as events by the output controller
    /// and never stop the loop; returns whether the write was applied.
    fn drive(&self, index: usize, active: bool) -> bool {
        let mut bank = lock_bank(&self.bank);
        match bank.set_active(index, active, self.sink.as_ref()) {
            Ok(WriteOutcome::Applied) => true,
            Ok(WriteOutcome::Refused) => false,
            Err(e) => {
                debug!("Engine: write isolated to pin {}: {}", e.pin(), e);
                false
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Handle for the termination path.
    pub fn shutdown_handle(&self) -> ShutdownHandle<P> {
        self.handle.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    /// Number of claimed outputs.
    pub fn output_count(&self) -> usize {
        lock_bank(&self.bank).len()
    }

    /// Read back the output called `name`; `None` if unknown or unreadable.
    pub fn is_active(&self, name: &str) -> Option<bool> {
        let mut bank = lock_bank(&self.bank);
        let index = bank.find(name)?;
        bank.is_active(index)?.ok()
    }
}
