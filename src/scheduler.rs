//! Trigger registry.
//!
//! Turns declared schedules into daily wall-clock triggers and answers
//! "which triggers are due right now" once per engine tick.
//!
//! ```text
//!   LightSchedule    ──▶  [Activate @ start] [Deactivate @ end]
//!   FoggingSchedule  ──▶  [Pulse(secs) @ hour] × N
//!
//!   tick(now) ──▶ due(now) ──▶ triggers in occurrence order
//! ```
//!
//! Each call to `due` covers the span since the previous call:
//!
//! ```text
//!   first call:   (now - catch_up, now]
//!   later calls:  (previous now, now]        at most one day back
//! ```
//!
//! Every occurrence inside the span fires, so a tick delayed by a long
//! pulse still runs whatever came due meanwhile, only late.  A trigger
//! fires at most once per calendar day.  `catch_up` only limits how far
//! back the first tick after boot looks (and a tick after the clock steps
//! backwards), so booting at 14:00 does not replay the 08:00 trigger.

use core::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};

use crate::config::{FoggingSchedule, LightSchedule, TimeOfDay};

// ═══════════════════════════════════════════════════════════════
//  Trigger types
// ═══════════════════════════════════════════════════════════════

/// Action bound to a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Switch the output on.
    Activate,
    /// Switch the output off.
    Deactivate,
    /// Switch on, hold for `secs`, switch off.  Blocks the tick loop.
    Pulse { secs: u32 },
}

impl fmt::Display for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activate => write!(f, "activate"),
            Self::Deactivate => write!(f, "deactivate"),
            Self::Pulse { secs } => write!(f, "pulse {secs}s"),
        }
    }
}

/// A daily trigger bound to one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Index of the output in the engine's output bank.
    pub output: usize,
    /// Output name, for diagnostics.
    pub name: String,
    pub at: TimeOfDay,
    pub action: TriggerAction,
}

/// Internal bookkeeping for a registered trigger.
#[derive(Debug, Clone)]
struct TriggerEntry {
    trigger: Trigger,
    /// Calendar day of the last firing.
    last_fired: Option<NaiveDate>,
}

// ═══════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════

/// Ordered set of daily triggers.
pub struct TriggerRegistry {
    entries: Vec<TriggerEntry>,
    catch_up: Duration,
    /// `now` of the previous `due` call.
    last_observed: Option<NaiveDateTime>,
}

impl TriggerRegistry {
    /// Create an empty registry.  `catch_up_secs` is clamped to at least 1.
    pub fn new(catch_up_secs: u32) -> Self {
        Self {
            entries: Vec::new(),
            catch_up: Duration::seconds(i64::from(catch_up_secs.max(1))),
            last_observed: None,
        }
    }

    fn push(&mut self, trigger: Trigger) {
        debug!(
            "Registry: '{}' {} at {} (slot {})",
            trigger.name,
            trigger.action,
            trigger.at,
            self.entries.len()
        );
        self.entries.push(TriggerEntry {
            trigger,
            last_fired: None,
        });
    }

    /// Register the two triggers of a light window.
    pub fn register_light(&mut self, output: usize, name: &str, schedule: &LightSchedule) {
        info!(
            "Registry: light '{}' {}–{}",
            name, schedule.start, schedule.end
        );
        self.push(Trigger {
            output,
            name: name.to_string(),
            at: schedule.start,
            action: TriggerAction::Activate,
        });
        self.push(Trigger {
            output,
            name: name.to_string(),
            at: schedule.end,
            action: TriggerAction::Deactivate,
        });
    }

    /// Register one pulse trigger per declared pulse, in declaration order.
    pub fn register_fogging(&mut self, output: usize, name: &str, schedule: &FoggingSchedule) {
        info!(
            "Registry: fogging '{}' with {} pulses",
            name,
            schedule.pulses.len()
        );
        for pulse in &schedule.pulses {
            self.push(Trigger {
                output,
                name: name.to_string(),
                at: pulse.at,
                action: TriggerAction::Pulse {
                    secs: pulse.duration_secs,
                },
            });
        }
    }

    /// Collect every trigger that came due since the previous call and mark
    /// it fired for its day.
    ///
    /// Triggers are returned in occurrence order; triggers sharing a minute
    /// keep registration order.
    pub fn due(&mut self, now: NaiveDateTime) -> Vec<Trigger> {
        let since = match self.last_observed {
            Some(prev) if prev <= now => prev.max(now - Duration::days(1)),
            Some(prev) => {
                warn!("Registry: clock stepped back from {} to {}", prev, now);
                now - self.catch_up
            }
            None => now - self.catch_up,
        };
        self.last_observed = Some(now);

        // The span is at most one day wide, so only today's and
        // yesterday's occurrences can fall inside it.
        let today = now.date();
        let days = [today.pred_opt(), Some(today)];
        let mut fired = Vec::new();

        for entry in &mut self.entries {
            for day in days.into_iter().flatten() {
                let fire_at = entry.trigger.at.on(day);
                let in_span = since < fire_at && fire_at <= now;
                if in_span && entry.last_fired != Some(day) {
                    entry.last_fired = Some(day);
                    fired.push((fire_at, entry.trigger.clone()));
                }
            }
        }

        fired.sort_by_key(|(fire_at, _)| *fire_at);
        for (fire_at, trigger) in &fired {
            let late = now - *fire_at;
            if late > self.catch_up {
                info!(
                    "Registry: '{}' {} running {}s late",
                    trigger.name,
                    trigger.action,
                    late.num_seconds()
                );
            }
        }
        fired.into_iter().map(|(_, trigger)| trigger).collect()
    }

    /// Registered triggers in registration order.
    pub fn triggers(&self) -> impl Iterator<Item = &Trigger> {
        self.entries.iter().map(|e| &e.trigger)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
