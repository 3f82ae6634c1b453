//! Boot reconciler.
//!
//! At startup a light may already be inside its on-window, and the next
//! trigger could be up to a day away.  The reconciler places "now" against
//! today's `[start, end)` window and tells the engine which state to force.
//!
//! The two window edges are applied in sequence: at/after `start` turns the
//! light on, at/after `end` turns it off again, and the end check wins.  For
//! a same-day window this yields "on iff start ≤ now < end".  A window whose
//! end precedes its start (overnight) is evaluated the same literal way, so
//! at boot such a light is never on: any time past `start` is also past
//! `end` on the same day.

use core::fmt;

use chrono::NaiveDateTime;

use crate::config::LightSchedule;

/// Where "now" lies relative to today's light window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// Before today's start time.
    BeforeStart,
    /// At/after start and before end.
    InWindow,
    /// At/after today's end time.
    PastEnd,
}

impl WindowPosition {
    /// State the light should be in.
    pub fn should_be_active(self) -> bool {
        matches!(self, Self::InWindow)
    }
}

impl fmt::Display for WindowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeStart => write!(f, "before window"),
            Self::InWindow => write!(f, "inside window"),
            Self::PastEnd => write!(f, "past window end"),
        }
    }
}

/// Place `now` against the light's window on `now`'s calendar day.
pub fn window_position(now: NaiveDateTime, schedule: &LightSchedule) -> WindowPosition {
    let today = now.date();
    let start = schedule.start.on(today);
    let end = schedule.end.on(today);

    let mut position = WindowPosition::BeforeStart;
    if now >= start {
        position = WindowPosition::InWindow;
    }
    if now >= end {
        position = WindowPosition::PastEnd;
    }
    position
}
