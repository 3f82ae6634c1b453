//! Wall-clock adapter.
//!
//! Schedules are local time-of-day values, so [`LocalClock`] reports the
//! host's local time with the offset dropped.  A DST jump shifts "now" by
//! an hour; triggers in the skipped hour do not fire that day.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};

use crate::app::ports::Clock;

/// System local time and real thread sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl LocalClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
