use std::{sync::Mutex, time::Duration};

use chrono::{DateTime, TimeZone, Utc};

use crate::helpers::{add_duration, Clock};

/// A clock that only moves when told to. It starts at 2024-06-01 12:00:00 UTC.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap_or_default();
        Self::starting_at(start)
    }
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = add_duration(*now, by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        ManualClock::now(self)
    }
}
